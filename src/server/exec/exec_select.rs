use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::server::exec::exec_common::*;
use crate::server::exec::ExecContext;
use crate::server::query::{Projection, Query};
use crate::server::schema::TagColumn;
use crate::storage::TimeSeriesPoint;

/// Resolve the query against the schema, fetch from the store, then apply
/// ORDER BY, LIMIT and projection in that order.
pub fn run_select(ctx: &ExecContext, q: &Query) -> AppResult<ResultSet> {
    let schema = &ctx.schema;
    schema.resolve_table(&q.table)?;

    let columns: Vec<TagColumn> = match &q.projection {
        Projection::All => TagColumn::ALL.to_vec(),
        Projection::Columns(names) => names.iter().map(|n| schema.resolve_column(n)).collect::<AppResult<_>>()?,
    };

    let tag: Option<String> = match &q.predicate {
        Some(p) => {
            let col = schema.resolve_column(&p.column)?;
            if col != schema.key_column() {
                return Err(AppError::UnsupportedPredicate {
                    column: p.column.clone(),
                    key: schema.key_column().name().to_string(),
                });
            }
            Some(p.value.as_text().to_string())
        }
        None => None,
    };

    let order = match &q.order_by {
        Some(ob) => Some((schema.resolve_column(&ob.column)?, ob.asc)),
        None => None,
    };

    // Without ORDER BY the result is store order, so the store may stop early.
    let pushdown = match (order, q.limit) {
        (None, Some(n)) => Some(usize::try_from(n).unwrap_or(usize::MAX)),
        _ => None,
    };

    let mut points = ctx.store.fetch(tag.as_deref(), pushdown).map_err(|e| {
        warn!(target: "tagwire::exec", "store fetch failed for tag {:?}: {:#}", tag, e);
        AppError::store(format!("{:#}", e))
    })?;
    debug!(target: "tagwire::exec", "run_select: fetched {} points for tag {:?}", points.len(), tag);

    if let Some((col, asc)) = order {
        order_points(&mut points, col, asc);
    }
    if let Some(n) = q.limit {
        points.truncate(usize::try_from(n).unwrap_or(usize::MAX));
    }

    let rows = points.into_iter().map(|p| project(&p, &columns)).collect();
    let columns = columns.iter().map(|c| ResultColumn::new(c.name(), c.column_type())).collect();
    Ok(ResultSet { columns, rows })
}

fn compare(a: &TimeSeriesPoint, b: &TimeSeriesPoint, col: TagColumn) -> Ordering {
    match col {
        TagColumn::Name => a.name.cmp(&b.name),
        TagColumn::Time => a.time.cmp(&b.time),
        TagColumn::Value => a.value.total_cmp(&b.value),
    }
}

fn is_ordered(points: &[TimeSeriesPoint], col: TagColumn, asc: bool) -> bool {
    points.windows(2).all(|w| {
        let ord = compare(&w[0], &w[1], col);
        if asc { ord != Ordering::Greater } else { ord != Ordering::Less }
    })
}

/// Order `points` by `col`. The store's order is checked, never trusted: an
/// already-ordered input is kept, an input ordered the other way is reversed,
/// and anything else is stable-sorted.
pub(crate) fn order_points(points: &mut [TimeSeriesPoint], col: TagColumn, asc: bool) {
    if is_ordered(points, col, asc) { return; }
    if is_ordered(points, col, !asc) {
        points.reverse();
        return;
    }
    debug!(target: "tagwire::exec", "order_points: re-sorting {} points by {}", points.len(), col.name());
    if asc {
        points.sort_by(|a, b| compare(a, b, col));
    } else {
        points.sort_by(|a, b| compare(b, a, col));
    }
}

fn project(p: &TimeSeriesPoint, columns: &[TagColumn]) -> Vec<Value> {
    columns.iter().map(|c| match c {
        TagColumn::Name => Value::Text(p.name.clone()),
        TagColumn::Time => Value::Timestamp(p.time.naive_utc()),
        TagColumn::Value => Value::Double(p.value),
    }).collect()
}
