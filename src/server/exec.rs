// Query execution against the tag store.
// SELECT evaluation lives in exec_select.rs; shared result types in exec_common.rs.
pub mod exec_common;  // result values and result-set shapes
pub mod exec_select;  // SELECT validation, fetch, order, limit, projection

use std::sync::Arc;

use tracing::debug;

use crate::error::AppResult;
use crate::server::query::{self, Command};
use crate::server::schema::{ColumnType, TableSchema};
use crate::storage::SharedStore;

pub use exec_common::*;
pub use exec_select::run_select;

/// Everything a connection needs to answer queries. Cloned per connection.
#[derive(Clone)]
pub struct ExecContext {
    pub store: SharedStore,
    pub schema: Arc<TableSchema>,
}

impl ExecContext {
    pub fn new(store: SharedStore, schema: TableSchema) -> Self {
        Self { store, schema: Arc::new(schema) }
    }
}

/// Parse and run one simple-query string.
pub fn execute_query(ctx: &ExecContext, sql: &str) -> AppResult<QueryOutcome> {
    let cmd = query::parse(sql)?;
    execute_command(ctx, cmd)
}

pub fn execute_command(ctx: &ExecContext, cmd: Command) -> AppResult<QueryOutcome> {
    match cmd {
        Command::Select(q) => Ok(QueryOutcome::Rows(run_select(ctx, &q)?)),
        Command::Probe(n) => {
            debug!(target: "tagwire::exec", "probe SELECT {}", n);
            Ok(QueryOutcome::Rows(ResultSet {
                columns: vec![ResultColumn::new("?column?", ColumnType::Int4)],
                rows: vec![vec![Value::Int4(n as i32)]],
            }))
        }
        Command::Set { name } => {
            debug!(target: "tagwire::exec", "SET {} acknowledged (ignored)", name);
            Ok(QueryOutcome::Command("SET"))
        }
        Command::Empty => Ok(QueryOutcome::Empty),
    }
}

#[cfg(test)]
mod tests;
