use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::server::query::query_common::*;
use crate::server::query::query_tokens::{tokenize, TokKind, TokenCursor};

/// Words that may not appear as bare identifiers in this dialect.
const RESERVED: &[&str] = &[
    "ALL", "AND", "AS", "ASC", "BETWEEN", "BY", "DESC", "DISTINCT", "FROM", "GROUP", "HAVING",
    "IN", "IS", "JOIN", "LIKE", "LIMIT", "NOT", "NULL", "OFFSET", "ON", "OR", "ORDER", "SELECT",
    "UNION", "WHERE",
];

/// Largest target list accepted, as in PostgreSQL.
pub const MAX_TARGET_LIST: usize = 1664;

/// Column or table reference. Unquoted identifiers keep their spelling; names are
/// matched case-sensitively by the executor.
pub(crate) fn parse_ident(cur: &mut TokenCursor) -> AppResult<String> {
    let tok = cur.peek().clone();
    match tok.kind {
        TokKind::Word { text, quoted: true } => { cur.next(); Ok(text) }
        TokKind::Word { text, quoted: false } if !RESERVED.iter().any(|r| text.eq_ignore_ascii_case(r)) => {
            cur.next();
            Ok(text)
        }
        _ => Err(cur.unexpected()),
    }
}

fn parse_projection(cur: &mut TokenCursor) -> AppResult<Projection> {
    if cur.eat(&TokKind::Star) { return Ok(Projection::All); }
    let mut cols = vec![parse_ident(cur)?];
    while cur.eat(&TokKind::Comma) {
        if cols.len() == MAX_TARGET_LIST {
            return Err(AppError::program_limit(format!("target lists can have at most {} entries", MAX_TARGET_LIST)));
        }
        cols.push(parse_ident(cur)?);
    }
    Ok(Projection::Columns(cols))
}

fn parse_literal(cur: &mut TokenCursor) -> AppResult<Literal> {
    let tok = cur.peek().clone();
    match tok.kind {
        TokKind::Str(s) => { cur.next(); Ok(Literal::Str(s)) }
        TokKind::Number(n) => { cur.next(); Ok(Literal::Number(n)) }
        TokKind::Op(ref sign) if sign == "-" || sign == "+" => {
            if let TokKind::Number(n) = &cur.peek_at(1).kind {
                let lit = if sign == "-" { format!("-{}", n) } else { n.clone() };
                cur.next();
                cur.next();
                Ok(Literal::Number(lit))
            } else {
                Err(cur.unexpected())
            }
        }
        _ => Err(cur.unexpected()),
    }
}

fn parse_where(cur: &mut TokenCursor) -> AppResult<Predicate> {
    let column = parse_ident(cur)?;
    if !cur.eat(&TokKind::Eq) {
        // range operators, IS, IN, LIKE and friends all land here
        return Err(cur.unexpected());
    }
    let value = parse_literal(cur)?;
    Ok(Predicate { column, value })
}

fn parse_order_by(cur: &mut TokenCursor) -> AppResult<OrderBy> {
    let column = parse_ident(cur)?;
    let asc = if cur.eat_kw("DESC") { false } else { cur.eat_kw("ASC"); true };
    Ok(OrderBy { column, asc })
}

fn parse_limit(cur: &mut TokenCursor) -> AppResult<Option<u64>> {
    if cur.eat_kw("ALL") { return Ok(None); }
    let tok = cur.peek().clone();
    match tok.kind {
        TokKind::Number(ref n) => {
            let v = n.parse::<u64>()
                .map_err(|_| AppError::syntax(tok.pos, format!("invalid LIMIT value \"{}\"", n)))?;
            cur.next();
            Ok(Some(v))
        }
        TokKind::Op(ref op) if op == "-" && matches!(cur.peek_at(1).kind, TokKind::Number(_)) => {
            Err(AppError::syntax(tok.pos, "LIMIT must not be negative"))
        }
        _ => Err(cur.unexpected()),
    }
}

/// Parse the SELECT grammar starting right after the `SELECT` keyword.
pub(crate) fn parse_select_body(cur: &mut TokenCursor, sql: &str) -> AppResult<Query> {
    let projection = parse_projection(cur)?;
    cur.expect_kw("FROM")?;
    let table = parse_ident(cur)?;
    let predicate = if cur.eat_kw("WHERE") { Some(parse_where(cur)?) } else { None };
    let order_by = if cur.eat_kw("ORDER") {
        cur.expect_kw("BY")?;
        Some(parse_order_by(cur)?)
    } else { None };
    let limit = if cur.eat_kw("LIMIT") { parse_limit(cur)? } else { None };
    cur.finish()?;
    let q = Query { projection, table, predicate, order_by, limit, original_sql: sql.to_string() };
    debug!(target: "tagwire::exec", "parse_select: {:?}", q);
    Ok(q)
}

/// Standalone entry point for a full `SELECT ... FROM ...` statement.
pub fn parse_select(sql: &str) -> AppResult<Query> {
    let mut cur = TokenCursor::new(tokenize(sql)?);
    cur.expect_kw("SELECT")?;
    parse_select_body(&mut cur, sql)
}
