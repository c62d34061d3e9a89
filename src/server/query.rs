//! Restricted SQL front end: one SELECT shape against the tag table, plus the
//! `SET` and `SELECT <n>` chatter that drivers send on connect.

use tracing::debug;

use crate::error::AppResult;

pub mod query_common;
pub mod query_parse_misc;
pub mod query_parse_select;
pub mod query_tokens;

pub use query_common::*;
pub use query_parse_select::parse_select;

use query_parse_misc::{parse_probe, parse_set};
use query_parse_select::parse_select_body;
use query_tokens::{tokenize, TokKind, TokenCursor};

/// Parse one simple-query string into a command.
pub fn parse(sql: &str) -> AppResult<Command> {
    let toks = tokenize(sql)?;
    let mut cur = TokenCursor::new(toks);
    if matches!(cur.peek().kind, TokKind::Eof) { return Ok(Command::Empty); }
    if matches!(cur.peek().kind, TokKind::Semicolon) {
        cur.finish()?;
        return Ok(Command::Empty);
    }
    let cmd = if cur.eat_kw("SELECT") {
        let probe = match &cur.peek().kind {
            TokKind::Number(_) => true,
            TokKind::Op(op) => op == "-" && matches!(cur.peek_at(1).kind, TokKind::Number(_)),
            _ => false,
        };
        if probe { parse_probe(&mut cur)? } else { Command::Select(parse_select_body(&mut cur, sql)?) }
    } else if cur.eat_kw("SET") {
        parse_set(&mut cur)?
    } else {
        return Err(cur.unexpected());
    };
    debug!(target: "tagwire::exec", "parse: {:?}", cmd);
    Ok(cmd)
}

#[cfg(test)]
mod tests;
