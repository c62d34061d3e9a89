use crate::error::{AppError, AppResult};
use crate::server::query::query_common::*;
use crate::server::query::query_tokens::{TokKind, TokenCursor};

/// `SELECT <integer>` probe. Called right after `SELECT` when the target list
/// starts with a number; anything after the literal other than `;` is an error.
pub(crate) fn parse_probe(cur: &mut TokenCursor) -> AppResult<Command> {
    let first = cur.next();
    let (pos, text) = match first.kind {
        TokKind::Number(n) => (first.pos, n),
        TokKind::Op(ref sign) if sign == "-" => {
            let num = cur.next();
            match num.kind {
                TokKind::Number(n) => (first.pos, format!("-{}", n)),
                _ => return Err(AppError::syntax(num.pos, format!("syntax error at or near \"{}\"", num.display()))),
            }
        }
        _ => return Err(AppError::syntax(first.pos, format!("syntax error at or near \"{}\"", first.display()))),
    };
    let v = text.parse::<i32>()
        .map_err(|_| AppError::syntax(pos, format!("unsupported literal \"{}\"; only int4 probes are answered", text)))?;
    cur.finish()?;
    Ok(Command::Probe(v as i64))
}

/// `SET [SESSION | LOCAL] name { TO | = } value [, ...]` and `SET TIME ZONE value`.
/// The value is not interpreted.
pub(crate) fn parse_set(cur: &mut TokenCursor) -> AppResult<Command> {
    if !cur.eat_kw("SESSION") { cur.eat_kw("LOCAL"); }
    let name = if cur.peek().is_kw("TIME") && cur.peek_at(1).is_kw("ZONE") {
        cur.next();
        cur.next();
        "TimeZone".to_string()
    } else {
        let mut name = set_name_part(cur)?;
        while cur.eat(&TokKind::Dot) {
            name.push('.');
            name.push_str(&set_name_part(cur)?);
        }
        if !cur.eat_kw("TO") && !cur.eat(&TokKind::Eq) { return Err(cur.unexpected()); }
        name
    };
    if matches!(cur.peek().kind, TokKind::Eof | TokKind::Semicolon) { return Err(cur.unexpected()); }
    while !matches!(cur.peek().kind, TokKind::Eof | TokKind::Semicolon) { cur.next(); }
    cur.finish()?;
    Ok(Command::Set { name })
}

fn set_name_part(cur: &mut TokenCursor) -> AppResult<String> {
    match cur.peek().kind.clone() {
        TokKind::Word { text, .. } => { cur.next(); Ok(text) }
        _ => Err(cur.unexpected()),
    }
}
