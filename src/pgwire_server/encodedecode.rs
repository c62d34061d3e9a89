use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::pgwire_server::oids::pg_type_for;
use crate::pgwire_server::send::BackendMessage;
use crate::pgwire_server::structs::FieldDescription;
use crate::server::exec::{ResultColumn, ResultSet, Value};

/// `timestamp` text output: `YYYY-MM-DD HH:MM:SS[.ffffff]`, fraction at
/// microsecond precision with trailing zeros dropped, `BC` suffix before year 1.
pub fn format_timestamp(t: &NaiveDateTime) -> String {
    let (year, bc) = if t.year() <= 0 { (1 - t.year(), true) } else { (t.year(), false) };
    let mut out = format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", year, t.month(), t.day(), t.hour(), t.minute(), t.second());
    // leap-second nanos (>= 1e9) are folded into the last microsecond
    let micros = (t.nanosecond() / 1_000).min(999_999);
    if micros > 0 {
        let frac = format!("{:06}", micros);
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    if bc { out.push_str(" BC"); }
    out
}

/// `float8` text output with shortest round-trip digits. Exponent form is used
/// outside 1e-4 <= |v| < 1e15, with a signed two-digit minimum exponent.
pub fn format_float8(v: f64) -> String {
    if v.is_nan() { return "NaN".to_string(); }
    if v.is_infinite() { return if v > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }; }
    if v == 0.0 { return if v.is_sign_negative() { "-0".to_string() } else { "0".to_string() }; }
    let sci = format!("{:e}", v);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => return format!("{}", v),
    };
    if (-4..15).contains(&exp) {
        format!("{}", v)
    } else {
        format!("{}e{}{:02}", mantissa, if exp < 0 { '-' } else { '+' }, exp.abs())
    }
}

/// Text-format field value; `None` is SQL NULL.
pub fn encode_value_text(v: &Value) -> Option<String> {
    match v {
        Value::Text(s) => Some(s.clone()),
        Value::Timestamp(t) => Some(format_timestamp(t)),
        Value::Double(f) => Some(format_float8(*f)),
        Value::Int4(i) => Some(i.to_string()),
        Value::Null => None,
    }
}

pub fn field_descriptions(columns: &[ResultColumn]) -> Vec<FieldDescription> {
    columns.iter().map(|c| {
        let (type_oid, type_len) = pg_type_for(c.column_type);
        FieldDescription {
            name: c.name.clone(),
            table_oid: 0,
            column_id: 0,
            type_oid,
            type_len,
            type_modifier: -1,
            format: 0,
        }
    }).collect()
}

/// RowDescription, one DataRow per row, then `SELECT n`.
pub fn encode_result_set(rs: &ResultSet) -> Vec<BackendMessage> {
    let mut out = Vec::with_capacity(rs.rows.len() + 2);
    out.push(BackendMessage::RowDescription(field_descriptions(&rs.columns)));
    for row in &rs.rows {
        out.push(BackendMessage::DataRow(row.iter().map(encode_value_text).collect()));
    }
    out.push(BackendMessage::CommandComplete(format!("SELECT {}", rs.row_count())));
    out
}
