use crate::error::AppError;
use crate::server::query::*;

fn select(sql: &str) -> Query {
    match parse(sql).expect("parse") {
        Command::Select(q) => q,
        other => panic!("expected SELECT, got {:?}", other),
    }
}

fn syntax_pos(sql: &str) -> (usize, String) {
    match parse(sql) {
        Err(AppError::Syntax { position, message }) => (position, message),
        other => panic!("expected syntax error for {:?}, got {:?}", sql, other),
    }
}

#[test]
fn parse_full_shape() {
    let q = select("SELECT time, value FROM example WHERE name = 'wave.sin' ORDER BY time DESC LIMIT 5");
    assert_eq!(q.projection, Projection::Columns(vec!["time".into(), "value".into()]));
    assert_eq!(q.table, "example");
    assert_eq!(q.predicate, Some(Predicate { column: "name".into(), value: Literal::Str("wave.sin".into()) }));
    assert_eq!(q.order_by, Some(OrderBy { column: "time".into(), asc: false }));
    assert_eq!(q.limit, Some(5));
}

#[test]
fn parse_star_without_clauses() {
    let q = select("select * from example;");
    assert_eq!(q.projection, Projection::All);
    assert!(q.predicate.is_none());
    assert!(q.order_by.is_none());
    assert!(q.limit.is_none());
    assert_eq!(q.original_sql, "select * from example;");
}

#[test]
fn keywords_are_case_insensitive_identifiers_are_not_folded() {
    let q = select("SeLeCt Value FrOm Example oRdEr bY Time asc LiMiT all");
    assert_eq!(q.projection, Projection::Columns(vec!["Value".into()]));
    assert_eq!(q.table, "Example");
    assert_eq!(q.order_by, Some(OrderBy { column: "Time".into(), asc: true }));
    assert_eq!(q.limit, None);
}

#[test]
fn quoted_identifiers_and_escaped_strings() {
    let q = select(r#"SELECT "name", "time" FROM "example" WHERE "name" = 'it''s'"#);
    assert_eq!(q.projection, Projection::Columns(vec!["name".into(), "time".into()]));
    assert_eq!(q.predicate.unwrap().value, Literal::Str("it's".into()));
    // a quoted keyword is an identifier
    let q = select(r#"SELECT "from" FROM example"#);
    assert_eq!(q.projection, Projection::Columns(vec!["from".into()]));
}

#[test]
fn numeric_literals_in_predicate() {
    let q = select("SELECT * FROM example WHERE name = 42");
    assert_eq!(q.predicate.unwrap().value, Literal::Number("42".into()));
    let q = select("SELECT * FROM example WHERE value = -1.5");
    assert_eq!(q.predicate.unwrap().value, Literal::Number("-1.5".into()));
}

#[test]
fn comments_are_skipped() {
    let q = select("-- leading\nSELECT /* cols */ name FROM example -- trailing");
    assert_eq!(q.projection, Projection::Columns(vec!["name".into()]));
}

#[test]
fn empty_and_chatter_commands() {
    assert_eq!(parse("").unwrap(), Command::Empty);
    assert_eq!(parse("  \n\t").unwrap(), Command::Empty);
    assert_eq!(parse("-- nothing here").unwrap(), Command::Empty);
    assert_eq!(parse(";").unwrap(), Command::Empty);
    assert_eq!(parse("SELECT 1").unwrap(), Command::Probe(1));
    assert_eq!(parse("select -7;").unwrap(), Command::Probe(-7));
    assert_eq!(parse("SET extra_float_digits = 3").unwrap(), Command::Set { name: "extra_float_digits".into() });
    assert_eq!(parse("SET SESSION application_name TO 'psql'").unwrap(), Command::Set { name: "application_name".into() });
    assert_eq!(parse("SET TIME ZONE 'UTC'").unwrap(), Command::Set { name: "TimeZone".into() });
    assert_eq!(parse("set search_path = public, pg_catalog;").unwrap(), Command::Set { name: "search_path".into() });
}

#[test]
fn syntax_error_positions() {
    let (pos, msg) = syntax_pos("SELECT * FROM example WHERE value > 3");
    assert_eq!(pos, 35);
    assert_eq!(msg, "syntax error at or near \">\"");

    let (pos, msg) = syntax_pos("SELEC * FROM example");
    assert_eq!(pos, 1);
    assert_eq!(msg, "syntax error at or near \"SELEC\"");

    let (pos, msg) = syntax_pos("SELECT * FROM");
    assert_eq!(pos, 14);
    assert_eq!(msg, "syntax error at end of input");
}

#[test]
fn compound_predicates_are_rejected() {
    let (_, msg) = syntax_pos("SELECT * FROM example WHERE name = 'a' AND name = 'b'");
    assert_eq!(msg, "syntax error at or near \"AND\"");
    let (_, msg) = syntax_pos("SELECT * FROM example WHERE name = 'a' OR name = 'b'");
    assert_eq!(msg, "syntax error at or near \"OR\"");
    syntax_pos("SELECT * FROM example WHERE name IN ('a')");
    syntax_pos("SELECT * FROM example WHERE name LIKE 'a%'");
}

#[test]
fn placeholders_are_rejected() {
    let (_, msg) = syntax_pos("SELECT * FROM example WHERE name = $1");
    assert_eq!(msg, "syntax error at or near \"$1\"");
    let (_, msg) = syntax_pos("SELECT * FROM example WHERE name = ?");
    assert_eq!(msg, "syntax error at or near \"?\"");
}

#[test]
fn joins_subqueries_and_extra_order_keys_are_rejected() {
    syntax_pos("SELECT * FROM example, other");
    syntax_pos("SELECT * FROM example JOIN other ON name = name");
    syntax_pos("SELECT * FROM (SELECT * FROM example)");
    syntax_pos("SELECT * FROM example ORDER BY time, value");
    syntax_pos("SELECT * FROM example LIMIT 1 OFFSET 2");
    syntax_pos("SELECT * FROM example; SELECT 1");
    syntax_pos("SELECT FROM example");
}

#[test]
fn limit_validation() {
    let (pos, msg) = syntax_pos("SELECT * FROM example LIMIT -1");
    assert_eq!(pos, 29);
    assert_eq!(msg, "LIMIT must not be negative");
    let (_, msg) = syntax_pos("SELECT * FROM example LIMIT 1.5");
    assert!(msg.contains("1.5"));
    assert_eq!(select("SELECT * FROM example LIMIT 0").limit, Some(0));
}

#[test]
fn unterminated_tokens() {
    let (pos, msg) = syntax_pos("SELECT * FROM example WHERE name = 'open");
    assert_eq!(pos, 36);
    assert!(msg.contains("unterminated quoted string"));
    syntax_pos("SELECT * /* never closed FROM example");
}

#[test]
fn positions_count_characters_not_bytes() {
    let (pos, _) = syntax_pos("SELECT * FROM example WHERE name = 'ü' ORDER time");
    // 'ü' is one character but two bytes
    assert_eq!(pos, 46);
}

#[test]
fn parse_select_entry_point() {
    let q = parse_select("SELECT name FROM example LIMIT 3").unwrap();
    assert_eq!(q.limit, Some(3));
    assert!(parse_select("SET x = 1").is_err());
}

fn wide_select(n: usize) -> String {
    format!("SELECT {} FROM example", vec!["name"; n].join(", "))
}

#[test]
fn target_list_is_capped() {
    use crate::server::query::query_parse_select::MAX_TARGET_LIST;
    match select(&wide_select(MAX_TARGET_LIST)).projection {
        Projection::Columns(cols) => assert_eq!(cols.len(), MAX_TARGET_LIST),
        other => panic!("expected columns, got {:?}", other),
    }
    let err = parse(&wide_select(40_000)).unwrap_err();
    assert_eq!(err, AppError::program_limit("target lists can have at most 1664 entries"));
    assert_eq!(err.pgwire_fields().0, "54011");
    assert!(parse(&wide_select(MAX_TARGET_LIST + 1)).is_err());
}
