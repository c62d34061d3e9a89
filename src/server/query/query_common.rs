//! Parsed forms of the statements accepted over the simple-query protocol.

/// Target list of a SELECT.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    /// Bare identifiers in the order written; duplicates are kept.
    Columns(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    /// Numeric literal as written (sign included).
    Number(String),
}

impl Literal {
    /// Text form used when comparing against a text column.
    pub fn as_text(&self) -> &str {
        match self {
            Literal::Str(s) => s,
            Literal::Number(n) => n,
        }
    }
}

/// `WHERE <column> = <literal>`
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub value: Literal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub asc: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub projection: Projection,
    pub table: String,
    pub predicate: Option<Predicate>,
    pub order_by: Option<OrderBy>,
    /// `None` for no LIMIT or `LIMIT ALL`.
    pub limit: Option<u64>,
    pub original_sql: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Select(Query),
    /// `SELECT <integer>` connectivity probe sent by pools and drivers.
    Probe(i64),
    /// `SET ...` is acknowledged and otherwise ignored.
    Set { name: String },
    /// Whitespace, comments or a lone `;`.
    Empty,
}
