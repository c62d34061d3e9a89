use crate::server::schema::ColumnType;

pub const PG_TYPE_INT4: i32 = 23;
pub const PG_TYPE_TEXT: i32 = 25;
pub const PG_TYPE_FLOAT8: i32 = 701;
pub const PG_TYPE_TIMESTAMP: i32 = 1114; // timestamp without time zone

/// (type oid, typlen) advertised in RowDescription. Variable-length types use -1.
pub fn pg_type_for(ct: ColumnType) -> (i32, i16) {
    match ct {
        ColumnType::Text => (PG_TYPE_TEXT, -1),
        ColumnType::Int4 => (PG_TYPE_INT4, 4),
        ColumnType::Double => (PG_TYPE_FLOAT8, 8),
        ColumnType::Timestamp => (PG_TYPE_TIMESTAMP, 8),
    }
}
