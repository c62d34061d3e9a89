//! Static schema of the single logical table exposed over pgwire.
//!
//! The table name is configurable (default `example`); the columns are fixed.
//! Identifier matching is case-sensitive: the store's schema defines the
//! canonical spelling.

use crate::error::{AppError, AppResult};

pub const DEFAULT_TABLE: &str = "example";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType { Text, Timestamp, Double, Int4 }

/// A column of the exposed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagColumn { Name, Time, Value }

impl TagColumn {
    /// Expansion order of `*`.
    pub const ALL: [TagColumn; 3] = [TagColumn::Name, TagColumn::Time, TagColumn::Value];

    pub fn name(&self) -> &'static str {
        match self {
            TagColumn::Name => "name",
            TagColumn::Time => "time",
            TagColumn::Value => "value",
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            TagColumn::Name => ColumnType::Text,
            TagColumn::Time => ColumnType::Timestamp,
            TagColumn::Value => ColumnType::Double,
        }
    }

    pub fn lookup(ident: &str) -> Option<TagColumn> {
        TagColumn::ALL.iter().copied().find(|c| c.name() == ident)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    table: String,
}

impl Default for TableSchema {
    fn default() -> Self { Self::new(DEFAULT_TABLE) }
}

impl TableSchema {
    pub fn new<S: Into<String>>(table: S) -> Self { Self { table: table.into() } }

    pub fn table_name(&self) -> &str { &self.table }

    /// The only column a predicate may use.
    pub fn key_column(&self) -> TagColumn { TagColumn::Name }

    pub fn resolve_table(&self, name: &str) -> AppResult<()> {
        if name == self.table { Ok(()) } else { Err(AppError::unknown_table(name)) }
    }

    pub fn resolve_column(&self, name: &str) -> AppResult<TagColumn> {
        TagColumn::lookup(name).ok_or_else(|| AppError::unknown_column(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_resolve_case_sensitively() {
        let s = TableSchema::default();
        assert_eq!(s.resolve_column("time").unwrap(), TagColumn::Time);
        assert!(matches!(s.resolve_column("TIME"), Err(AppError::UnknownIdentifier { .. })));
        assert!(s.resolve_table("example").is_ok());
        assert!(s.resolve_table("Example").is_err());
    }

    #[test]
    fn configured_table_name() {
        let s = TableSchema::new("tags");
        assert!(s.resolve_table("tags").is_ok());
        assert_eq!(s.resolve_table("example").unwrap_err(), AppError::unknown_table("example"));
    }
}
