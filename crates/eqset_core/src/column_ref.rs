use std::fmt;

use serde::{Deserialize, Serialize};

/// Reference to a table in a bind context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub table_idx: usize,
}

impl From<usize> for TableRef {
    fn from(value: usize) -> Self {
        TableRef { table_idx: value }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.table_idx)
    }
}

/// Reference to a column in a query.
///
/// This is what the planner registers in equal sets when it finds equi-join
/// conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Scope this column is in.
    pub table_scope: TableRef,
    /// Column index within the table.
    pub column: usize,
}

impl ColumnRef {
    pub fn new(table: impl Into<TableRef>, column: usize) -> Self {
        ColumnRef {
            table_scope: table.into(),
            column,
        }
    }
}

impl From<(usize, usize)> for ColumnRef {
    fn from((table, column): (usize, usize)) -> Self {
        ColumnRef::new(table, column)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table_scope, self.column)
    }
}
