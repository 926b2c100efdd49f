//! Clause descriptors carried on a statement.
//!
//! Builders consume and return descriptors instead of mutating a shared
//! clause map; the statement simply holds the latest version of each.

use serde::{Deserialize, Serialize};

use crate::value::{SqlExpr, Value};

/// A WHERE condition tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cond {
    Eq { column: String, value: Value },
    In { column: String, values: Vec<Value> },
    /// Raw fragment, `?` placeholders consuming `expr.vars`.
    Raw { expr: SqlExpr },
    And(Vec<Cond>),
    Or(Vec<Cond>),
}

impl Cond {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Cond::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn is_in(column: impl Into<String>, values: Vec<Value>) -> Self {
        Cond::In {
            column: column.into(),
            values,
        }
    }

    pub fn raw(sql: impl Into<String>, vars: Vec<Value>) -> Self {
        Cond::Raw {
            expr: SqlExpr::new(sql, vars),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Where {
    pub conds: Vec<Cond>,
}

impl Where {
    pub fn new(conds: Vec<Cond>) -> Self {
        Self { conds }
    }

    pub fn is_empty(&self) -> bool {
        self.conds.is_empty()
    }
}

/// One `SET` assignment; the value may be a passthrough SQL expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub column: String,
    pub value: Value,
}

impl Assignment {
    pub fn new(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// `ON CONFLICT` semantics; on Oracle this selects the MERGE create path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OnConflict {
    /// Conflict target columns; defaults to the primary key when empty.
    pub columns: Vec<String>,
    pub do_nothing: bool,
    /// Update every non-key column from the incoming row.
    pub update_all: bool,
    pub do_updates: Vec<Assignment>,
}

/// Columns to stream back from the server; empty means every returnable
/// schema field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Returning {
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByColumn {
    pub column: String,
    pub desc: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub columns: Vec<OrderByColumn>,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            columns: vec![OrderByColumn {
                column: column.into(),
                desc: false,
            }],
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            columns: vec![OrderByColumn {
                column: column.into(),
                desc: true,
            }],
        }
    }
}

/// Pagination; a non-positive limit means "no limit".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Limit {
    pub limit: Option<i64>,
    pub offset: i64,
}

impl Limit {
    pub fn rows(&self) -> Option<i64> {
        self.limit.filter(|l| *l > 0)
    }

    pub fn has_offset(&self) -> bool {
        self.offset > 0
    }
}

/// Columns and per-row values for a create; row `r`, column `c` align with
/// `rows[r][c]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateValues {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// The typed clause set of a statement.
#[derive(Debug, Clone, Default)]
pub struct Clauses {
    pub on_conflict: Option<OnConflict>,
    pub returning: Option<Returning>,
    pub where_clause: Option<Where>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<Limit>,
}

impl Clauses {
    /// Append conditions to the WHERE clause, creating it if needed.
    pub fn add_where(&mut self, conds: Vec<Cond>) {
        match &mut self.where_clause {
            Some(w) => w.conds.extend(conds),
            None => self.where_clause = Some(Where::new(conds)),
        }
    }
}
