//! The statement: SQL buffer, positional variable list, clause set and the
//! driver surface it executes against.

use crate::clause::Clauses;
use crate::error::{OraError, OraResult};
use crate::naming::{is_quoted, quote_ident, NamingStrategy};
use crate::schema::{EntityRows, EntitySchema};
use crate::value::{SqlExpr, Value};

/// Result of one driver execution. `outputs` carries the server-assigned
/// values for the `Out` binds of the variable list, in bind order.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub outputs: Vec<Value>,
}

/// The host driver surface: prepared execution with positional binds.
/// Cancellation and pooling live behind this trait; the core never retries.
pub trait ConnPool {
    fn exec(&mut self, sql: &str, vars: &[Value]) -> OraResult<ExecResult>;

    fn query(&mut self, sql: &str, vars: &[Value]) -> OraResult<Vec<Vec<Value>>>;

    fn query_row(&mut self, sql: &str, vars: &[Value]) -> OraResult<Option<Vec<Value>>> {
        Ok(self.query(sql, vars)?.into_iter().next())
    }
}

/// A single request in flight. Owns its SQL buffer and variable list; no
/// state is shared across statements.
pub struct Statement<'a> {
    pub table: String,
    pub schema: Option<&'a EntitySchema>,
    pub dest: Option<&'a mut dyn EntityRows>,
    pub clauses: Clauses,
    pub sql: String,
    pub vars: Vec<Value>,
    pub dry_run: bool,
    pub allow_global_update: bool,
    pub rows_affected: u64,
    pub error: Option<OraError>,
    naming: NamingStrategy,
}

impl<'a> Statement<'a> {
    pub fn new(schema: &'a EntitySchema, naming: NamingStrategy) -> Self {
        Self {
            table: schema.table.clone(),
            schema: Some(schema),
            dest: None,
            clauses: Clauses::default(),
            sql: String::new(),
            vars: Vec::new(),
            dry_run: false,
            allow_global_update: false,
            rows_affected: 0,
            error: None,
            naming,
        }
    }

    /// A schema-less statement addressing a raw table name.
    pub fn for_table(table: impl Into<String>, naming: NamingStrategy) -> Self {
        Self {
            table: table.into(),
            schema: None,
            dest: None,
            clauses: Clauses::default(),
            sql: String::new(),
            vars: Vec::new(),
            dry_run: false,
            allow_global_update: false,
            rows_affected: 0,
            error: None,
            naming,
        }
    }

    pub fn dest(mut self, dest: &'a mut dyn EntityRows) -> Self {
        self.dest = Some(dest);
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn naming(&self) -> &NamingStrategy {
        &self.naming
    }

    /// Record an error; the first one wins and suppresses execution.
    pub fn add_error(&mut self, err: OraError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    pub fn ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn write_str(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    pub fn write_char(&mut self, c: char) {
        self.sql.push(c);
    }

    /// Append a bind value and write its one-based `:n` placeholder.
    pub fn add_var(&mut self, value: Value) {
        match value {
            Value::Expr(expr) => self.write_expr(&expr),
            other => {
                self.vars.push(other);
                self.sql.push(':');
                self.sql.push_str(&self.vars.len().to_string());
            }
        }
    }

    /// Write an inline fragment, each `?` consuming one of its vars.
    pub fn write_expr(&mut self, expr: &SqlExpr) {
        let mut vars = expr.vars.iter();
        for c in expr.sql.chars() {
            if c == '?' {
                match vars.next() {
                    Some(v) => self.add_var(v.clone()),
                    None => self.sql.push('?'),
                }
            } else {
                self.sql.push(c);
            }
        }
    }

    /// Quote an identifier into the buffer: each dotted part is normalized
    /// and emitted double-quoted (quoted-uppercase is equivalent to unquoted
    /// on Oracle, and case-sensitive modes need the quotes anyway).
    pub fn write_quoted(&mut self, name: &str) {
        let rendered = self.quoted(name);
        self.sql.push_str(&rendered);
    }

    /// The quoted form of an identifier, without writing it.
    pub fn quoted(&self, name: &str) -> String {
        quoted_ident(&self.naming, name)
    }
}

/// Quote a possibly dotted identifier with the given policy; already-quoted
/// parts are preserved verbatim.
pub fn quoted_ident(naming: &NamingStrategy, name: &str) -> String {
    name.split('.')
        .map(|part| {
            if is_quoted(part) {
                part.to_string()
            } else {
                quote_ident(&naming.dictionary_case(part))
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataKind, EntitySchema, Field};

    fn schema() -> EntitySchema {
        EntitySchema::new("USERS").field(Field::new("id", DataKind::Int).primary_key())
    }

    #[test]
    fn add_var_is_one_based() {
        let s = schema();
        let mut stmt = Statement::new(&s, NamingStrategy::default());
        stmt.write_str("SELECT ");
        stmt.add_var(Value::Int(1));
        stmt.write_str(",");
        stmt.add_var(Value::Int(2));
        assert_eq!(stmt.sql, "SELECT :1,:2");
        assert_eq!(stmt.vars.len(), 2);
    }

    #[test]
    fn expr_vars_are_flattened() {
        let s = schema();
        let mut stmt = Statement::new(&s, NamingStrategy::default());
        stmt.add_var(Value::Expr(SqlExpr::new(
            "CAST(? AS VARCHAR2(64))",
            vec![Value::Text("x".into())],
        )));
        assert_eq!(stmt.sql, "CAST(:1 AS VARCHAR2(64))");
        assert_eq!(stmt.vars, vec![Value::Text("x".into())]);
    }

    #[test]
    fn write_quoted_normalizes_and_quotes() {
        let s = schema();
        let mut stmt = Statement::new(&s, NamingStrategy::default());
        stmt.write_quoted("users");
        stmt.write_str(".");
        stmt.write_quoted("\"mixedCase\"");
        assert_eq!(stmt.sql, "\"USERS\".\"mixedCase\"");
    }

    #[test]
    fn first_error_wins() {
        let s = schema();
        let mut stmt = Statement::new(&s, NamingStrategy::default());
        stmt.add_error(OraError::MissingWhereClause);
        stmt.add_error(OraError::EmptySlice);
        assert_eq!(stmt.error, Some(OraError::MissingWhereClause));
    }
}
