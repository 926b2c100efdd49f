//! Query composition and the Oracle WHERE transforms: oversized `IN` lists
//! chunked into OR-combined groups (Oracle caps list literals at 1000) and
//! equality right-hand sides coerced through the conversion layer.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::clause::{Cond, Where};
use crate::conversion::convert_value;
use crate::dialect::OracleDialect;
use crate::explain::explain_sql;
use crate::limit::{rewrite_limit_11g, write_limit};
use crate::schema::EntitySchema;
use crate::statement::Statement;

/// Oracle's hard limit on `IN (...)` list size.
pub const IN_CHUNK_SIZE: usize = 1000;

static EQ_EXPR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*([\w".]+)\s*=\s*\?\s*$"#).unwrap());

/// Rewrite a WHERE clause for Oracle. Returns a new descriptor; the caller
/// stores it back on the statement.
pub fn transform_where(
    dialect: &OracleDialect,
    schema: Option<&EntitySchema>,
    where_clause: Where,
) -> Where {
    Where {
        conds: where_clause
            .conds
            .into_iter()
            .map(|c| transform_cond(dialect, schema, c))
            .collect(),
    }
}

fn transform_cond(dialect: &OracleDialect, schema: Option<&EntitySchema>, cond: Cond) -> Cond {
    match cond {
        Cond::In { column, values } if values.len() > IN_CHUNK_SIZE => {
            let chunks = values
                .chunks(IN_CHUNK_SIZE)
                .map(|chunk| Cond::In {
                    column: column.clone(),
                    values: chunk.to_vec(),
                })
                .collect();
            Cond::Or(chunks)
        }
        Cond::Eq { column, value } => {
            let value = match schema.and_then(|s| s.look_up_field(&column)) {
                Some(f) => convert_value(value, &dialect.data_type_of(f), f.precision, f.not_null),
                None => value,
            };
            Cond::Eq { column, value }
        }
        Cond::Raw { mut expr } => {
            // `col = ?` with a single bind coerces like an Eq node.
            if expr.vars.len() == 1 {
                if let Some(caps) = EQ_EXPR_RE.captures(&expr.sql) {
                    let column = caps[1].trim_matches('"').to_string();
                    if let Some(f) = schema.and_then(|s| s.look_up_field(&column)) {
                        let value = expr.vars.pop().unwrap();
                        expr.vars.push(convert_value(
                            value,
                            &dialect.data_type_of(f),
                            f.precision,
                            f.not_null,
                        ));
                    }
                }
            }
            Cond::Raw { expr }
        }
        Cond::And(conds) => Cond::And(
            conds
                .into_iter()
                .map(|c| transform_cond(dialect, schema, c))
                .collect(),
        ),
        Cond::Or(conds) => Cond::Or(
            conds
                .into_iter()
                .map(|c| transform_cond(dialect, schema, c))
                .collect(),
        ),
        other => other,
    }
}

/// Render one condition into the statement buffer.
pub fn write_cond(stmt: &mut Statement<'_>, cond: &Cond) {
    match cond {
        Cond::Eq { column, value } => {
            stmt.write_quoted(column);
            stmt.write_str(" = ");
            stmt.add_var(value.clone());
        }
        Cond::In { column, values } => {
            stmt.write_quoted(column);
            stmt.write_str(" IN (");
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    stmt.write_char(',');
                }
                stmt.add_var(v.clone());
            }
            stmt.write_char(')');
        }
        Cond::Raw { expr } => stmt.write_expr(expr),
        Cond::And(conds) => {
            stmt.write_char('(');
            for (i, c) in conds.iter().enumerate() {
                if i > 0 {
                    stmt.write_str(" AND ");
                }
                write_cond(stmt, c);
            }
            stmt.write_char(')');
        }
        Cond::Or(conds) => {
            stmt.write_char('(');
            for (i, c) in conds.iter().enumerate() {
                if i > 0 {
                    stmt.write_str(" OR ");
                }
                write_cond(stmt, c);
            }
            stmt.write_char(')');
        }
    }
}

/// Write ` WHERE ...` when the statement carries conditions; conditions are
/// transformed for Oracle first.
pub fn write_where(dialect: &OracleDialect, stmt: &mut Statement<'_>) {
    let Some(where_clause) = stmt.clauses.where_clause.take() else {
        return;
    };
    let transformed = transform_where(dialect, stmt.schema, where_clause);
    if !transformed.is_empty() {
        stmt.write_str(" WHERE ");
        for (i, cond) in transformed.conds.iter().enumerate() {
            if i > 0 {
                stmt.write_str(" AND ");
            }
            write_cond(stmt, cond);
        }
    }
    stmt.clauses.where_clause = Some(transformed);
}

fn write_order_by(stmt: &mut Statement<'_>) {
    let Some(order_by) = stmt.clauses.order_by.clone() else {
        return;
    };
    if order_by.columns.is_empty() {
        return;
    }
    stmt.write_str(" ORDER BY ");
    for (i, col) in order_by.columns.iter().enumerate() {
        if i > 0 {
            stmt.write_str(", ");
        }
        stmt.write_quoted(&col.column);
        if col.desc {
            stmt.write_str(" DESC");
        }
    }
}

/// Compose a SELECT over the statement's table, where, order-by and limit
/// clauses, using the pagination form of the detected server version.
pub fn build_query(dialect: &OracleDialect, stmt: &mut Statement<'_>, columns: &[String]) {
    stmt.write_str("SELECT ");
    if columns.is_empty() {
        stmt.write_char('*');
    } else {
        for (i, col) in columns.iter().enumerate() {
            if i > 0 {
                stmt.write_char(',');
            }
            stmt.write_quoted(col);
        }
    }
    stmt.write_str(" FROM ");
    let table = stmt.table.clone();
    stmt.write_quoted(&table);

    write_where(dialect, stmt);
    write_order_by(stmt);

    if dialect.version.supports_fetch_first() {
        write_limit(dialect, stmt);
    } else {
        rewrite_limit_11g(dialect, stmt);
    }
    debug!(sql = %explain_sql(&stmt.sql, &stmt.vars), "query");
}

/// Count query: ordering (and pagination) are stripped, they cannot change
/// the count and Oracle rejects `ORDER BY` in scalar subqueries.
pub fn build_count_query(dialect: &OracleDialect, stmt: &mut Statement<'_>) {
    stmt.write_str("SELECT COUNT(*) FROM ");
    let table = stmt.table.clone();
    stmt.write_quoted(&table);
    write_where(dialect, stmt);
}

/// Row scanning maps returned column names to schema fields. A reserved-word
/// column is stored quoted in the schema (`"USER"`), but the server reports
/// it unquoted, so the scanner needs the bare spelling as an extra alias.
pub fn scan_aliases(schema: &EntitySchema) -> Vec<(String, usize)> {
    schema
        .fields
        .iter()
        .filter_map(|f| {
            let name = f.db_name.as_str();
            if crate::naming::is_quoted(name) {
                let inner = name[1..name.len() - 1].replace("\"\"", "\"");
                if schema.field_by_db_name(&inner).is_none() {
                    return Some((inner, f.index));
                }
            }
            None
        })
        .collect()
}
