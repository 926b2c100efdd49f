//! Dialect-specific pagination: `OFFSET ... ROWS FETCH NEXT ... ROWS ONLY`
//! from 12c on, `ROW_NUMBER()` subqueries or `ROWNUM` predicates on 11g.

use crate::dialect::OracleDialect;
use crate::statement::Statement;
use crate::value::Value;

/// Modern (12c+) LIMIT: deterministic ordering is injected when missing,
/// then the offset/fetch fragment is appended with positional binds.
pub fn write_limit(dialect: &OracleDialect, stmt: &mut Statement<'_>) {
    let Some(limit) = stmt.clauses.limit else {
        return;
    };
    let rows = limit.rows();

    if stmt.clauses.order_by.is_none() && rows.is_some() {
        stmt.write_str(" ORDER BY ");
        match stmt.schema.and_then(|s| s.prioritized_primary_field()) {
            Some(pk) => {
                let db_name = pk.db_name.clone();
                stmt.write_quoted(&db_name);
            }
            None => {
                stmt.write_str("(SELECT NULL FROM ");
                stmt.write_str(dialect.dummy_table_name());
                stmt.write_char(')');
            }
        }
    }

    if limit.has_offset() {
        stmt.write_str(" OFFSET ");
        stmt.add_var(Value::Int(limit.offset));
        stmt.write_str(" ROWS");
    }
    if let Some(rows) = rows {
        stmt.write_str(" FETCH NEXT ");
        stmt.add_var(Value::Int(rows));
        stmt.write_str(" ROWS ONLY");
    }
}

/// 11g fallback, operating on the already-built statement text.
///
/// Both offset and limit:
/// ```sql
/// SELECT * FROM (SELECT T.*, ROW_NUMBER() OVER (ORDER BY <cols>) AS ROW_NUM
///   FROM (<original>) T) WHERE ROW_NUM BETWEEN <offset+1> AND <offset+limit>
/// ```
/// Only one of them: a `ROWNUM` predicate spliced ahead of any ORDER BY.
pub fn rewrite_limit_11g(dialect: &OracleDialect, stmt: &mut Statement<'_>) {
    let Some(limit) = stmt.clauses.limit else {
        return;
    };
    let rows = limit.rows();
    let has_offset = limit.has_offset();
    if rows.is_none() && !has_offset {
        return;
    }

    match rows {
        Some(rows) if has_offset => {
            let alias = if dialect.config.row_number_alias_for_oracle11.is_empty() {
                "ROW_NUM"
            } else {
                dialect.config.row_number_alias_for_oracle11.as_str()
            };
            let order_cols = order_by_columns(stmt);
            let original = stmt.sql.trim().to_string();
            stmt.sql = format!(
                "SELECT * FROM (SELECT T.*, ROW_NUMBER() OVER (ORDER BY {}) AS {} FROM ({}) T) WHERE {} BETWEEN {} AND {}",
                order_cols,
                alias,
                original,
                alias,
                limit.offset + 1,
                limit.offset + rows,
            );
        }
        Some(rows) => splice_rownum(stmt, " <= ", rows),
        None => splice_rownum(stmt, " > ", limit.offset),
    }
}

fn splice_rownum(stmt: &mut Statement<'_>, operator: &str, n: i64) {
    let has_where = stmt
        .clauses
        .where_clause
        .as_ref()
        .map(|w| !w.is_empty())
        .unwrap_or(false);
    let fragment = format!(
        "{}ROWNUM{}{}",
        if has_where { " AND " } else { " WHERE " },
        operator,
        n
    );

    // ORDER BY must stay last.
    if let Some(pos) = stmt.sql.find(" ORDER BY") {
        stmt.sql.insert_str(pos, &fragment);
    } else {
        stmt.sql.push_str(&fragment);
    }
}

fn order_by_columns(stmt: &Statement<'_>) -> String {
    match &stmt.clauses.order_by {
        Some(order_by) if !order_by.columns.is_empty() => order_by
            .columns
            .iter()
            .map(|c| {
                if c.desc {
                    format!("{} DESC", c.column)
                } else {
                    c.column.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => "NULL".to_string(),
    }
}
