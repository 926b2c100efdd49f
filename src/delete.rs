//! Delete engine: `DELETE FROM ... WHERE ... [RETURNING ... INTO ...]`,
//! with primary-key predicates derived from the destination rows and the
//! deleted keys streamed back through the RETURNING binder.

use tracing::debug;

use crate::dialect::OracleDialect;
use crate::error::{translate, OraError};
use crate::explain::explain_sql;
use crate::query::write_where;
use crate::returning::{apply_outputs, is_returnable, write_returning_into};
use crate::statement::{ConnPool, Statement};
use crate::update::{add_primary_where, check_missing_where};

/// Entry point of the delete callback.
pub fn delete(dialect: &OracleDialect, stmt: &mut Statement<'_>, pool: &mut dyn ConnPool) {
    if !stmt.ok() {
        return;
    }
    let Some(schema) = stmt.schema else {
        stmt.add_error(OraError::InvalidData("delete requires an entity schema".into()));
        return;
    };

    add_primary_where(stmt, schema);

    let table = stmt.table.clone();
    stmt.write_str("DELETE FROM ");
    stmt.write_quoted(&table);
    write_where(dialect, stmt);

    if !check_missing_where(stmt) {
        return;
    }

    // Deleted primary keys are returned into the entity rows.
    let mut has_returning = false;
    if stmt.dest.as_deref().map(|d| d.len()) == Some(1) {
        let fields: Vec<_> = schema
            .primary_fields()
            .into_iter()
            .filter(|f| is_returnable(f))
            .collect();
        if !fields.is_empty() {
            stmt.write_str(" RETURNING ");
            write_returning_into(stmt, &fields, 0);
            has_returning = true;
        }
    }

    debug!(sql = %explain_sql(&stmt.sql, &stmt.vars), "delete");

    if stmt.dry_run || !stmt.ok() {
        return;
    }
    match pool.exec(&stmt.sql, &stmt.vars) {
        Ok(res) => {
            stmt.rows_affected += res.rows_affected;
            if has_returning {
                apply_outputs(stmt, &res.outputs);
            }
        }
        Err(e) => {
            if let Some(e) = translate(e) {
                stmt.add_error(e);
            }
        }
    }
}
