//! Update engine: `UPDATE ... SET ... WHERE ... [RETURNING ... INTO ...]`.
//!
//! Assignments derive from a sorted map or from the destination entity;
//! auto-update timestamps fill in from the clock, primary keys become WHERE
//! equalities, and updates without an effective predicate are refused unless
//! the statement opts into global updates.

use std::collections::BTreeMap;

use tracing::debug;

use crate::clause::{Assignment, Cond};
use crate::conversion::convert_value;
use crate::create::encode_now;
use crate::dialect::OracleDialect;
use crate::error::{translate, OraError};
use crate::explain::explain_sql;
use crate::query::write_where;
use crate::returning::{apply_outputs, resolve_returning_fields, write_returning_into};
use crate::schema::EntitySchema;
use crate::statement::{ConnPool, Statement};
use crate::value::Value;

/// Where the SET values come from.
pub enum UpdateSource {
    /// Derive assignments from the destination entity's non-zero fields.
    Model,
    /// Explicit column/value pairs; keys may be logical or column names, and
    /// values may be passthrough SQL expressions.
    Map(BTreeMap<String, Value>),
}

/// Entry point of the update callback.
pub fn update(
    dialect: &OracleDialect,
    stmt: &mut Statement<'_>,
    source: UpdateSource,
    pool: &mut dyn ConnPool,
) {
    if !stmt.ok() {
        return;
    }
    let Some(schema) = stmt.schema else {
        stmt.add_error(OraError::InvalidData("update requires an entity schema".into()));
        return;
    };

    let assignments = convert_to_assignments(dialect, stmt, schema, &source);
    if assignments.is_empty() {
        return;
    }

    let table = stmt.table.clone();
    stmt.write_str("UPDATE ");
    stmt.write_quoted(&table);
    stmt.write_str(" SET ");
    for (i, a) in assignments.iter().enumerate() {
        if i > 0 {
            stmt.write_char(',');
        }
        stmt.write_quoted(&a.column);
        stmt.write_char('=');
        let converted = match schema.field_by_db_name(&a.column) {
            Some(f) => convert_value(
                a.value.clone(),
                &dialect.data_type_of(f),
                f.precision,
                f.not_null,
            ),
            None => a.value.clone(),
        };
        stmt.add_var(converted);
    }

    write_where(dialect, stmt);

    if !check_missing_where(stmt) {
        return;
    }

    let mut has_returning = false;
    if let Some(returning) = stmt.clauses.returning.clone() {
        // A destination passed by value cannot receive outputs; RETURNING is
        // silently skipped then, even if requested.
        if stmt.dest.is_some() {
            let fields = resolve_returning_fields(schema, &returning.columns);
            if !fields.is_empty() {
                stmt.write_str(" RETURNING ");
                write_returning_into(stmt, &fields, 0);
                has_returning = true;
            }
        }
    }

    debug!(sql = %explain_sql(&stmt.sql, &stmt.vars), "update");

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

/// Refuse to run without an effective WHERE predicate.
pub fn check_missing_where(stmt: &mut Statement<'_>) -> bool {
    if stmt.allow_global_update {
        return true;
    }
    let has_where = stmt
        .clauses
        .where_clause
        .as_ref()
        .map(|w| !w.is_empty())
        .unwrap_or(false);
    if !has_where {
        stmt.add_error(OraError::MissingWhereClause);
        return false;
    }
    true
}

/// Primary-key predicates from the destination rows: an `IN` list across a
/// slice, per-field equalities for a single entity.
pub fn add_primary_where(stmt: &mut Statement<'_>, schema: &EntitySchema) {
    let Some(dest) = stmt.dest.as_deref_mut() else {
        return;
    };
    let primary = schema.primary_fields();
    if primary.is_empty() || dest.is_empty() {
        return;
    }

    let rows = dest.len();
    let mut conds = Vec::new();
    if rows == 1 {
        for pf in &primary {
            let v = dest.value_of(0, pf.index);
            if !v.is_zero() {
                conds.push(Cond::Eq {
                    column: pf.db_name.clone(),
                    value: v,
                });
            }
        }
    } else if primary.len() == 1 {
        let pf = primary[0];
        let values: Vec<Value> = (0..rows)
            .map(|r| dest.value_of(r, pf.index))
            .filter(|v| !v.is_zero())
            .collect();
        if !values.is_empty() {
            conds.push(Cond::In {
                column: pf.db_name.clone(),
                values,
            });
        }
    } else {
        // Composite key over several rows: one AND group per row.
        let mut groups = Vec::new();
        for r in 0..rows {
            let group: Vec<Cond> = primary
                .iter()
                .map(|pf| Cond::Eq {
                    column: pf.db_name.clone(),
                    value: dest.value_of(r, pf.index),
                })
                .collect();
            if group.iter().all(|c| match c {
                Cond::Eq { value, .. } => !value.is_zero(),
                _ => true,
            }) {
                groups.push(Cond::And(group));
            }
        }
        if !groups.is_empty() {
            conds.push(Cond::Or(groups));
        }
    }

    if !conds.is_empty() {
        stmt.clauses.add_where(conds);
    }
}

fn convert_to_assignments(
    dialect: &OracleDialect,
    stmt: &mut Statement<'_>,
    schema: &EntitySchema,
    source: &UpdateSource,
) -> Vec<Assignment> {
    let now = dialect.now();
    let mut set = Vec::new();

    match source {
        UpdateSource::Map(map) => {
            for (key, value) in map {
                match schema.look_up_field(key) {
                    Some(field) if !field.db_name.is_empty() => {
                        if !field.updatable {
                            continue;
                        }
                        set.push(Assignment {
                            column: field.db_name.clone(),
                            value: value.clone(),
                        });
                        assign_to_dest(stmt, field.index, value);
                    }
                    _ => set.push(Assignment {
                        column: key.clone(),
                        value: value.clone(),
                    }),
                }
            }

            // Auto-update timestamps missing from the map refresh from the
            // clock.
            for field in &schema.fields {
                if let Some(unit) = field.auto_update_time {
                    if map.contains_key(&field.name) || map.contains_key(&field.db_name) {
                        continue;
                    }
                    let value = encode_now(now, unit);
                    set.push(Assignment {
                        column: field.db_name.clone(),
                        value: value.clone(),
                    });
                    assign_to_dest(stmt, field.index, &value);
                }
            }

            add_primary_where(stmt, schema);
        }
        UpdateSource::Model => {
            let Some(dest_len) = stmt.dest.as_deref().map(|d| d.len()) else {
                return set;
            };
            if dest_len == 0 {
                return set;
            }
            for field in &schema.fields {
                if field.embedded || field.db_name.is_empty() {
                    continue;
                }
                if field.primary_key {
                    continue; // keys participate as WHERE equalities
                }
                if !field.updatable {
                    continue;
                }
                let value = stmt
                    .dest
                    .as_deref()
                    .map(|d| d.value_of(0, field.index))
                    .unwrap_or(Value::Null);
                if let Some(unit) = field.auto_update_time {
                    let value = encode_now(now, unit);
                    set.push(Assignment {
                        column: field.db_name.clone(),
                        value: value.clone(),
                    });
                    assign_to_dest(stmt, field.index, &value);
                } else if !value.is_zero() {
                    set.push(Assignment {
                        column: field.db_name.clone(),
                        value,
                    });
                }
            }
            add_primary_where(stmt, schema);
        }
    }

    set
}

fn assign_to_dest(stmt: &mut Statement<'_>, field: usize, value: &Value) {
    // SQL expressions resolve server-side; nothing meaningful to copy back.
    if matches!(value, Value::Expr(_)) {
        return;
    }
    if let Some(dest) = stmt.dest.as_deref_mut() {
        for r in 0..dest.len() {
            dest.assign(r, field, value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::Returning;
    use crate::dialect::{Config, ServerVersion};
    use crate::naming::NamingStrategy;
    use crate::schema::{DataKind, EntityRows, EntitySchema, Field};
    use crate::statement::ExecResult;
    use crate::value::SqlExpr;

    struct Rows {
        data: Vec<Vec<Value>>,
    }

    impl EntityRows for Rows {
        fn len(&self) -> usize {
            self.data.len()
        }
        fn value_of(&self, row: usize, field: usize) -> Value {
            self.data[row].get(field).cloned().unwrap_or(Value::Null)
        }
        fn assign(&mut self, row: usize, field: usize, value: Value) {
            while self.data[row].len() <= field {
                self.data[row].push(Value::Null);
            }
            self.data[row][field] = value;
        }
    }

    struct ScriptedPool {
        sqls: Vec<String>,
        outputs: Vec<Value>,
        fail_with: Option<OraError>,
    }

    impl ConnPool for ScriptedPool {
        fn exec(&mut self, sql: &str, vars: &[Value]) -> Result<ExecResult, OraError> {
            self.sqls.push(sql.to_string());
            if let Some(err) = self.fail_with.clone() {
                return Err(err);
            }
            let n_out = vars.iter().filter(|v| v.is_out()).count();
            Ok(ExecResult {
                rows_affected: 1,
                outputs: self.outputs.iter().take(n_out).cloned().collect(),
            })
        }
        fn query(&mut self, _sql: &str, _vars: &[Value]) -> Result<Vec<Vec<Value>>, OraError> {
            Ok(Vec::new())
        }
    }

    fn dialect() -> OracleDialect {
        OracleDialect::for_version(Config::default(), ServerVersion { major: 19, minor: 0 })
    }

    fn counter_schema() -> EntitySchema {
        EntitySchema::new("counters")
            .field(Field::new("id", DataKind::Int).primary_key())
            .field(Field::new("count", DataKind::Int))
    }

    #[test]
    fn map_update_with_expression_and_returning() {
        let d = dialect();
        let schema = counter_schema();
        let mut rows = Rows {
            data: vec![vec![Value::Int(7), Value::Int(7)]],
        };
        let mut stmt = Statement::new(&schema, NamingStrategy::default());
        stmt.table = "COUNTERS".into();
        stmt.dest = Some(&mut rows);
        stmt.clauses.returning = Some(Returning::default());

        let mut map = BTreeMap::new();
        map.insert(
            "count".to_string(),
            Value::Expr(SqlExpr::raw("\"COUNT\" + 1")),
        );
        let mut pool = ScriptedPool {
            sqls: vec![],
            outputs: vec![Value::Int(7), Value::Int(8)],
            fail_with: None,
        };
        update(&d, &mut stmt, UpdateSource::Map(map), &mut pool);

        assert!(stmt.ok(), "unexpected error: {:?}", stmt.error);
        assert!(stmt.sql.starts_with("UPDATE \"COUNTERS\" SET \"COUNT\"=\"COUNT\" + 1"));
        assert!(stmt.sql.contains(" WHERE \"ID\" = :1"));
        assert!(stmt.sql.contains(" RETURNING \"ID\",\"COUNT\" INTO :2, :3"));
        // The incremented value streamed back into the entity.
        assert_eq!(rows.data[0][1], Value::Int(8));
    }

    #[test]
    fn missing_where_is_refused() {
        let d = dialect();
        let schema = counter_schema();
        let mut rows = Rows {
            data: vec![vec![Value::Null, Value::Int(3)]],
        };
        let mut stmt = Statement::new(&schema, NamingStrategy::default());
        stmt.table = "COUNTERS".into();
        stmt.dest = Some(&mut rows);
        let mut map = BTreeMap::new();
        map.insert("count".to_string(), Value::Int(1));
        let mut pool = ScriptedPool {
            sqls: vec![],
            outputs: vec![],
            fail_with: None,
        };
        update(&d, &mut stmt, UpdateSource::Map(map), &mut pool);
        assert_eq!(stmt.error, Some(OraError::MissingWhereClause));
        assert!(pool.sqls.is_empty());
    }

    #[test]
    fn allow_global_update_bypasses_where_check() {
        let d = dialect();
        let schema = counter_schema();
        let mut rows = Rows {
            data: vec![vec![Value::Null, Value::Int(3)]],
        };
        let mut stmt = Statement::new(&schema, NamingStrategy::default());
        stmt.table = "COUNTERS".into();
        stmt.dest = Some(&mut rows);
        stmt.allow_global_update = true;
        let mut map = BTreeMap::new();
        map.insert("count".to_string(), Value::Int(1));
        let mut pool = ScriptedPool {
            sqls: vec![],
            outputs: vec![],
            fail_with: None,
        };
        update(&d, &mut stmt, UpdateSource::Map(map), &mut pool);
        assert!(stmt.ok());
        assert_eq!(pool.sqls.len(), 1);
    }

    #[test]
    fn model_update_uses_nonzero_fields() {
        let d = dialect();
        let schema = counter_schema();
        let mut rows = Rows {
            data: vec![vec![Value::Int(7), Value::Int(42)]],
        };
        let mut stmt = Statement::new(&schema, NamingStrategy::default());
        stmt.table = "COUNTERS".into();
        stmt.dest = Some(&mut rows);
        let mut pool = ScriptedPool {
            sqls: vec![],
            outputs: vec![],
            fail_with: None,
        };
        update(&d, &mut stmt, UpdateSource::Model, &mut pool);
        assert!(stmt.ok());
        assert!(stmt.sql.starts_with("UPDATE \"COUNTERS\" SET \"COUNT\"=:1"));
        assert!(stmt.sql.contains(" WHERE \"ID\" = :2"));
    }

    #[test]
    fn zero_row_returning_error_is_swallowed() {
        let d = dialect();
        let schema = counter_schema();
        let mut rows = Rows {
            data: vec![vec![Value::Int(7), Value::Int(7)]],
        };
        let mut stmt = Statement::new(&schema, NamingStrategy::default());
        stmt.table = "COUNTERS".into();
        stmt.dest = Some(&mut rows);
        stmt.clauses.returning = Some(Returning::default());
        let mut map = BTreeMap::new();
        map.insert("count".to_string(), Value::Int(1));
        let mut pool = ScriptedPool {
            sqls: vec![],
            outputs: vec![],
            fail_with: Some(OraError::Driver(
                "output parameter should be pointer type".into(),
            )),
        };
        update(&d, &mut stmt, UpdateSource::Map(map), &mut pool);
        assert!(stmt.ok());
        assert_eq!(stmt.rows_affected, 0);
    }

    #[test]
    fn slice_dest_uses_pk_in_list() {
        let d = dialect();
        let schema = counter_schema();
        let mut rows = Rows {
            data: vec![
                vec![Value::Int(1), Value::Int(0)],
                vec![Value::Int(2), Value::Int(0)],
            ],
        };
        let mut stmt = Statement::new(&schema, NamingStrategy::default());
        stmt.table = "COUNTERS".into();
        stmt.dest = Some(&mut rows);
        let mut map = BTreeMap::new();
        map.insert("count".to_string(), Value::Int(5));
        let mut pool = ScriptedPool {
            sqls: vec![],
            outputs: vec![],
            fail_with: None,
        };
        update(&d, &mut stmt, UpdateSource::Map(map), &mut pool);
        assert!(stmt.sql.contains(" WHERE \"ID\" IN (:2,:3)"));
    }
}
