//! Create engine: plain `INSERT ... RETURNING ... INTO` or a single
//! multi-row `MERGE INTO ... USING (SELECT ... FROM DUAL UNION ALL ...)`
//! when on-conflict semantics are requested and every primary-key column is
//! present in the values payload.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use tracing::debug;

use crate::clause::{Assignment, CreateValues, OnConflict};
use crate::conversion::convert_value;
use crate::dialect::OracleDialect;
use crate::error::OraError;
use crate::explain::explain_sql;
use crate::returning::{apply_outputs, returning_fields_with_default_db_value, write_returning_into};
use crate::schema::{EntitySchema, TimeUnit};
use crate::statement::{ConnPool, Statement};
use crate::value::{SqlExpr, Value};

/// Entry point of the create callback.
pub fn create(dialect: &OracleDialect, stmt: &mut Statement<'_>, pool: &mut dyn ConnPool) {
    if !stmt.ok() {
        return;
    }
    let Some(schema) = stmt.schema else {
        stmt.add_error(OraError::InvalidData("create requires an entity schema".into()));
        return;
    };

    let values = match convert_to_create_values(dialect, stmt) {
        Ok(v) => v,
        Err(e) => {
            stmt.add_error(e);
            return;
        }
    };

    // MERGE only when the conflict target (the primary key) is fully present
    // in the payload; otherwise degrade to plain INSERT.
    let mut has_conflict = stmt.clauses.on_conflict.is_some();
    if has_conflict {
        let primary = schema.primary_fields();
        if primary.is_empty() {
            has_conflict = false;
        } else {
            for pf in &primary {
                if !values.columns.iter().any(|c| c == &pf.db_name) {
                    has_conflict = false;
                }
            }
        }
    }

    if has_conflict {
        let mut on_conflict = stmt.clauses.on_conflict.clone().unwrap_or_default();
        if on_conflict.update_all {
            expand_update_all(dialect, schema, &values, &mut on_conflict);
        }
        merge_create(dialect, stmt, &values, &on_conflict, pool);
    } else {
        insert_create(dialect, stmt, &values, pool);
    }
}

/// Encode the current instant for an auto-timestamp field.
pub(crate) fn encode_now(now: DateTime<FixedOffset>, unit: TimeUnit) -> Value {
    match unit {
        TimeUnit::Instant => Value::Time(now),
        TimeUnit::Secs => Value::Int(now.timestamp()),
        TimeUnit::Millis => Value::Int(now.timestamp_millis()),
        TimeUnit::Nanos => Value::Int(now.timestamp_nanos_opt().unwrap_or_default()),
    }
}

/// Columns in stable declaration order and one value row per destination
/// entity. Auto-create/update timestamps and host-side defaults fill zero
/// values (and are written back into the entity); columns the server may
/// assign are appended only when some row carries a real value, with the
/// `DEFAULT` keyword standing in for the rest.
pub fn convert_to_create_values(
    dialect: &OracleDialect,
    stmt: &mut Statement<'_>,
) -> Result<CreateValues, OraError> {
    let Some(schema) = stmt.schema else {
        return Err(OraError::InvalidData("create requires an entity schema".into()));
    };
    let now = dialect.now();
    let Some(dest) = stmt.dest.as_deref_mut() else {
        return Err(OraError::InvalidData("create requires a destination".into()));
    };

    let rows = dest.len();
    if rows == 0 {
        return Err(OraError::EmptySlice);
    }

    let mut columns = Vec::new();
    let mut included = Vec::new();
    for f in &schema.fields {
        if f.embedded || !f.writable || f.db_name.is_empty() {
            continue;
        }
        if !f.has_default_value || f.default_value_interface.is_some() {
            columns.push(f.db_name.clone());
            included.push(f);
        }
    }

    let mut out_rows = Vec::with_capacity(rows);
    for r in 0..rows {
        let mut row_vals = Vec::with_capacity(included.len());
        for f in &included {
            let mut v = dest.value_of(r, f.index);
            if v.is_zero() {
                if let Some(default) = &f.default_value_interface {
                    v = default.clone();
                    dest.assign(r, f.index, v.clone());
                } else if let Some(unit) = f.auto_create_time.or(f.auto_update_time) {
                    v = encode_now(now, unit);
                    dest.assign(r, f.index, v.clone());
                }
            }
            row_vals.push(v);
        }
        out_rows.push(row_vals);
    }

    for f in schema.fields_with_default_db_value() {
        let vals: Vec<Value> = (0..rows).map(|r| dest.value_of(r, f.index)).collect();
        if vals.iter().any(|v| !v.is_zero()) {
            columns.push(f.db_name.clone());
            for (r, v) in vals.into_iter().enumerate() {
                if v.is_zero() {
                    out_rows[r].push(Value::Expr(SqlExpr::raw("DEFAULT")));
                } else {
                    out_rows[r].push(v);
                }
            }
        }
    }

    Ok(CreateValues {
        columns,
        rows: out_rows,
    })
}

/// Column metadata for value conversion, resolved once per column.
fn column_meta(
    dialect: &OracleDialect,
    schema: &EntitySchema,
    cache: &mut HashMap<String, (String, i32, bool)>,
    column: &str,
) -> (String, i32, bool) {
    if let Some(meta) = cache.get(column) {
        return meta.clone();
    }
    let meta = match schema.field_by_db_name(column) {
        Some(f) => (dialect.data_type_of(f), f.precision, f.not_null),
        None => (String::new(), 0, false),
    };
    cache.insert(column.to_string(), meta.clone());
    meta
}

fn insert_create(
    dialect: &OracleDialect,
    stmt: &mut Statement<'_>,
    values: &CreateValues,
    pool: &mut dyn ConnPool,
) {
    let schema = match stmt.schema {
        Some(s) => s,
        None => return,
    };
    let table = stmt.table.clone();
    let ncols = values.columns.len();

    let returning = returning_fields_with_default_db_value(schema);
    let use_returning = !returning.is_empty() && stmt.dest.is_some();
    // Expression cells (e.g. the DEFAULT keyword) are inlined into the SQL,
    // so rows with differing shapes cannot reuse the first row's text.
    let any_expr = values
        .rows
        .iter()
        .flatten()
        .any(|v| matches!(v, Value::Expr(_)));

    for r in 0..values.rows.len() {
        if r == 0 || any_expr {
            stmt.sql.clear();
            stmt.vars.clear();
            stmt.write_str("INSERT INTO ");
            stmt.write_quoted(&table);
            stmt.write_str(" (");
            for (i, col) in values.columns.iter().enumerate() {
                if i > 0 {
                    stmt.write_char(',');
                }
                stmt.write_quoted(col);
            }
            stmt.write_str(") VALUES (");
            for (i, v) in values.rows[r].iter().enumerate() {
                if i > 0 {
                    stmt.write_char(',');
                }
                stmt.add_var(v.clone());
            }
            stmt.write_char(')');
            if use_returning {
                stmt.write_str(" RETURNING ");
                write_returning_into(stmt, &returning, r);
            }
            if r == 0 {
                debug!(sql = %explain_sql(&stmt.sql, &stmt.vars), "create: insert");
            }
        } else {
            // Same SQL, re-bound from this row's values.
            for (i, v) in values.rows[r].iter().enumerate() {
                stmt.vars[i] = v.clone();
            }
            for var in stmt.vars[ncols..].iter_mut() {
                if let Value::Out(out) = var {
                    out.dest.row = r;
                }
            }
        }

        if stmt.dry_run || !stmt.ok() {
            return;
        }
        match pool.exec(&stmt.sql, &stmt.vars) {
            Ok(res) => {
                stmt.rows_affected += res.rows_affected;
                apply_outputs(stmt, &res.outputs);
            }
            Err(e) => {
                // A failed execution stops the remainder of the batch.
                stmt.add_error(e);
                return;
            }
        }
    }
}

fn merge_create(
    dialect: &OracleDialect,
    stmt: &mut Statement<'_>,
    values: &CreateValues,
    on_conflict: &OnConflict,
    pool: &mut dyn ConnPool,
) {
    let schema = match stmt.schema {
        Some(s) => s,
        None => return,
    };
    let table = stmt.table.clone();
    let mut cache = HashMap::new();

    stmt.write_str("MERGE INTO ");
    stmt.write_quoted(&table);
    stmt.write_str(" USING (");

    for (r, row) in values.rows.iter().enumerate() {
        if r > 0 {
            stmt.write_str(" UNION ALL ");
        }
        stmt.write_str("SELECT ");
        for (i, v) in row.iter().enumerate() {
            if i > 0 {
                stmt.write_char(',');
            }
            let (data_type, precision, not_null) =
                column_meta(dialect, schema, &mut cache, &values.columns[i]);
            stmt.add_var(convert_value(v.clone(), &data_type, precision, not_null));
            stmt.write_str(" AS ");
            stmt.write_quoted(&values.columns[i]);
        }
        stmt.write_str(" FROM ");
        stmt.write_str(dialect.dummy_table_name());
    }

    stmt.write_str(") \"excluded\" ON (");
    for (i, pf) in schema.primary_fields().iter().enumerate() {
        if i > 0 {
            stmt.write_str(" AND ");
        }
        stmt.write_quoted(&table);
        stmt.write_char('.');
        stmt.write_quoted(&pf.db_name);
        stmt.write_str(" = \"excluded\".");
        stmt.write_quoted(&pf.db_name);
    }
    stmt.write_char(')');

    if !on_conflict.do_nothing && !on_conflict.do_updates.is_empty() {
        stmt.write_str(" WHEN MATCHED THEN UPDATE SET ");
        for (i, a) in on_conflict.do_updates.iter().enumerate() {
            if i > 0 {
                stmt.write_char(',');
            }
            stmt.write_quoted(&a.column);
            stmt.write_char('=');
            let (data_type, precision, not_null) =
                column_meta(dialect, schema, &mut cache, &a.column);
            stmt.add_var(convert_value(a.value.clone(), &data_type, precision, not_null));
        }
    }

    // The insert branch omits the auto-increment primary key; the server
    // assigns it.
    let skip = schema
        .prioritized_primary_field()
        .filter(|f| f.auto_increment)
        .map(|f| f.db_name.clone());

    stmt.write_str(" WHEN NOT MATCHED THEN INSERT (");
    let mut written = false;
    for col in &values.columns {
        if skip.as_deref() == Some(col.as_str()) {
            continue;
        }
        if written {
            stmt.write_char(',');
        }
        written = true;
        stmt.write_quoted(col);
    }
    stmt.write_str(") VALUES (");
    written = false;
    for col in &values.columns {
        if skip.as_deref() == Some(col.as_str()) {
            continue;
        }
        if written {
            stmt.write_char(',');
        }
        written = true;
        stmt.write_str("\"excluded\".");
        stmt.write_quoted(col);
    }
    stmt.write_char(')');

    // TODO: recover server-assigned defaults with a follow-up SELECT by
    // primary key; Oracle has no MERGE ... RETURNING.
    let _returning = returning_fields_with_default_db_value(schema);

    debug!(sql = %explain_sql(&stmt.sql, &stmt.vars), "create: merge");

    if stmt.dry_run || !stmt.ok() {
        return;
    }
    match pool.exec(&stmt.sql, &stmt.vars) {
        Ok(res) => stmt.rows_affected += res.rows_affected,
        Err(e) => stmt.add_error(e),
    }
}

/// Expand `update_all` into concrete assignments: every payload column except
/// keys, server-defaulted and create-time fields updates from the incoming
/// row; auto-update-time fields refresh from the clock. Conflict columns
/// default to the primary key.
fn expand_update_all(
    dialect: &OracleDialect,
    schema: &EntitySchema,
    values: &CreateValues,
    on_conflict: &mut OnConflict,
) {
    let now = dialect.now();
    for col in &values.columns {
        let Some(field) = schema.field_by_db_name(col) else {
            continue;
        };
        if field.primary_key || field.auto_create_time.is_some() {
            continue;
        }
        // A literal NULL default still participates in the update list.
        let default_is_null = field
            .default_value
            .as_deref()
            .map(|d| d.eq_ignore_ascii_case("NULL"))
            .unwrap_or(false);
        if field.has_default_value && field.default_value_interface.is_none() && !default_is_null {
            continue;
        }
        if let Some(unit) = field.auto_update_time {
            on_conflict
                .do_updates
                .push(Assignment::new(col.clone(), encode_now(now, unit)));
        } else {
            let quoted = crate::statement::quoted_ident(&dialect.naming, col);
            on_conflict.do_updates.push(Assignment {
                column: col.clone(),
                value: Value::Expr(SqlExpr::raw(format!("\"excluded\".{}", quoted))),
            });
        }
    }
    if on_conflict.do_updates.is_empty() {
        on_conflict.do_nothing = true;
    }
    if on_conflict.columns.is_empty() {
        on_conflict.columns = schema
            .primary_fields()
            .iter()
            .map(|f| f.db_name.clone())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Config, ServerVersion};
    use crate::naming::NamingStrategy;
    use crate::schema::{DataKind, EntityRows, EntitySchema, Field};
    use crate::statement::ExecResult;

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

    struct RecordingPool {
        sqls: Vec<String>,
        outputs: Vec<Value>,
    }

    impl ConnPool for RecordingPool {
        fn exec(&mut self, sql: &str, vars: &[Value]) -> Result<ExecResult, OraError> {
            self.sqls.push(sql.to_string());
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

    fn user_schema() -> EntitySchema {
        EntitySchema::new("users")
            .field(Field::new("id", DataKind::Int).primary_key().auto_increment())
            .field(Field::new("name", DataKind::Text).size(50))
    }

    #[test]
    fn merge_without_returning() {
        let d = dialect();
        let schema = user_schema();
        let mut rows = Rows {
            data: vec![vec![Value::Int(1), Value::Text("Alpha".into())]],
        };
        let mut stmt = Statement::new(&schema, NamingStrategy::default());
        stmt.table = "USERS".into();
        stmt.dest = Some(&mut rows);
        stmt.clauses.on_conflict = Some(OnConflict {
            columns: vec!["id".into()],
            do_updates: vec![Assignment::new("name", Value::Text("Alpha".into()))],
            ..Default::default()
        });
        let mut pool = RecordingPool { sqls: vec![], outputs: vec![] };
        create(&d, &mut stmt, &mut pool);

        assert!(stmt.ok(), "unexpected error: {:?}", stmt.error);
        assert!(stmt.sql.contains("MERGE INTO \"USERS\""));
        assert!(stmt.sql.contains("USING (SELECT "));
        assert!(stmt.sql.contains("FROM DUAL"));
        assert!(stmt.sql.contains("\"excluded\" ON (\"USERS\".\"ID\" = \"excluded\".\"ID\")"));
        assert!(stmt.sql.contains("WHEN MATCHED THEN UPDATE SET"));
        assert!(stmt.sql.contains("WHEN NOT MATCHED THEN INSERT"));
        assert!(!stmt.sql.contains(" RETURNING "));
        // Identity column omitted from the insert branch.
        assert!(stmt.sql.contains("INSERT (\"NAME\") VALUES (\"excluded\".\"NAME\")"));
    }

    #[test]
    fn do_nothing_merge_omits_when_matched() {
        let d = dialect();
        let schema = user_schema();
        let mut rows = Rows {
            data: vec![vec![Value::Int(1), Value::Text("Alpha".into())]],
        };
        let mut stmt = Statement::new(&schema, NamingStrategy::default());
        stmt.table = "USERS".into();
        stmt.dest = Some(&mut rows);
        stmt.clauses.on_conflict = Some(OnConflict {
            columns: vec!["id".into()],
            do_nothing: true,
            ..Default::default()
        });
        let mut pool = RecordingPool { sqls: vec![], outputs: vec![] };
        create(&d, &mut stmt, &mut pool);

        assert!(stmt.ok());
        assert!(stmt.sql.contains("MERGE INTO"));
        assert!(!stmt.sql.contains("WHEN MATCHED"));
        assert!(stmt.sql.contains("WHEN NOT MATCHED THEN INSERT"));
    }

    #[test]
    fn update_all_expands_to_excluded_assignments() {
        let d = dialect();
        let schema = user_schema();
        let mut rows = Rows {
            data: vec![vec![Value::Int(1), Value::Text("Alpha".into())]],
        };
        let mut stmt = Statement::new(&schema, NamingStrategy::default());
        stmt.table = "USERS".into();
        stmt.dest = Some(&mut rows);
        stmt.clauses.on_conflict = Some(OnConflict {
            update_all: true,
            ..Default::default()
        });
        let mut pool = RecordingPool { sqls: vec![], outputs: vec![] };
        create(&d, &mut stmt, &mut pool);

        assert!(stmt.ok());
        assert!(stmt
            .sql
            .contains("WHEN MATCHED THEN UPDATE SET \"NAME\"=\"excluded\".\"NAME\""));
    }

    #[test]
    fn update_all_keeps_fields_with_null_default() {
        let d = dialect();
        let schema = EntitySchema::new("users")
            .field(Field::new("id", DataKind::Int).primary_key())
            .field(
                Field::new("nickname", DataKind::Text)
                    .size(50)
                    .default_value("NULL"),
            );
        let mut rows = Rows {
            data: vec![vec![Value::Int(1), Value::Text("Al".into())]],
        };
        let mut stmt = Statement::new(&schema, NamingStrategy::default());
        stmt.table = "USERS".into();
        stmt.dest = Some(&mut rows);
        stmt.clauses.on_conflict = Some(OnConflict {
            update_all: true,
            ..Default::default()
        });
        let mut pool = RecordingPool { sqls: vec![], outputs: vec![] };
        create(&d, &mut stmt, &mut pool);

        assert!(stmt.ok());
        assert!(stmt
            .sql
            .contains("WHEN MATCHED THEN UPDATE SET \"NICKNAME\"=\"excluded\".\"NICKNAME\""));
    }

    #[test]
    fn merge_degrades_to_insert_without_pk_in_payload() {
        let d = dialect();
        // id is auto-increment with no user value, so the payload lacks the
        // primary key and the upsert falls back to INSERT.
        let schema = user_schema();
        let mut rows = Rows {
            data: vec![vec![Value::Null, Value::Text("Beta".into())]],
        };
        let mut stmt = Statement::new(&schema, NamingStrategy::default());
        stmt.table = "USERS".into();
        stmt.dest = Some(&mut rows);
        stmt.clauses.on_conflict = Some(OnConflict::default());
        let mut pool = RecordingPool { sqls: vec![], outputs: vec![Value::Int(42)] };
        create(&d, &mut stmt, &mut pool);

        assert!(stmt.ok());
        assert!(stmt.sql.starts_with("INSERT INTO \"USERS\" (\"NAME\") VALUES (:1)"));
        assert!(stmt.sql.contains(" RETURNING \"ID\" INTO :2"));
        // Server-assigned identity flowed back into the entity.
        assert_eq!(rows.data[0][0], Value::Int(42));
    }

    #[test]
    fn batch_insert_executes_row_by_row() {
        let d = dialect();
        let schema = user_schema();
        let mut rows = Rows {
            data: vec![
                vec![Value::Null, Value::Text("a".into())],
                vec![Value::Null, Value::Text("b".into())],
                vec![Value::Null, Value::Text("c".into())],
            ],
        };
        let mut stmt = Statement::new(&schema, NamingStrategy::default());
        stmt.table = "USERS".into();
        stmt.dest = Some(&mut rows);
        let mut pool = RecordingPool { sqls: vec![], outputs: vec![Value::Int(1)] };
        create(&d, &mut stmt, &mut pool);

        assert!(stmt.ok());
        assert_eq!(pool.sqls.len(), 3);
        assert_eq!(stmt.rows_affected, 3);
    }

    #[test]
    fn empty_batch_is_an_error() {
        let d = dialect();
        let schema = user_schema();
        let mut rows = Rows { data: vec![] };
        let mut stmt = Statement::new(&schema, NamingStrategy::default());
        stmt.dest = Some(&mut rows);
        let mut pool = RecordingPool { sqls: vec![], outputs: vec![] };
        create(&d, &mut stmt, &mut pool);
        assert_eq!(stmt.error, Some(OraError::EmptySlice));
    }

    #[test]
    fn dry_run_builds_sql_without_executing() {
        let d = dialect();
        let schema = user_schema();
        let mut rows = Rows {
            data: vec![vec![Value::Null, Value::Text("x".into())]],
        };
        let mut stmt = Statement::new(&schema, NamingStrategy::default());
        stmt.table = "USERS".into();
        stmt.dest = Some(&mut rows);
        stmt.dry_run = true;
        let mut pool = RecordingPool { sqls: vec![], outputs: vec![] };
        create(&d, &mut stmt, &mut pool);
        assert!(stmt.sql.starts_with("INSERT INTO"));
        assert!(pool.sqls.is_empty());
    }
}
