//! Schema migrator: idempotent table, column, constraint and index
//! management driven by data-dictionary introspection.

pub mod alter;
pub mod ddl;
pub mod index;
pub mod introspect;

use tracing::debug;

use crate::dialect::OracleDialect;
use crate::error::{OraError, OraResult};
use crate::explain::string_literal;
use crate::naming::TokenKind;
use crate::schema::{CheckDef, EntitySchema, Field, ForeignKeyDef};
use crate::statement::{quoted_ident, ConnPool};
use crate::value::Value;

pub use introspect::ColumnInfo;

/// Oracle type-name equivalence classes; types in the same class never
/// trigger a MODIFY.
pub fn type_aliases(database_type_name: &str) -> &'static [&'static str] {
    match database_type_name.to_lowercase().as_str() {
        "blob" | "raw" | "longraw" | "ocibloblocator" | "ocifilelocator" => {
            &["blob", "raw", "longraw", "ocibloblocator", "ocifilelocator"]
        }
        "clob" | "nclob" | "longvarchar" | "ocicloblocator" => {
            &["clob", "nclob", "longvarchar", "ocicloblocator"]
        }
        "char" | "nchar" | "varchar" | "varchar2" | "nvarchar2" => {
            &["char", "nchar", "varchar", "varchar2", "nvarchar2"]
        }
        "number" | "integer" | "smallint" => &["number", "integer", "smallint"],
        "decimal" | "numeric" | "ibfloat" | "ibdouble" => {
            &["decimal", "numeric", "ibfloat", "ibdouble"]
        }
        "timestampdty" | "timestamp" | "date" => &["timestampdty", "timestamp", "date"],
        "timestamptz_dty" | "timestamp with time zone" => {
            &["timestamptz_dty", "timestamp with time zone"]
        }
        "timestampltz_dty" | "timestampeltz" | "timestamp with local time zone" => &[
            "timestampltz_dty",
            "timestampeltz",
            "timestamp with local time zone",
        ],
        _ => &[],
    }
}

pub struct Migrator<'a> {
    pub dialect: &'a OracleDialect,
    pub pool: &'a mut dyn ConnPool,
    /// Append `PURGE` to `DROP TABLE`, skipping the recycle bin.
    pub purge_on_drop: bool,
    /// Skip foreign-key creation during auto-migration.
    pub disable_foreign_keys: bool,
}

impl<'a> Migrator<'a> {
    pub fn new(dialect: &'a OracleDialect, pool: &'a mut dyn ConnPool) -> Self {
        Self {
            dialect,
            pool,
            purge_on_drop: false,
            disable_foreign_keys: false,
        }
    }

    fn exec(&mut self, sql: &str) -> OraResult<()> {
        debug!(sql, "migrator");
        self.pool.exec(sql, &[]).map(|_| ())
    }

    /// Run every entity's db-name through the naming policy, so reserved
    /// words come back quoted and DDL matches later dictionary lookups.
    fn normalized(&self, schema: &EntitySchema) -> EntitySchema {
        let mut schema = schema.clone();
        for field in &mut schema.fields {
            field.db_name = self.dialect.naming.column_name(&field.db_name);
        }
        schema
    }

    /// Create missing tables and reconcile existing ones: add missing
    /// columns, migrate changed ones, then create missing constraints and
    /// indexes. Running it twice leaves the second pass with nothing to do.
    pub fn auto_migrate(&mut self, schemas: &[&EntitySchema]) -> OraResult<()> {
        for source in schemas {
            let schema = self.normalized(source);
            if !self.has_table(&schema.table)? {
                self.create_table(&schema)?;
                continue;
            }

            let columns =
                introspect::column_types(self.pool, &self.dialect.naming, &schema.table)?;
            for field in &schema.fields {
                if field.embedded || field.ignore_migration || field.db_name.is_empty() {
                    continue;
                }
                let dict_name = self.dialect.naming.dictionary_case(&field.db_name);
                match columns.iter().find(|c| c.name == dict_name) {
                    None => self.add_column(&schema, &field.name)?,
                    Some(info) => {
                        let info = info.clone();
                        self.migrate_column(&schema, field, &info)?;
                    }
                }
            }

            if !self.disable_foreign_keys {
                for fk in &schema.foreign_keys {
                    let name = self.foreign_key_name(&schema, fk);
                    if !self.has_constraint(&schema.table, &name)? {
                        self.exec(&self.fk_constraint_sql(&schema, fk, &name))?;
                    }
                }
            }
            for check in &schema.checks {
                let name = self.check_name(&schema, check);
                if !self.has_constraint(&schema.table, &name)? {
                    self.exec(&self.check_constraint_sql(&schema, check, &name))?;
                }
            }
            for idx in &schema.indexes {
                if !self.has_index(&schema.table, &idx.name)? {
                    let sql = index::build_create_index(self.dialect, &schema, idx)?;
                    self.exec(&sql)?;
                }
            }
        }
        Ok(())
    }

    // ----- tables -----

    pub fn has_table(&mut self, table: &str) -> OraResult<bool> {
        introspect::has_table(self.pool, &self.dialect.naming, table)
    }

    pub fn create_table(&mut self, schema: &EntitySchema) -> OraResult<()> {
        for sql in ddl::create_table_statements(self.dialect, schema) {
            self.exec(&sql)?;
        }
        for idx in &schema.indexes {
            let sql = index::build_create_index(self.dialect, schema, idx)?;
            self.exec(&sql)?;
        }
        Ok(())
    }

    pub fn drop_table(&mut self, table: &str) -> OraResult<()> {
        if !self.has_table(table)? {
            return Ok(());
        }
        let mut sql = format!(
            "DROP TABLE {} CASCADE CONSTRAINTS",
            quoted_ident(&self.dialect.naming, table)
        );
        if self.purge_on_drop {
            sql.push_str(" PURGE");
        }
        self.exec(&sql)
    }

    pub fn rename_table(&mut self, old: &str, new: &str) -> OraResult<()> {
        if !self.has_table(old)? {
            return Ok(());
        }
        let naming = &self.dialect.naming;
        let sql = format!(
            "RENAME {} TO {}",
            quoted_ident(naming, old),
            quoted_ident(naming, new)
        );
        self.exec(&sql)
    }

    /// Tables of the current user, minus Oracle's own bookkeeping.
    pub fn get_tables(&mut self) -> OraResult<Vec<String>> {
        let rows = self.pool.query(
            "SELECT TABLE_NAME FROM USER_TABLES \
             WHERE TABLESPACE_NAME IS NOT NULL AND TABLESPACE_NAME <> 'SYSAUX' \
             AND TABLE_NAME NOT LIKE 'AQ$%' AND TABLE_NAME NOT LIKE 'MVIEW$%' \
             AND TABLE_NAME NOT LIKE 'ROLLING$%'",
            &[],
        )?;
        Ok(rows
            .into_iter()
            .filter_map(|r| match r.into_iter().next() {
                Some(Value::Text(s)) => Some(s),
                _ => None,
            })
            .collect())
    }

    pub fn current_database(&mut self) -> OraResult<Option<String>> {
        let row = self.pool.query_row(
            &format!(
                "SELECT ORA_DATABASE_NAME FROM {}",
                self.dialect.dummy_table_name()
            ),
            &[],
        )?;
        Ok(row.and_then(|r| match r.into_iter().next() {
            Some(Value::Text(s)) => Some(s),
            _ => None,
        }))
    }

    pub fn table_comment(&mut self, table: &str, comment: &str) -> OraResult<()> {
        let sql = ddl::table_comment_statement(self.dialect, table, comment);
        self.exec(&sql)
    }

    // ----- columns -----

    pub fn has_column(&mut self, table: &str, column: &str) -> OraResult<bool> {
        introspect::has_column(self.pool, &self.dialect.naming, table, column)
    }

    pub fn column_types(&mut self, table: &str) -> OraResult<Vec<ColumnInfo>> {
        introspect::column_types(self.pool, &self.dialect.naming, table)
    }

    pub fn add_column(&mut self, schema: &EntitySchema, field_name: &str) -> OraResult<()> {
        let Some(field) = schema.look_up_field(field_name) else {
            return Err(OraError::Migration(format!(
                "failed to look up field with name: {}",
                field_name
            )));
        };
        for sql in alter::add_column_statements(self.dialect, schema, field) {
            self.exec(&sql)?;
        }
        if let Some(comment) = &field.comment {
            let sql = self.column_comment_sql(schema, field, comment);
            self.exec(&sql)?;
        }
        Ok(())
    }

    pub fn drop_column(&mut self, table: &str, column: &str) -> OraResult<()> {
        let naming = &self.dialect.naming;
        let sql = format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quoted_ident(naming, table),
            quoted_ident(naming, column)
        );
        self.exec(&sql)
    }

    /// Reconcile one existing column with the model: type, nullability,
    /// default, identity, then the comment.
    pub fn migrate_column(
        &mut self,
        schema: &EntitySchema,
        field: &Field,
        current: &ColumnInfo,
    ) -> OraResult<()> {
        let current_is_identity = introspect::is_identity_column(
            self.pool,
            &self.dialect.naming,
            &schema.table,
            &field.db_name,
        )?;
        let statements =
            alter::plan_alter_column(self.dialect, schema, field, current, current_is_identity)?;
        for sql in statements {
            self.exec(&sql)?;
        }

        let existing = introspect::column_comment(
            self.pool,
            &self.dialect.naming,
            &schema.table,
            &field.db_name,
        )?;
        if let Some(comment) = &field.comment {
            if existing.as_deref() != Some(comment.as_str()) {
                let sql = self.column_comment_sql(schema, field, comment);
                self.exec(&sql)?;
            }
        }
        Ok(())
    }

    pub fn alter_column(&mut self, schema: &EntitySchema, field_name: &str) -> OraResult<()> {
        if !self.has_column(&schema.table, field_name)? {
            return Ok(());
        }
        let Some(field) = schema.look_up_field(field_name) else {
            return Err(OraError::Migration(format!(
                "failed to look up field with name: {}",
                field_name
            )));
        };
        let dict_name = self.dialect.naming.dictionary_case(&field.db_name);
        let columns = introspect::column_types(self.pool, &self.dialect.naming, &schema.table)?;
        let Some(current) = columns.into_iter().find(|c| c.name == dict_name) else {
            return Ok(());
        };
        let field = field.clone();
        self.migrate_column(schema, &field, &current)
    }

    fn column_comment_sql(&self, schema: &EntitySchema, field: &Field, comment: &str) -> String {
        let naming = &self.dialect.naming;
        format!(
            "COMMENT ON COLUMN {}.{} IS {}",
            quoted_ident(naming, &schema.table),
            quoted_ident(naming, &field.db_name),
            string_literal(comment)
        )
    }

    // ----- constraints -----

    pub fn has_constraint(&mut self, table: &str, name: &str) -> OraResult<bool> {
        introspect::has_constraint(self.pool, &self.dialect.naming, table, name)
    }

    pub fn foreign_key_name(&self, schema: &EntitySchema, fk: &ForeignKeyDef) -> String {
        if fk.name.is_empty() {
            let cols: Vec<&str> = fk.columns.iter().map(|c| c.as_str()).collect();
            self.dialect
                .naming
                .gen_token(TokenKind::Fk, &schema.table, &cols)
        } else {
            fk.name.clone()
        }
    }

    pub fn check_name(&self, schema: &EntitySchema, check: &CheckDef) -> String {
        if check.name.is_empty() {
            self.dialect
                .naming
                .gen_token(TokenKind::Ck, &schema.table, &[])
        } else {
            check.name.clone()
        }
    }

    fn fk_constraint_sql(&self, schema: &EntitySchema, fk: &ForeignKeyDef, name: &str) -> String {
        let naming = &self.dialect.naming;
        let mut sql = format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            quoted_ident(naming, &schema.table),
            quoted_ident(naming, name),
            fk.columns
                .iter()
                .map(|c| quoted_ident(naming, c))
                .collect::<Vec<_>>()
                .join(","),
            quoted_ident(naming, &fk.ref_table),
            fk.ref_columns
                .iter()
                .map(|c| quoted_ident(naming, c))
                .collect::<Vec<_>>()
                .join(",")
        );
        // ON UPDATE actions are dropped; Oracle does not support them.
        if let Some(on_delete) = &fk.on_delete {
            sql.push_str(" ON DELETE ");
            sql.push_str(on_delete);
        }
        sql
    }

    fn check_constraint_sql(&self, schema: &EntitySchema, check: &CheckDef, name: &str) -> String {
        let naming = &self.dialect.naming;
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({})",
            quoted_ident(naming, &schema.table),
            quoted_ident(naming, name),
            check.expr
        )
    }

    pub fn create_constraint(&mut self, schema: &EntitySchema, name: &str) -> OraResult<()> {
        if let Some(fk) = schema
            .foreign_keys
            .iter()
            .find(|fk| self.foreign_key_name(schema, fk) == name)
        {
            let sql = self.fk_constraint_sql(schema, fk, name);
            return self.exec(&sql);
        }
        if let Some(check) = schema
            .checks
            .iter()
            .find(|c| self.check_name(schema, c) == name)
        {
            let sql = self.check_constraint_sql(schema, check, name);
            return self.exec(&sql);
        }
        Err(OraError::Migration(format!(
            "constraint {} is not declared on {}",
            name, schema.table
        )))
    }

    pub fn drop_constraint(&mut self, table: &str, name: &str) -> OraResult<()> {
        let naming = &self.dialect.naming;
        let sql = format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            quoted_ident(naming, table),
            quoted_ident(naming, name)
        );
        self.exec(&sql)
    }

    // ----- indexes -----

    pub fn has_index(&mut self, table: &str, name: &str) -> OraResult<bool> {
        introspect::has_index(self.pool, &self.dialect.naming, table, name)
    }

    pub fn create_index(&mut self, schema: &EntitySchema, name: &str) -> OraResult<()> {
        let Some(idx) = schema.indexes.iter().find(|i| i.name == name) else {
            return Err(OraError::Migration(format!(
                "index {} is not declared on {}",
                name, schema.table
            )));
        };
        let sql = index::build_create_index(self.dialect, schema, idx)?;
        self.exec(&sql)
    }

    pub fn drop_index(&mut self, name: &str) -> OraResult<()> {
        let sql = format!("DROP INDEX {}", quoted_ident(&self.dialect.naming, name));
        self.exec(&sql)
    }

    pub fn rename_index(&mut self, old: &str, new: &str) -> OraResult<()> {
        let naming = &self.dialect.naming;
        let sql = format!(
            "ALTER INDEX {} RENAME TO {}",
            quoted_ident(naming, old),
            quoted_ident(naming, new)
        );
        self.exec(&sql)
    }
}
