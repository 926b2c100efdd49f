//! CREATE TABLE and constraint DDL.

use crate::dialect::OracleDialect;
use crate::explain::string_literal;
use crate::naming::TokenKind;
use crate::schema::{EntitySchema, Field};
use crate::statement::quoted_ident;

/// Full column type for DDL: base type, default, nullability and identity.
pub fn full_data_type(dialect: &OracleDialect, field: &Field) -> String {
    let mut sql = dialect.data_type_of(field);

    if field.has_default_value {
        if let Some(default) = &field.default_value {
            if default != "(-)" {
                sql.push_str(" DEFAULT ");
                sql.push_str(default);
            }
        }
    }
    if field.not_null {
        sql.push_str(" NOT NULL");
    }
    if field.auto_increment {
        sql.push_str(" GENERATED BY DEFAULT AS IDENTITY");
    }
    sql
}

/// Column fragment used by ADD COLUMN: NOT NULL deferred so existing rows can
/// be inspected before the constraint lands.
pub fn add_column_type(dialect: &OracleDialect, field: &Field) -> String {
    let mut sql = dialect.data_type_of(field);
    if field.has_default_value {
        if let Some(default) = &field.default_value {
            if default != "(-)" {
                sql.push_str(" DEFAULT ");
                sql.push_str(default);
            }
        }
    }
    if field.auto_increment {
        sql.push_str(" GENERATED BY DEFAULT AS IDENTITY");
    }
    sql
}

/// The `CREATE TABLE` statement: columns, a named primary-key constraint,
/// then foreign keys (with `ON UPDATE` actions stripped; Oracle rejects
/// them), unique and check constraints. Comments and indexes follow as
/// separate statements.
pub fn create_table_statements(dialect: &OracleDialect, schema: &EntitySchema) -> Vec<String> {
    let naming = &dialect.naming;
    let table = quoted_ident(naming, &schema.table);
    let mut defs: Vec<String> = Vec::new();

    for field in &schema.fields {
        if field.embedded || field.ignore_migration || field.db_name.is_empty() {
            continue;
        }
        defs.push(format!(
            "{} {}",
            quoted_ident(naming, &field.db_name),
            full_data_type(dialect, field)
        ));
    }

    let primary = schema.primary_fields();
    if !primary.is_empty() {
        let cols: Vec<&str> = primary.iter().map(|f| f.db_name.as_str()).collect();
        let name = naming.gen_token(TokenKind::Pk, &schema.table, &cols);
        defs.push(format!(
            "CONSTRAINT {} PRIMARY KEY ({})",
            quoted_ident(naming, &name),
            cols.iter()
                .map(|c| quoted_ident(naming, c))
                .collect::<Vec<_>>()
                .join(",")
        ));
    }

    for fk in &schema.foreign_keys {
        let cols: Vec<&str> = fk.columns.iter().map(|c| c.as_str()).collect();
        let name = if fk.name.is_empty() {
            naming.gen_token(TokenKind::Fk, &schema.table, &cols)
        } else {
            fk.name.clone()
        };
        let mut def = format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            quoted_ident(naming, &name),
            cols.iter()
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
        if let Some(on_delete) = &fk.on_delete {
            def.push_str(" ON DELETE ");
            def.push_str(on_delete);
        }
        defs.push(def);
    }

    for field in &schema.fields {
        if !field.unique || field.primary_key {
            continue;
        }
        let name = naming.gen_token(TokenKind::Uk, &schema.table, &[&field.db_name]);
        defs.push(format!(
            "CONSTRAINT {} UNIQUE ({})",
            quoted_ident(naming, &name),
            quoted_ident(naming, &field.db_name)
        ));
    }

    for check in &schema.checks {
        let name = if check.name.is_empty() {
            naming.gen_token(TokenKind::Ck, &schema.table, &[])
        } else {
            check.name.clone()
        };
        defs.push(format!(
            "CONSTRAINT {} CHECK ({})",
            quoted_ident(naming, &name),
            check.expr
        ));
    }

    let mut statements = vec![format!("CREATE TABLE {} ({})", table, defs.join(","))];
    statements.extend(comment_statements(dialect, schema));
    statements
}

/// Per-column `COMMENT ON COLUMN` statements for declared comments.
pub fn comment_statements(dialect: &OracleDialect, schema: &EntitySchema) -> Vec<String> {
    let naming = &dialect.naming;
    let table = quoted_ident(naming, &schema.table);
    schema
        .fields
        .iter()
        .filter_map(|field| {
            let comment = field.comment.as_deref()?;
            Some(format!(
                "COMMENT ON COLUMN {}.{} IS {}",
                table,
                quoted_ident(naming, &field.db_name),
                string_literal(comment)
            ))
        })
        .collect()
}

/// `COMMENT ON TABLE ... IS '...'`.
pub fn table_comment_statement(dialect: &OracleDialect, table: &str, comment: &str) -> String {
    format!(
        "COMMENT ON TABLE {} IS {}",
        quoted_ident(&dialect.naming, table),
        string_literal(comment)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Config, OracleDialect, ServerVersion};
    use crate::schema::{CheckDef, DataKind, EntitySchema, Field, ForeignKeyDef};

    fn dialect() -> OracleDialect {
        OracleDialect::for_version(Config::default(), ServerVersion { major: 19, minor: 0 })
    }

    fn schema() -> EntitySchema {
        EntitySchema::new("users")
            .field(
                Field::new("id", DataKind::Int)
                    .primary_key()
                    .auto_increment(),
            )
            .field(
                Field::new("name", DataKind::Text)
                    .size(64)
                    .not_null()
                    .comment("display name"),
            )
            .field(Field::new("email", DataKind::Text).size(128).unique())
            .foreign_key(ForeignKeyDef {
                name: String::new(),
                columns: vec!["org_id".into()],
                ref_table: "orgs".into(),
                ref_columns: vec!["id".into()],
                on_delete: Some("CASCADE".into()),
                on_update: Some("CASCADE".into()),
            })
            .check(CheckDef {
                name: String::new(),
                expr: "\"NAME\" <> ' '".into(),
            })
    }

    #[test]
    fn create_table_shape() {
        let d = dialect();
        let stmts = create_table_statements(&d, &schema());
        let create = &stmts[0];
        assert!(create.starts_with("CREATE TABLE \"USERS\" ("));
        assert!(create.contains("\"ID\" INTEGER NOT NULL GENERATED BY DEFAULT AS IDENTITY"));
        assert!(create.contains("\"NAME\" VARCHAR2(64) NOT NULL"));
        assert!(create.contains("PRIMARY KEY (\"ID\")"));
        assert!(create.contains("FOREIGN KEY (\"ORG_ID\") REFERENCES \"ORGS\" (\"ID\")"));
        assert!(create.contains("ON DELETE CASCADE"));
        // Oracle has no ON UPDATE actions.
        assert!(!create.contains("ON UPDATE"));
        assert!(create.contains("UNIQUE (\"EMAIL\")"));
        assert!(create.contains("CHECK (\"NAME\" <> ' ')"));
    }

    #[test]
    fn constraint_names_are_hash_suffixed() {
        let d = dialect();
        let stmts = create_table_statements(&d, &schema());
        let create = &stmts[0];
        assert!(create.contains("CONSTRAINT \"PK_USERS_ID_"));
        assert!(create.contains("CONSTRAINT \"FK_USERS_ORG_ID_"));
        assert!(create.contains("CONSTRAINT \"UK_USERS_EMAIL_"));
    }

    #[test]
    fn column_comments_are_separate_statements() {
        let d = dialect();
        let stmts = create_table_statements(&d, &schema());
        assert!(stmts
            .iter()
            .any(|s| s == "COMMENT ON COLUMN \"USERS\".\"NAME\" IS 'display name'"));
    }

    #[test]
    fn default_values_render_in_ddl() {
        let d = dialect();
        let f = Field::new("created", DataKind::Time).default_value("SYSTIMESTAMP");
        assert_eq!(
            full_data_type(&d, &f),
            "TIMESTAMP WITH TIME ZONE DEFAULT SYSTIMESTAMP"
        );
    }
}
