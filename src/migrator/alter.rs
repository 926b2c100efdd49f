//! Column alteration planning: ADD COLUMN with deferred NOT NULL, MODIFY
//! with nullability/default decisions, identity transitions, and the LOB
//! rewrite path for conversions into `CLOB`/`NCLOB`/`BLOB`.

use crate::dialect::OracleDialect;
use crate::error::{OraError, OraResult};
use crate::naming::fnv1a32;
use crate::schema::{EntitySchema, Field};
use crate::statement::quoted_ident;

use super::introspect::ColumnInfo;

/// Nullability action derived from the model against the dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullAction {
    None,
    SetNotNull,
    SetNull,
}

/// `ALTER TABLE ... ADD (...)`; NOT NULL follows in a second MODIFY so
/// pre-existing rows can be backfilled first.
pub fn add_column_statements(
    dialect: &OracleDialect,
    schema: &EntitySchema,
    field: &Field,
) -> Vec<String> {
    let naming = &dialect.naming;
    let table = quoted_ident(naming, &schema.table);
    let column = quoted_ident(naming, &field.db_name);

    let mut statements = vec![format!(
        "ALTER TABLE {} ADD ({} {})",
        table,
        column,
        super::ddl::add_column_type(dialect, field)
    )];
    if field.not_null {
        statements.push(format!(
            "ALTER TABLE {} MODIFY ({} NOT NULL)",
            table, column
        ));
    }
    statements
}

/// Plan the statements that bring an existing column in line with the model.
pub fn plan_alter_column(
    dialect: &OracleDialect,
    schema: &EntitySchema,
    field: &Field,
    current: &ColumnInfo,
    current_is_identity: bool,
) -> OraResult<Vec<String>> {
    let naming = &dialect.naming;
    let table = quoted_ident(naming, &schema.table);
    let column = quoted_ident(naming, &field.db_name);
    let target_type = dialect.data_type_of(field);

    // LOB targets cannot be reached through MODIFY.
    if is_lob_type(&target_type) && !same_type_family(&current.data_type, &target_type) {
        return lob_rewrite_statements(dialect, schema, field, current);
    }

    let null_action = match (field.not_null, current.nullable) {
        (true, true) => NullAction::SetNotNull,
        (false, false) => NullAction::SetNull,
        _ => NullAction::None,
    };

    let drop_default = !field.has_default_value
        && current.default.is_some()
        && !current_is_identity;

    let type_changed = !same_type_family(&current.data_type, &target_type)
        || size_changed(field, current, &target_type);

    let model_default = if field.has_default_value {
        field.default_value.as_deref().filter(|d| *d != "(-)")
    } else {
        None
    };
    let default_changed = match (model_default, current.default.as_deref()) {
        (Some(d), Some(cur)) => d.trim() != cur.trim(),
        (Some(_), None) => true,
        (None, _) => false,
    };

    let mut fragment = String::new();
    if type_changed {
        fragment.push_str(&target_type);
    }
    if let Some(default) = model_default {
        if default_changed {
            fragment.push_str(" DEFAULT ");
            fragment.push_str(default);
        }
    } else if drop_default {
        fragment.push_str(" DEFAULT NULL");
    }
    match null_action {
        NullAction::SetNotNull => fragment.push_str(" NOT NULL"),
        NullAction::SetNull => fragment.push_str(" NULL"),
        NullAction::None => {}
    }

    let mut statements = Vec::new();
    let fragment = fragment.trim().to_string();
    if !fragment.is_empty() {
        statements.push(format!(
            "ALTER TABLE {} MODIFY ({} {})",
            table, column, fragment
        ));
    }

    // Identity transitions are separate MODIFY statements.
    if field.auto_increment && !current_is_identity {
        statements.push(format!(
            "ALTER TABLE {} MODIFY ({} GENERATED BY DEFAULT AS IDENTITY)",
            table, column
        ));
    } else if !field.auto_increment && current_is_identity {
        statements.push(format!(
            "ALTER TABLE {} MODIFY ({} DROP IDENTITY)",
            table, column
        ));
    }

    Ok(statements)
}

/// The four-step rewrite for conversions into a LOB type: add a hashed temp
/// column, copy, drop the original, rename the temp back. NOT NULL is
/// reapplied afterwards.
pub fn lob_rewrite_statements(
    dialect: &OracleDialect,
    schema: &EntitySchema,
    field: &Field,
    current: &ColumnInfo,
) -> OraResult<Vec<String>> {
    let naming = &dialect.naming;
    let table = quoted_ident(naming, &schema.table);
    let column = quoted_ident(naming, &field.db_name);
    let target_type = dialect.data_type_of(field);

    let anchor = format!(
        "{}.{}",
        naming.dictionary_qualified(&schema.table),
        naming.dictionary_case(&field.db_name)
    );
    let tmp_name = naming.cap(format!(
        "{}_TMP_{:08X}",
        naming.dictionary_case(&field.db_name),
        fnv1a32(anchor.as_bytes())
    ));
    let tmp = quoted_ident(naming, &tmp_name);

    let copy_expr = lob_copy_expr(&current.data_type, &target_type, &field.db_name, &column)?;

    let mut statements = vec![
        format!("ALTER TABLE {} ADD ({} {})", table, tmp, target_type),
        format!("UPDATE {} SET {} = {}", table, tmp, copy_expr),
        format!("ALTER TABLE {} DROP COLUMN {}", table, column),
        format!("ALTER TABLE {} RENAME COLUMN {} TO {}", table, tmp, column),
    ];
    if field.not_null {
        statements.push(format!(
            "ALTER TABLE {} MODIFY ({} NOT NULL)",
            table, column
        ));
    }
    Ok(statements)
}

fn lob_copy_expr(
    from_type: &str,
    target_type: &str,
    column_name: &str,
    quoted_column: &str,
) -> OraResult<String> {
    let from = base_type(from_type);
    let target = base_type(target_type);
    let from_is_char = matches!(
        from.as_str(),
        "VARCHAR2" | "NVARCHAR2" | "CHAR" | "NCHAR" | "LONG" | "CLOB" | "NCLOB"
    );
    match target.as_str() {
        "CLOB" | "NCLOB" if from_is_char => Ok(format!("TO_CLOB({})", quoted_column)),
        "BLOB" if from_is_char => Ok(format!("UTL_RAW.CAST_TO_RAW({})", quoted_column)),
        "BLOB" if matches!(from.as_str(), "RAW" | "LONG RAW") => Ok(quoted_column.to_string()),
        _ => Err(OraError::UnsupportedConversion {
            column: column_name.to_string(),
            from: from_type.to_string(),
            to: target_type.to_string(),
        }),
    }
}

pub fn is_lob_type(data_type: &str) -> bool {
    matches!(base_type(data_type).as_str(), "CLOB" | "NCLOB" | "BLOB" | "LONG")
}

fn base_type(data_type: &str) -> String {
    data_type
        .to_uppercase()
        .split('(')
        .next()
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Whether the dictionary type and the model type belong to the same alias
/// class (no MODIFY needed for the type itself).
pub fn same_type_family(current: &str, target: &str) -> bool {
    let current = base_type(current);
    let target = base_type(target);
    if current == target {
        return true;
    }
    super::type_aliases(&current)
        .iter()
        .any(|alias| alias.eq_ignore_ascii_case(&target))
}

fn size_changed(field: &Field, current: &ColumnInfo, target_type: &str) -> bool {
    // Only sized character types compare by length.
    if !target_type.to_uppercase().starts_with("VARCHAR") {
        return false;
    }
    match current.length {
        Some(len) if field.size > 0 => len != field.size as i64,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Config, OracleDialect, ServerVersion};
    use crate::schema::{DataKind, EntitySchema, Field};

    fn dialect() -> OracleDialect {
        OracleDialect::for_version(Config::default(), ServerVersion { major: 19, minor: 0 })
    }

    fn schema() -> EntitySchema {
        EntitySchema::new("docs")
            .field(Field::new("id", DataKind::Int).primary_key())
            .field(Field::new("body", DataKind::Text).size(64))
    }

    fn info(data_type: &str, nullable: bool, default: Option<&str>) -> ColumnInfo {
        ColumnInfo {
            name: "BODY".into(),
            data_type: data_type.into(),
            length: Some(64),
            precision: None,
            scale: None,
            nullable,
            default: default.map(|s| s.to_string()),
        }
    }

    #[test]
    fn add_column_defers_not_null() {
        let d = dialect();
        let s = schema();
        let f = Field::new("note", DataKind::Text).size(32).not_null();
        let stmts = add_column_statements(&d, &s, &f);
        assert_eq!(stmts[0], "ALTER TABLE \"DOCS\" ADD (\"NOTE\" VARCHAR2(32))");
        assert_eq!(stmts[1], "ALTER TABLE \"DOCS\" MODIFY (\"NOTE\" NOT NULL)");
    }

    #[test]
    fn set_not_null_when_dictionary_is_nullable() {
        let d = dialect();
        let s = schema();
        let f = Field::new("body", DataKind::Text).size(64).not_null();
        let stmts = plan_alter_column(&d, &s, &f, &info("VARCHAR2", true, None), false).unwrap();
        assert_eq!(stmts, vec!["ALTER TABLE \"DOCS\" MODIFY (\"BODY\" NOT NULL)"]);
    }

    #[test]
    fn set_null_when_model_relaxed() {
        let d = dialect();
        let s = schema();
        let f = Field::new("body", DataKind::Text).size(64);
        let stmts = plan_alter_column(&d, &s, &f, &info("VARCHAR2", false, None), false).unwrap();
        assert_eq!(stmts, vec!["ALTER TABLE \"DOCS\" MODIFY (\"BODY\" NULL)"]);
    }

    #[test]
    fn stale_default_is_dropped() {
        let d = dialect();
        let s = schema();
        let f = Field::new("body", DataKind::Text).size(64);
        let stmts =
            plan_alter_column(&d, &s, &f, &info("VARCHAR2", true, Some("'x'")), false).unwrap();
        assert_eq!(
            stmts,
            vec!["ALTER TABLE \"DOCS\" MODIFY (\"BODY\" DEFAULT NULL)"]
        );
    }

    #[test]
    fn identity_default_is_not_dropped() {
        let d = dialect();
        let s = schema();
        let f = Field::new("body", DataKind::Text).size(64);
        let stmts = plan_alter_column(
            &d,
            &s,
            &f,
            &info("VARCHAR2", true, Some("\"SEQ\".nextval")),
            true,
        )
        .unwrap();
        // No DEFAULT NULL for an identity-backed default; the identity itself
        // is dropped in its own MODIFY because the model is not
        // auto-incrementing.
        assert_eq!(
            stmts,
            vec!["ALTER TABLE \"DOCS\" MODIFY (\"BODY\" DROP IDENTITY)"]
        );
    }

    #[test]
    fn identity_transitions_are_separate_statements() {
        let d = dialect();
        let s = schema();
        let f = Field::new("id", DataKind::Int).primary_key().auto_increment();
        let current = ColumnInfo {
            name: "ID".into(),
            data_type: "NUMBER".into(),
            nullable: false,
            ..Default::default()
        };
        let stmts = plan_alter_column(&d, &s, &f, &current, false).unwrap();
        assert!(stmts
            .iter()
            .any(|s| s.contains("MODIFY (\"ID\" GENERATED BY DEFAULT AS IDENTITY)")));

        let f = Field::new("id", DataKind::Int).primary_key();
        let stmts = plan_alter_column(&d, &s, &f, &current, true).unwrap();
        assert!(stmts.iter().any(|s| s.contains("MODIFY (\"ID\" DROP IDENTITY)")));
    }

    #[test]
    fn lob_target_uses_rewrite_path() {
        let config = Config {
            use_clob_for_text_type: true,
            ..Default::default()
        };
        let d = OracleDialect::for_version(config, ServerVersion { major: 19, minor: 0 });
        let s = schema();
        // Unsized text with CLOB enabled resolves to CLOB.
        let f = Field::new("body", DataKind::Text).size(9000).not_null();
        let stmts = plan_alter_column(&d, &s, &f, &info("VARCHAR2", true, None), false).unwrap();
        assert_eq!(stmts.len(), 5);
        assert!(stmts[0].starts_with("ALTER TABLE \"DOCS\" ADD (\"BODY_TMP_"));
        assert!(stmts[0].ends_with(" CLOB)"));
        assert!(stmts[1].starts_with("UPDATE \"DOCS\" SET \"BODY_TMP_"));
        assert!(stmts[1].contains("= TO_CLOB(\"BODY\")"));
        assert_eq!(stmts[2], "ALTER TABLE \"DOCS\" DROP COLUMN \"BODY\"");
        assert!(stmts[3].starts_with("ALTER TABLE \"DOCS\" RENAME COLUMN \"BODY_TMP_"));
        assert!(stmts[3].ends_with(" TO \"BODY\""));
        assert_eq!(stmts[4], "ALTER TABLE \"DOCS\" MODIFY (\"BODY\" NOT NULL)");
    }

    #[test]
    fn blob_from_number_is_unsupported() {
        let d = dialect();
        let s = schema();
        let f = Field::new("body", DataKind::Bytes);
        let err = plan_alter_column(&d, &s, &f, &info("NUMBER", true, None), false).unwrap_err();
        assert!(matches!(err, OraError::UnsupportedConversion { .. }));
    }

    #[test]
    fn same_family_types_do_not_modify() {
        let d = dialect();
        let s = schema();
        let f = Field::new("body", DataKind::Text).size(64);
        let stmts = plan_alter_column(&d, &s, &f, &info("VARCHAR2", true, None), false).unwrap();
        assert!(stmts.is_empty());
    }
}
