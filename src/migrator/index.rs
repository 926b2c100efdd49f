//! Index DDL: ordinary indexes, partial indexes emulated through CASE
//! expressions, and Oracle domain indexes (`INDEXTYPE IS ...`) with their
//! validation matrix.

use crate::dialect::OracleDialect;
use crate::error::{OraError, OraResult};
use crate::schema::{EntitySchema, IndexDef};
use crate::statement::quoted_ident;

/// Build the `CREATE INDEX` statement for one index definition.
pub fn build_create_index(
    dialect: &OracleDialect,
    schema: &EntitySchema,
    idx: &IndexDef,
) -> OraResult<String> {
    validate(idx)?;

    let naming = &dialect.naming;
    let name = quoted_ident(naming, &idx.name);
    let table = quoted_ident(naming, &schema.table);

    let mut sql = String::from("CREATE ");
    if idx.unique {
        sql.push_str("UNIQUE ");
    }
    sql.push_str("INDEX ");
    sql.push_str(&name);
    sql.push_str(" ON ");
    sql.push_str(&table);

    let columns: Vec<String> = match &idx.where_clause {
        // Partial indexes do not exist on Oracle; a function-based index on
        // CASE expressions only indexes rows matching the predicate.
        Some(where_clause) => idx
            .fields
            .iter()
            .map(|f| {
                format!(
                    "CASE WHEN ({}) THEN {} END",
                    where_clause,
                    quoted_ident(naming, f)
                )
            })
            .collect(),
        None => idx.fields.iter().map(|f| quoted_ident(naming, f)).collect(),
    };
    sql.push_str(" (");
    sql.push_str(&columns.join(","));
    sql.push(')');

    if let Some(using) = &idx.using {
        sql.push_str(" USING ");
        sql.push_str(using);
    }
    if let Some(index_type) = &idx.index_type {
        sql.push_str(" INDEXTYPE IS ");
        sql.push_str(index_type);
        if let Some(parameters) = &idx.parameters {
            sql.push_str(" PARAMETERS (");
            sql.push_str(parameters);
            sql.push(')');
        }
    }
    if let Some(comment) = &idx.comment {
        sql.push_str(&format!(" COMMENT '{}'", comment.replace('\'', "''")));
    }
    if let Some(option) = &idx.option {
        sql.push(' ');
        sql.push_str(option);
    }

    Ok(sql)
}

fn validate(idx: &IndexDef) -> OraResult<()> {
    if idx.index_type.is_some() {
        if idx.unique {
            return Err(OraError::invalid_index(
                &idx.name,
                "UNIQUE cannot be combined with INDEXTYPE IS",
            ));
        }
        if idx.using.is_some() {
            return Err(OraError::invalid_index(
                &idx.name,
                "USING cannot be combined with INDEXTYPE IS",
            ));
        }
        if idx.where_clause.is_some() {
            return Err(OraError::invalid_index(
                &idx.name,
                "a WHERE predicate cannot be combined with a domain index type",
            ));
        }
    }
    if let Some(parameters) = &idx.parameters {
        if idx.index_type.is_none() {
            return Err(OraError::invalid_index(
                &idx.name,
                "PARAMETERS requires INDEXTYPE IS",
            ));
        }
        let trimmed = parameters.trim();
        if !(trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'')) {
            return Err(OraError::invalid_index(
                &idx.name,
                "domain index parameters must be single-quoted",
            ));
        }
    }
    Ok(())
}
