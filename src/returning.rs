//! RETURNING binder: selects the schema fields that can receive
//! server-assigned values, emits `RETURNING c1,c2 INTO :o1,:o2` and wires
//! output binds to slots inside the destination entity rows.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::schema::{DataKind, EntitySchema, Field};
use crate::statement::Statement;
use crate::value::{OutBind, OutSlot, Value};

static STRING_TYPE_WITH_SIZE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:varchar2?|nvarchar2|nchar|char)\s*\(\s*(\d+)(?:\s+(?:byte|char))?\s*\)")
        .unwrap()
});

/// A field can receive a server-assigned value iff it has a column name, the
/// host marked it readable, it is not an embedded-struct marker and its type
/// binds as a scalar output.
pub fn is_returnable(field: &Field) -> bool {
    if field.db_name.is_empty() || !field.readable || field.embedded {
        return false;
    }
    matches!(
        field.data_type,
        DataKind::Bool
            | DataKind::Int
            | DataKind::Uint
            | DataKind::Float
            | DataKind::Text
            | DataKind::Time
            | DataKind::Bytes
            | DataKind::Raw16
            | DataKind::Custom
    )
}

/// All returnable fields of a schema, in declaration order.
pub fn returnable_fields(schema: &EntitySchema) -> Vec<&Field> {
    schema.fields.iter().filter(is_returnable_ref).collect()
}

fn is_returnable_ref(field: &&Field) -> bool {
    is_returnable(field)
}

/// The returnable subset of the fields whose values the server may assign.
/// The INSERT path appends these after the VALUES clause; the MERGE path
/// computes them but cannot use them (Oracle has no `MERGE ... RETURNING`).
pub fn returning_fields_with_default_db_value(schema: &EntitySchema) -> Vec<&Field> {
    schema
        .fields_with_default_db_value()
        .into_iter()
        .filter(|f| is_returnable(f))
        .collect()
}

/// Resolve the explicit column list of a RETURNING clause to returnable
/// schema fields; an empty list means every returnable field.
pub fn resolve_returning_fields<'s>(
    schema: &'s EntitySchema,
    columns: &[String],
) -> Vec<&'s Field> {
    if columns.is_empty() {
        return returnable_fields(schema);
    }
    columns
        .iter()
        .filter_map(|name| schema.look_up_field(name))
        .filter(|f| is_returnable(f))
        .collect()
}

/// Output bind size: the declared field size, else the `n` parsed out of a
/// sized string type (`VARCHAR2(n)`, `NCHAR(n)`, ...), else 1.
pub fn out_size(field: &Field) -> usize {
    if field.size > 0 {
        return field.size;
    }
    if let Some(column_type) = &field.column_type {
        if let Some(caps) = STRING_TYPE_WITH_SIZE.captures(column_type) {
            if let Ok(n) = caps[1].parse::<usize>() {
                return n;
            }
        }
    }
    1
}

/// Write `"C1","C2" INTO :n, :n` and append one out bind per field, rowed at
/// `row`. The caller has already written `RETURNING ` (or ` RETURNING `) and
/// verified that the destination is addressable; when it is not, RETURNING
/// is skipped entirely.
pub fn write_returning_into(stmt: &mut Statement<'_>, fields: &[&Field], row: usize) {
    for (i, f) in fields.iter().enumerate() {
        if i > 0 {
            stmt.write_char(',');
        }
        stmt.write_quoted(&f.db_name);
    }
    stmt.write_str(" INTO ");
    for (i, f) in fields.iter().enumerate() {
        if i > 0 {
            stmt.write_str(", ");
        }
        stmt.add_var(Value::Out(OutBind {
            dest: OutSlot {
                row,
                field: f.index,
            },
            size: out_size(f).max(1),
        }));
    }
}

/// Copy driver outputs back into the destination rows. `outputs` is aligned
/// with the `Out` binds of `vars` in order of appearance.
pub fn apply_outputs(stmt: &mut Statement<'_>, outputs: &[Value]) {
    let slots: Vec<OutSlot> = stmt
        .vars
        .iter()
        .filter_map(|v| match v {
            Value::Out(out) => Some(out.dest),
            _ => None,
        })
        .collect();
    if let Some(dest) = stmt.dest.as_deref_mut() {
        for (slot, value) in slots.iter().zip(outputs.iter()) {
            if slot.row < dest.len() {
                dest.assign(slot.row, slot.field, value.clone());
            }
        }
    }
}
