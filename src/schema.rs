//! Entity schema: the host-declared description of a user entity, plus the
//! narrow capability surface the engines use to read and write entity rows.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Semantic tag of a field's host type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataKind {
    Bool,
    Int,
    Uint,
    Float,
    Text,
    Time,
    Bytes,
    /// Any 16-byte identifier (UUID/ULID-alike); maps to `RAW(16)`.
    Raw16,
    /// Column type taken verbatim from [`Field::column_type`].
    Custom,
}

/// Encoding of auto-create/update timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    Instant,
    Secs,
    Millis,
    Nanos,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    /// Logical (host) name.
    pub name: String,
    /// Database column name, case-preserving.
    pub db_name: String,
    pub data_type: DataKind,
    /// Explicit Oracle type, e.g. `TIMESTAMP WITH TIME ZONE` or `VARCHAR2(64)`.
    pub column_type: Option<String>,
    pub size: usize,
    pub precision: i32,
    pub scale: i32,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub auto_create_time: Option<TimeUnit>,
    pub auto_update_time: Option<TimeUnit>,
    pub unique: bool,
    pub not_null: bool,
    pub readable: bool,
    pub writable: bool,
    pub updatable: bool,
    pub embedded: bool,
    pub ignore_migration: bool,
    pub has_default_value: bool,
    /// Default expression rendered into DDL (`SYSDATE`, `0`, ...).
    pub default_value: Option<String>,
    /// Host-side default applied before binding, instead of a DB default.
    pub default_value_interface: Option<Value>,
    pub comment: Option<String>,
    /// Slot of this field in the entity accessor.
    pub index: usize,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataKind) -> Self {
        let name = name.into();
        Self {
            db_name: name.clone(),
            name,
            data_type,
            column_type: None,
            size: 0,
            precision: 0,
            scale: 0,
            primary_key: false,
            auto_increment: false,
            auto_create_time: None,
            auto_update_time: None,
            unique: false,
            not_null: false,
            readable: true,
            writable: true,
            updatable: true,
            embedded: false,
            ignore_migration: false,
            has_default_value: false,
            default_value: None,
            default_value_interface: None,
            comment: None,
            index: 0,
        }
    }

    pub fn db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = db_name.into();
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }

    /// Identity column; the server assigns the value.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self.has_default_value = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn precision(mut self, precision: i32) -> Self {
        self.precision = precision;
        self
    }

    pub fn scale(mut self, scale: i32) -> Self {
        self.scale = scale;
        self
    }

    pub fn column_type(mut self, column_type: impl Into<String>) -> Self {
        self.column_type = Some(column_type.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// DB-side default expression; the server may assign the value.
    pub fn default_value(mut self, expr: impl Into<String>) -> Self {
        self.has_default_value = true;
        self.default_value = Some(expr.into());
        self
    }

    /// Host-side default value applied when the entity value is zero.
    pub fn default_value_interface(mut self, value: Value) -> Self {
        self.has_default_value = true;
        self.default_value_interface = Some(value);
        self
    }

    pub fn auto_create_time(mut self, unit: TimeUnit) -> Self {
        self.auto_create_time = Some(unit);
        self
    }

    pub fn auto_update_time(mut self, unit: TimeUnit) -> Self {
        self.auto_update_time = Some(unit);
        self
    }

    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }

    pub fn ignore_migration(mut self) -> Self {
        self.ignore_migration = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.updatable = false;
        self.writable = false;
        self
    }

    pub fn unreadable(mut self) -> Self {
        self.readable = false;
        self
    }

    /// Whether the server may assign this column's value (identity or a
    /// DB-side default the host does not compute).
    pub fn has_default_db_value(&self) -> bool {
        self.auto_increment
            || (self.has_default_value && self.default_value_interface.is_none())
    }
}

/// An index parsed from the entity declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    /// Column db-names in order.
    pub fields: Vec<String>,
    pub unique: bool,
    /// `USING <type>` (b-tree alternatives); rejected for domain indexes.
    pub using: Option<String>,
    /// Partial-index predicate, emulated with CASE expressions.
    pub where_clause: Option<String>,
    pub comment: Option<String>,
    pub option: Option<String>,
    /// Domain index type, e.g. `CTXSYS.CONTEXT` (`oracle_indextype` tag).
    pub index_type: Option<String>,
    /// Domain index parameters, single-quoted (`oracle_parameters` tag).
    pub parameters: Option<String>,
}

/// A check constraint from the entity declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckDef {
    pub name: String,
    pub expr: String,
}

/// A foreign key from the entity declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    pub name: String,
    pub columns: Vec<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
    pub on_delete: Option<String>,
    /// Oracle does not support `ON UPDATE` actions; stripped before DDL.
    pub on_update: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntitySchema {
    pub table: String,
    pub fields: Vec<Field>,
    pub indexes: Vec<IndexDef>,
    pub checks: Vec<CheckDef>,
    pub foreign_keys: Vec<ForeignKeyDef>,
}

impl EntitySchema {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn field(mut self, mut field: Field) -> Self {
        field.index = self.fields.len();
        self.fields.push(field);
        self
    }

    pub fn index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn check(mut self, check: CheckDef) -> Self {
        self.checks.push(check);
        self
    }

    pub fn foreign_key(mut self, fk: ForeignKeyDef) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Primary-key fields in declaration order.
    pub fn primary_fields(&self) -> Vec<&Field> {
        self.fields.iter().filter(|f| f.primary_key).collect()
    }

    /// The first primary field with auto-increment semantics, or the single
    /// primary field when there is exactly one.
    pub fn prioritized_primary_field(&self) -> Option<&Field> {
        let primary = self.primary_fields();
        primary
            .iter()
            .find(|f| f.auto_increment)
            .copied()
            .or(if primary.len() == 1 {
                Some(primary[0])
            } else {
                None
            })
    }

    /// Fields whose values the server may assign.
    pub fn fields_with_default_db_value(&self) -> Vec<&Field> {
        self.fields
            .iter()
            .filter(|f| f.has_default_db_value())
            .collect()
    }

    pub fn field_by_db_name(&self, db_name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.db_name == db_name)
    }

    /// Resolve by logical name or column name.
    pub fn look_up_field(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.field_by_db_name(name))
    }

    /// Column names in declaration order.
    pub fn db_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.db_name.as_str())
    }
}

/// The capability the engines use to read entity values and to stream
/// server-assigned outputs back in. A single struct is a one-row source; a
/// `Vec` of structs an N-row source. Implementations are generated at entity
/// declaration time or written by hand; field indexes are the [`Field::index`]
/// slots of the schema.
pub trait EntityRows {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current value of `field` in `row`.
    fn value_of(&self, row: usize, field: usize) -> Value;

    /// Write a (typically server-assigned) value into `field` of `row`.
    fn assign(&mut self, row: usize, field: usize, value: Value);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_schema() -> EntitySchema {
        EntitySchema::new("USERS")
            .field(Field::new("id", DataKind::Int).primary_key().auto_increment())
            .field(Field::new("name", DataKind::Text).db_name("NAME").size(64))
            .field(
                Field::new("created_at", DataKind::Time)
                    .db_name("CREATED_AT")
                    .auto_create_time(TimeUnit::Instant),
            )
    }

    #[test]
    fn partitions() {
        let schema = user_schema();
        assert_eq!(schema.primary_fields().len(), 1);
        assert_eq!(schema.prioritized_primary_field().unwrap().name, "id");
        assert_eq!(schema.fields_with_default_db_value().len(), 1);
    }

    #[test]
    fn field_indexes_follow_declaration_order() {
        let schema = user_schema();
        assert_eq!(schema.fields[0].index, 0);
        assert_eq!(schema.fields[2].index, 2);
        assert_eq!(schema.look_up_field("name").unwrap().db_name, "NAME");
        assert_eq!(schema.look_up_field("CREATED_AT").unwrap().name, "created_at");
    }

    #[test]
    fn composite_primary_key_has_no_prioritized_field() {
        let schema = EntitySchema::new("T")
            .field(Field::new("a", DataKind::Int).primary_key())
            .field(Field::new("b", DataKind::Int).primary_key());
        assert!(schema.prioritized_primary_field().is_none());
    }
}
