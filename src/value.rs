//! Bind values exchanged between the engines, the conversion layer and the
//! driver surface.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A positional bind value.
///
/// `Expr` carries an inline SQL fragment with its own nested binds and
/// `Out` marks a driver output parameter whose destination is a slot inside
/// the statement's entity rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Raw16([u8; 16]),
    Time(DateTime<FixedOffset>),
    Clob(String),
    Expr(SqlExpr),
    Out(OutBind),
}

/// An inline SQL fragment; each `?` in `sql` consumes one entry of `vars`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlExpr {
    pub sql: String,
    pub vars: Vec<Value>,
}

impl SqlExpr {
    pub fn new(sql: impl Into<String>, vars: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            vars,
        }
    }

    /// A fragment without binds.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            vars: Vec::new(),
        }
    }
}

/// Marker for a server-assigned output: the driver writes the value produced
/// for this bind, and the engine copies it into the entity slot afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutBind {
    pub dest: OutSlot,
    pub size: usize,
}

/// Destination of an output bind: row and field index of the statement's
/// entity rows. The row must stay valid until execution completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutSlot {
    pub row: usize,
    pub field: usize,
}

impl Value {
    /// The zero-value policy shared by the create and update engines: a zero
    /// value lets defaults and auto-timestamps kick in.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(n) => *n == 0,
            Value::Uint(n) => *n == 0,
            Value::Float(f) => *f == 0.0,
            Value::Text(s) | Value::Clob(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::Raw16(b) => b.iter().all(|&x| x == 0),
            Value::Time(t) => t.timestamp() == 0 && t.timestamp_subsec_nanos() == 0,
            Value::Expr(_) | Value::Out(_) => false,
        }
    }

    pub fn is_out(&self) -> bool {
        matches!(self, Value::Out(_))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Uint(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<[u8; 16]> for Value {
    fn from(b: [u8; 16]) -> Self {
        Value::Raw16(b)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Raw16(*u.as_bytes())
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(t: DateTime<FixedOffset>) -> Self {
        Value::Time(t)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Time(t.fixed_offset())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
