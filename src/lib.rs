//! Oracle SQL generation and result-binding core.
//!
//! This crate turns structured create / update / delete / query requests over
//! a declared entity schema into Oracle-compatible SQL: MERGE-based upserts,
//! `RETURNING ... INTO` output binds, dialect-correct pagination, identifier
//! casing with data-dictionary lookups, and an idempotent schema migrator.
//!
//! The surrounding ORM runtime and the Oracle network driver stay outside:
//! entities are reached through the [`schema::EntityRows`] capability and the
//! driver through the [`statement::ConnPool`] trait.

pub mod clause;
pub mod conversion;
pub mod create;
pub mod delete;
pub mod dialect;
pub mod error;
pub mod explain;
pub mod limit;
pub mod migrator;
pub mod naming;
pub mod query;
pub mod reserved;
pub mod returning;
pub mod schema;
pub mod session;
pub mod statement;
pub mod update;
pub mod value;

pub mod prelude {
    pub use crate::clause::{Assignment, Cond, Limit, OnConflict, OrderBy, Returning, Where};
    pub use crate::create::create;
    pub use crate::delete::delete;
    pub use crate::dialect::{Config, OracleDialect, ServerVersion};
    pub use crate::error::{OraError, OraResult};
    pub use crate::migrator::Migrator;
    pub use crate::naming::{Case, NamingStrategy};
    pub use crate::schema::{DataKind, EntityRows, EntitySchema, Field, TimeUnit};
    pub use crate::statement::{ConnPool, ExecResult, Statement};
    pub use crate::update::{update, UpdateSource};
    pub use crate::value::{OutBind, OutSlot, SqlExpr, Value};
}
