//! Dialect configuration, server version detection and Oracle type mapping.

use chrono::{DateTime, FixedOffset, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{OraError, OraResult};
use crate::naming::{Case, NamingStrategy};
use crate::schema::{DataKind, Field};
use crate::session::{session_setup_params, set_session_param};
use crate::statement::{ConnPool, Statement};
use crate::value::Value;

/// Host-visible configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub dsn: String,
    /// Size used for unsized string columns; 0 falls back to 1024.
    pub default_string_size: usize,
    /// Sets `NLS_COMP=LINGUISTIC` / `NLS_SORT=BINARY_CI`. May hurt
    /// performance on large scans.
    pub ignore_case: bool,
    pub naming_case_sensitive: bool,
    pub preferred_case: Case,
    pub table_prefix: String,
    pub singular_table: bool,
    /// 0 = use the cap detected from the server version.
    pub identifier_max_length: usize,
    /// Interpret string sizes as character length instead of byte length.
    pub varchar_size_is_char_length: bool,
    /// Alias used by the 11g ROW_NUMBER pagination subquery.
    pub row_number_alias_for_oracle11: String,
    pub use_clob_for_text_type: bool,
    /// Round every bound instant down to this many nanoseconds, when set.
    pub time_granularity_ns: Option<i64>,
    /// IANA-less fixed offset like `+02:00`, or `UTC`.
    pub session_timezone: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dsn: String::new(),
            default_string_size: 1024,
            ignore_case: false,
            naming_case_sensitive: false,
            preferred_case: Case::ScreamingSnake,
            table_prefix: String::new(),
            singular_table: false,
            identifier_max_length: 0,
            varchar_size_is_char_length: false,
            row_number_alias_for_oracle11: "ROW_NUM".to_string(),
            use_clob_for_text_type: false,
            time_granularity_ns: None,
            session_timezone: "UTC".to_string(),
        }
    }
}

static VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)(?:\.(\d+))?").unwrap());

/// Major/minor of the connected server, parsed from
/// `product_component_version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
}

impl ServerVersion {
    pub fn parse(text: &str) -> OraResult<Self> {
        let caps = VERSION_RE
            .captures(text.trim())
            .ok_or_else(|| OraError::Config(format!("unparsable server version {:?}", text)))?;
        let major = caps[1].parse().unwrap_or(0);
        let minor = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        Ok(Self { major, minor })
    }

    /// `OFFSET ... FETCH NEXT` exists from 12c on.
    pub fn supports_fetch_first(&self) -> bool {
        self.major > 11
    }

    /// Native BOOLEAN columns exist from 23c on.
    pub fn supports_boolean(&self) -> bool {
        self.major >= 23
    }

    /// 128-byte identifiers from 12.2, 30 bytes below.
    pub fn identifier_cap(&self) -> usize {
        if self.major > 12 || (self.major == 12 && self.minor >= 2) {
            128
        } else {
            30
        }
    }
}

/// The dialect: read-only after initialization, shared by every statement.
#[derive(Debug, Clone)]
pub struct OracleDialect {
    pub config: Config,
    pub version: ServerVersion,
    pub naming: NamingStrategy,
    session_offset: FixedOffset,
    now_fn: fn() -> DateTime<Utc>,
}

impl OracleDialect {
    /// Bootstrap against a live connection: apply session parameters, detect
    /// the server version and resolve the identifier cap.
    pub fn initialize(config: Config, pool: &mut dyn ConnPool) -> OraResult<Self> {
        for (key, value) in session_setup_params(&config) {
            set_session_param(pool, &key, &value)?;
        }

        let row = pool.query_row(
            "select version from product_component_version where rownum = 1",
            &[],
        )?;
        let version_text = match row.as_deref() {
            Some([Value::Text(s), ..]) => s.clone(),
            _ => {
                return Err(OraError::Config(
                    "could not read product_component_version".to_string(),
                ))
            }
        };
        let version = ServerVersion::parse(&version_text)?;
        debug!(version = %version_text, "detected oracle server version");

        Ok(Self::for_version(config, version))
    }

    /// Build a dialect for a known server version without touching a
    /// connection.
    pub fn for_version(config: Config, version: ServerVersion) -> Self {
        let naming = NamingStrategy {
            table_prefix: config.table_prefix.clone(),
            singular_table: config.singular_table,
            identifier_max_length: if config.identifier_max_length > 0 {
                config.identifier_max_length
            } else {
                version.identifier_cap()
            },
            preferred_case: config.preferred_case,
            case_sensitive: config.naming_case_sensitive,
        };
        let session_offset = parse_offset(&config.session_timezone);
        Self {
            config,
            version,
            naming,
            session_offset,
            now_fn: Utc::now,
        }
    }

    /// Replace the clock, for deterministic auto-timestamp tests.
    pub fn with_now_fn(mut self, now_fn: fn() -> DateTime<Utc>) -> Self {
        self.now_fn = now_fn;
        self
    }

    /// Current instant in the session offset, rounded to the configured
    /// granularity.
    pub fn now(&self) -> DateTime<FixedOffset> {
        let now = (self.now_fn)().with_timezone(&self.session_offset);
        match self.config.time_granularity_ns {
            Some(g) if g > 1 => {
                let ns = now.timestamp_nanos_opt().unwrap_or_default();
                let truncated = ns - ns.rem_euclid(g);
                DateTime::from_timestamp_nanos(truncated).with_timezone(&self.session_offset)
            }
            _ => now,
        }
    }

    pub fn session_offset(&self) -> FixedOffset {
        self.session_offset
    }

    /// The dummy single-row table used by MERGE sources.
    pub fn dummy_table_name(&self) -> &'static str {
        "DUAL"
    }

    pub fn new_statement<'a>(&self, schema: &'a crate::schema::EntitySchema) -> Statement<'a> {
        let mut stmt = Statement::new(schema, self.naming.clone());
        stmt.table = self.naming.dictionary_qualified(&schema.table);
        stmt
    }

    /// Oracle column type for a schema field, without the identity suffix
    /// (DDL attaches that separately).
    pub fn data_type_of(&self, field: &Field) -> String {
        if let Some(explicit) = &field.column_type {
            return self.alias_custom_type(explicit);
        }

        match field.data_type {
            DataKind::Bool => {
                if self.version.supports_boolean() {
                    "BOOLEAN".to_string()
                } else {
                    "NUMBER(1)".to_string()
                }
            }
            DataKind::Int | DataKind::Uint => {
                if field.size > 0 && field.size <= 8 {
                    "SMALLINT".to_string()
                } else {
                    "INTEGER".to_string()
                }
            }
            DataKind::Float => "FLOAT".to_string(),
            DataKind::Text => self.string_type(field),
            DataKind::Time => {
                if (1..=9).contains(&field.precision) {
                    format!("TIMESTAMP({}) WITH TIME ZONE", field.precision)
                } else {
                    "TIMESTAMP WITH TIME ZONE".to_string()
                }
            }
            DataKind::Bytes => "BLOB".to_string(),
            DataKind::Raw16 => "RAW(16)".to_string(),
            DataKind::Custom => "VARCHAR2(4000)".to_string(),
        }
    }

    fn string_type(&self, field: &Field) -> String {
        let mut size = field.size;
        if size == 0 {
            if self.config.default_string_size > 0 {
                size = self.config.default_string_size;
            } else if field.primary_key || field.has_default_value || field.unique {
                // Indexable strings need a bounded size.
                size = 191;
            }
        }

        if size > 0 && size <= 4000 {
            if self.config.varchar_size_is_char_length {
                if size * 3 > 4000 {
                    "CLOB".to_string()
                } else {
                    format!("VARCHAR2({} CHAR)", size)
                }
            } else {
                format!("VARCHAR2({})", size)
            }
        } else if self.config.use_clob_for_text_type {
            "CLOB".to_string()
        } else {
            "VARCHAR2(4000)".to_string()
        }
    }

    fn alias_custom_type(&self, explicit: &str) -> String {
        let upper = explicit.to_uppercase();
        if upper == "TEXT" {
            return if self.config.use_clob_for_text_type {
                "CLOB".to_string()
            } else {
                "VARCHAR2(4000)".to_string()
            };
        }
        if upper == "TIMESTAMP WITHOUT TIME ZONE" {
            return "TIMESTAMP WITH LOCAL TIME ZONE".to_string();
        }
        upper
    }

    /// `SAVEPOINT <name>`.
    pub fn savepoint(&self, pool: &mut dyn ConnPool, name: &str) -> OraResult<()> {
        pool.exec(&format!("SAVEPOINT {}", name), &[]).map(|_| ())
    }

    /// `ROLLBACK TO SAVEPOINT <name>`.
    pub fn rollback_to(&self, pool: &mut dyn ConnPool, name: &str) -> OraResult<()> {
        pool.exec(&format!("ROLLBACK TO SAVEPOINT {}", name), &[])
            .map(|_| ())
    }
}

fn parse_offset(tz: &str) -> FixedOffset {
    let trimmed = tz.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).unwrap();
    }
    let (sign, rest) = match trimmed.as_bytes()[0] {
        b'+' => (1, &trimmed[1..]),
        b'-' => (-1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let mut parts = rest.splitn(2, ':');
    let hours: i32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let minutes: i32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Field;

    #[test]
    fn version_parsing() {
        let v = ServerVersion::parse("19.0.0.0.0").unwrap();
        assert_eq!(v, ServerVersion { major: 19, minor: 0 });
        assert!(v.supports_fetch_first());
        assert_eq!(v.identifier_cap(), 128);

        let v = ServerVersion::parse("11.2.0.4.0").unwrap();
        assert!(!v.supports_fetch_first());
        assert_eq!(v.identifier_cap(), 30);

        let v = ServerVersion::parse("12.1.0.2").unwrap();
        assert_eq!(v.identifier_cap(), 30);
        let v = ServerVersion::parse("12.2.0.1").unwrap();
        assert_eq!(v.identifier_cap(), 128);

        assert!(ServerVersion::parse("garbage").is_err());
    }

    #[test]
    fn data_types() {
        let d = OracleDialect::for_version(
            Config::default(),
            ServerVersion { major: 19, minor: 0 },
        );
        assert_eq!(
            d.data_type_of(&Field::new("ok", DataKind::Bool)),
            "NUMBER(1)"
        );
        assert_eq!(
            d.data_type_of(&Field::new("n", DataKind::Int)),
            "INTEGER"
        );
        assert_eq!(
            d.data_type_of(&Field::new("n", DataKind::Int).size(4)),
            "SMALLINT"
        );
        assert_eq!(
            d.data_type_of(&Field::new("s", DataKind::Text).size(64)),
            "VARCHAR2(64)"
        );
        assert_eq!(
            d.data_type_of(&Field::new("s", DataKind::Text)),
            "VARCHAR2(1024)"
        );
        assert_eq!(
            d.data_type_of(&Field::new("t", DataKind::Time).precision(6)),
            "TIMESTAMP(6) WITH TIME ZONE"
        );
        assert_eq!(
            d.data_type_of(&Field::new("u", DataKind::Raw16)),
            "RAW(16)"
        );
        assert_eq!(
            d.data_type_of(&Field::new("b", DataKind::Bytes)),
            "BLOB"
        );
    }

    #[test]
    fn boolean_on_23c() {
        let d = OracleDialect::for_version(
            Config::default(),
            ServerVersion { major: 23, minor: 0 },
        );
        assert_eq!(d.data_type_of(&Field::new("ok", DataKind::Bool)), "BOOLEAN");
    }

    #[test]
    fn char_length_sizing() {
        let config = Config {
            varchar_size_is_char_length: true,
            ..Default::default()
        };
        let d = OracleDialect::for_version(config, ServerVersion { major: 19, minor: 0 });
        assert_eq!(
            d.data_type_of(&Field::new("s", DataKind::Text).size(100)),
            "VARCHAR2(100 CHAR)"
        );
        assert_eq!(
            d.data_type_of(&Field::new("s", DataKind::Text).size(2000)),
            "CLOB"
        );
    }

    #[test]
    fn custom_type_aliases() {
        let d = OracleDialect::for_version(
            Config {
                use_clob_for_text_type: true,
                ..Default::default()
            },
            ServerVersion { major: 19, minor: 0 },
        );
        assert_eq!(
            d.data_type_of(&Field::new("s", DataKind::Custom).column_type("text")),
            "CLOB"
        );
        assert_eq!(
            d.data_type_of(
                &Field::new("t", DataKind::Custom).column_type("timestamp without time zone")
            ),
            "TIMESTAMP WITH LOCAL TIME ZONE"
        );
    }

    #[test]
    fn session_offset_parsing() {
        assert_eq!(parse_offset("+02:00").local_minus_utc(), 7200);
        assert_eq!(parse_offset("-05:30").local_minus_utc(), -(5 * 3600 + 1800));
        assert_eq!(parse_offset("UTC").local_minus_utc(), 0);
    }
}
