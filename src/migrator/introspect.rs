//! Data-dictionary introspection. Probes go against `ALL_*` views when the
//! table name carries an owner qualifier and `USER_*` views otherwise, always
//! comparing dictionary-case identifiers.

use crate::error::OraResult;
use crate::naming::NamingStrategy;
use crate::statement::ConnPool;
use crate::value::Value;

/// One row of `*_TAB_COLUMNS`, in `COLUMN_ID` order.
#[derive(Debug, Clone, Default)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub length: Option<i64>,
    pub precision: Option<i64>,
    pub scale: Option<i64>,
    pub nullable: bool,
    pub default: Option<String>,
}

/// Split a possibly qualified table name into dictionary-case
/// `(owner, table)`.
pub fn split_owner(naming: &NamingStrategy, table: &str) -> (Option<String>, String) {
    let qualified = naming.dictionary_qualified(table);
    match qualified.split_once('.') {
        Some((owner, name)) => (Some(owner.to_string()), name.to_string()),
        None => (None, qualified),
    }
}

fn probe(
    pool: &mut dyn ConnPool,
    all_sql: &str,
    user_sql: &str,
    owner: Option<String>,
    binds: Vec<Value>,
) -> OraResult<bool> {
    let row = match owner {
        Some(owner) => {
            let mut vars = vec![Value::Text(owner)];
            vars.extend(binds);
            pool.query_row(all_sql, &vars)?
        }
        None => pool.query_row(user_sql, &binds)?,
    };
    Ok(row.is_some())
}

pub fn has_table(
    pool: &mut dyn ConnPool,
    naming: &NamingStrategy,
    table: &str,
) -> OraResult<bool> {
    let (owner, table) = split_owner(naming, table);
    probe(
        pool,
        "SELECT 1 FROM ALL_TABLES WHERE OWNER = :1 AND TABLE_NAME = :2 AND ROWNUM = 1",
        "SELECT 1 FROM USER_TABLES WHERE TABLE_NAME = :1 AND ROWNUM = 1",
        owner,
        vec![Value::Text(table)],
    )
}

pub fn has_column(
    pool: &mut dyn ConnPool,
    naming: &NamingStrategy,
    table: &str,
    column: &str,
) -> OraResult<bool> {
    let (owner, table) = split_owner(naming, table);
    let column = naming.dictionary_case(column);
    probe(
        pool,
        "SELECT 1 FROM ALL_TAB_COLUMNS WHERE OWNER = :1 AND TABLE_NAME = :2 AND COLUMN_NAME = :3 AND ROWNUM = 1",
        "SELECT 1 FROM USER_TAB_COLUMNS WHERE TABLE_NAME = :1 AND COLUMN_NAME = :2 AND ROWNUM = 1",
        owner,
        vec![Value::Text(table), Value::Text(column)],
    )
}

pub fn has_constraint(
    pool: &mut dyn ConnPool,
    naming: &NamingStrategy,
    table: &str,
    name: &str,
) -> OraResult<bool> {
    let (owner, table) = split_owner(naming, table);
    let name = naming.dictionary_case(name);
    probe(
        pool,
        "SELECT 1 FROM ALL_CONSTRAINTS WHERE OWNER = :1 AND TABLE_NAME = :2 AND CONSTRAINT_NAME = :3 AND ROWNUM = 1",
        "SELECT 1 FROM USER_CONSTRAINTS WHERE TABLE_NAME = :1 AND CONSTRAINT_NAME = :2 AND ROWNUM = 1",
        owner,
        vec![Value::Text(table), Value::Text(name)],
    )
}

pub fn has_index(
    pool: &mut dyn ConnPool,
    naming: &NamingStrategy,
    table: &str,
    name: &str,
) -> OraResult<bool> {
    let (owner, table) = split_owner(naming, table);
    let name = naming.dictionary_case(name);
    probe(
        pool,
        "SELECT 1 FROM ALL_INDEXES WHERE OWNER = :1 AND TABLE_NAME = :2 AND INDEX_NAME = :3 AND ROWNUM = 1",
        "SELECT 1 FROM USER_INDEXES WHERE TABLE_NAME = :1 AND INDEX_NAME = :2 AND ROWNUM = 1",
        owner,
        vec![Value::Text(table), Value::Text(name)],
    )
}

pub fn is_identity_column(
    pool: &mut dyn ConnPool,
    naming: &NamingStrategy,
    table: &str,
    column: &str,
) -> OraResult<bool> {
    let (owner, table) = split_owner(naming, table);
    let column = naming.dictionary_case(column);
    probe(
        pool,
        "SELECT 1 FROM ALL_TAB_IDENTITY_COLS WHERE OWNER = :1 AND TABLE_NAME = :2 AND COLUMN_NAME = :3 AND ROWNUM = 1",
        "SELECT 1 FROM USER_TAB_IDENTITY_COLS WHERE TABLE_NAME = :1 AND COLUMN_NAME = :2 AND ROWNUM = 1",
        owner,
        vec![Value::Text(table), Value::Text(column)],
    )
}

pub fn column_comment(
    pool: &mut dyn ConnPool,
    naming: &NamingStrategy,
    table: &str,
    column: &str,
) -> OraResult<Option<String>> {
    let (owner, table) = split_owner(naming, table);
    let column = naming.dictionary_case(column);
    let row = match owner {
        Some(owner) => pool.query_row(
            "SELECT COMMENTS FROM ALL_COL_COMMENTS WHERE OWNER = :1 AND TABLE_NAME = :2 AND COLUMN_NAME = :3",
            &[Value::Text(owner), Value::Text(table), Value::Text(column)],
        )?,
        None => pool.query_row(
            "SELECT COMMENTS FROM USER_COL_COMMENTS WHERE TABLE_NAME = :1 AND COLUMN_NAME = :2",
            &[Value::Text(table), Value::Text(column)],
        )?,
    };
    Ok(row.and_then(|r| as_text(r.first())))
}

/// Column descriptions of a table, in `COLUMN_ID` order.
pub fn column_types(
    pool: &mut dyn ConnPool,
    naming: &NamingStrategy,
    table: &str,
) -> OraResult<Vec<ColumnInfo>> {
    const COLS: &str = "COLUMN_NAME, DATA_TYPE, DATA_LENGTH, DATA_PRECISION, DATA_SCALE, NULLABLE, DATA_DEFAULT";
    let (owner, table) = split_owner(naming, table);
    let rows = match owner {
        Some(owner) => pool.query(
            &format!(
                "SELECT {} FROM ALL_TAB_COLUMNS WHERE OWNER = :1 AND TABLE_NAME = :2 ORDER BY COLUMN_ID",
                COLS
            ),
            &[Value::Text(owner), Value::Text(table)],
        )?,
        None => pool.query(
            &format!(
                "SELECT {} FROM USER_TAB_COLUMNS WHERE TABLE_NAME = :1 ORDER BY COLUMN_ID",
                COLS
            ),
            &[Value::Text(table)],
        )?,
    };

    Ok(rows
        .into_iter()
        .map(|row| ColumnInfo {
            name: as_text(row.first()).unwrap_or_default(),
            data_type: as_text(row.get(1)).unwrap_or_default(),
            length: as_int(row.get(2)),
            precision: as_int(row.get(3)),
            scale: as_int(row.get(4)),
            nullable: as_text(row.get(5)).as_deref() == Some("Y"),
            default: as_text(row.get(6)).filter(|s| !s.trim().is_empty()),
        })
        .collect())
}

fn as_text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::Text(s)) => Some(s.clone()),
        Some(Value::Clob(s)) => Some(s.clone()),
        _ => None,
    }
}

fn as_int(value: Option<&Value>) -> Option<i64> {
    match value {
        Some(Value::Int(n)) => Some(*n),
        Some(Value::Uint(n)) => Some(*n as i64),
        Some(Value::Float(f)) => Some(*f as i64),
        _ => None,
    }
}
