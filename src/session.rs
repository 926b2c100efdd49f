//! Session parameter plumbing: NLS formats and time zone applied at connect,
//! with add/delete helpers for host-managed parameter sets.

use crate::conversion::{
    NLS_DATE_FORMAT, NLS_TIMESTAMP_FORMAT, NLS_TIMESTAMP_TZ_FORMAT, NLS_TIME_FORMAT,
    NLS_TIME_TZ_FORMAT,
};
use crate::dialect::Config;
use crate::error::OraResult;
use crate::explain::string_literal;
use crate::statement::ConnPool;

/// The parameters applied at initialization. Session-wide on the connection;
/// prior values are not restored on teardown.
pub fn session_setup_params(config: &Config) -> Vec<(String, String)> {
    let mut params = vec![
        ("TIME_ZONE".to_string(), config.session_timezone.clone()),
        ("NLS_DATE_FORMAT".to_string(), NLS_DATE_FORMAT.to_string()),
        (
            "NLS_TIMESTAMP_FORMAT".to_string(),
            NLS_TIMESTAMP_FORMAT.to_string(),
        ),
        (
            "NLS_TIMESTAMP_TZ_FORMAT".to_string(),
            NLS_TIMESTAMP_TZ_FORMAT.to_string(),
        ),
        ("NLS_TIME_FORMAT".to_string(), NLS_TIME_FORMAT.to_string()),
        (
            "NLS_TIME_TZ_FORMAT".to_string(),
            NLS_TIME_TZ_FORMAT.to_string(),
        ),
    ];
    if config.ignore_case {
        params.push(("NLS_COMP".to_string(), "LINGUISTIC".to_string()));
        params.push(("NLS_SORT".to_string(), "BINARY_CI".to_string()));
    }
    params
}

/// `ALTER SESSION SET <key> = '<value>'`.
pub fn session_param_statement(key: &str, value: &str) -> String {
    format!("ALTER SESSION SET {} = {}", key, string_literal(value))
}

pub fn set_session_param(pool: &mut dyn ConnPool, key: &str, value: &str) -> OraResult<()> {
    pool.exec(&session_param_statement(key, value), &[])
        .map(|_| ())
}

/// Apply a parameter map, returning the keys that were set so the host can
/// later drop them from its replay list.
pub fn add_session_params(
    pool: &mut dyn ConnPool,
    params: &[(String, String)],
) -> OraResult<Vec<String>> {
    let mut keys = Vec::new();
    for (key, value) in params {
        if key.is_empty() || value.is_empty() {
            continue;
        }
        set_session_param(pool, key, value)?;
        keys.push(key.clone());
    }
    Ok(keys)
}

/// Remove keys from the host's replay list. The server-side session keeps the
/// current values; deletion only stops re-application on reconnect.
pub fn del_session_params(replay: &mut Vec<String>, keys: &[String]) {
    replay.retain(|k| !keys.contains(k));
}
