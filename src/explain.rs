//! Log-oriented SQL rendering: substitute `:n` placeholders with literal
//! values, and Q-quote string literals for DDL statements. The substituted
//! form is for logging only; executing it would reintroduce injection risk.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::value::Value;

static NUMERIC_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r":(\d+)").unwrap());

/// Render a string literal, escaping embedded single quotes with the
/// alternative-quoting fallback chain: `q'[...]'`, `q'{...}'`, `q'<...>'`,
/// `q'(...)'`, then doubled quotes when no delimiter is safe.
pub fn string_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    if !value.contains("]'") {
        return format!("q'[{}]'", value);
    }
    if !value.contains("}'") {
        return format!("q'{{{}}}'", value);
    }
    if !value.contains(">'") {
        return format!("q'<{}>'", value);
    }
    if !value.contains(")'") {
        return format!("q'({})'", value);
    }
    format!("'{}'", value.replace('\'', "''"))
}

/// Escape single quotes without wrapping, for callers that supply their own
/// quoting (e.g. `COMMENT ON ... IS '?'`).
pub fn escape_single_quotes(value: &str) -> String {
    value.replace('\'', "''")
}

/// Substitute one-based `:n` placeholders with rendered literals.
pub fn explain_sql(sql: &str, vars: &[Value]) -> String {
    NUMERIC_PLACEHOLDER
        .replace_all(sql, |caps: &regex::Captures| {
            let n: usize = caps[1].parse().unwrap_or(0);
            if n >= 1 && n <= vars.len() {
                render_value(&vars[n - 1])
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Uint(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Text(s) | Value::Clob(s) => string_literal(s),
        Value::Bytes(b) => {
            let hex: String = b.iter().map(|x| format!("{:02x}", x)).collect();
            format!("'{}'", hex)
        }
        Value::Raw16(b) => {
            let hex: String = b.iter().map(|x| format!("{:02x}", x)).collect();
            format!("'{}'", hex)
        }
        Value::Time(t) => format!("'{}'", t.format("%Y-%m-%dT%H:%M:%S%.9f%:z")),
        Value::Expr(e) => {
            // Inline the fragment with its own vars substituted positionally.
            let mut out = String::new();
            let mut vars = e.vars.iter();
            for c in e.sql.chars() {
                if c == '?' {
                    match vars.next() {
                        Some(v) => out.push_str(&render_value(v)),
                        None => out.push('?'),
                    }
                } else {
                    out.push(c);
                }
            }
            out
        }
        Value::Out(out) => format!(
            "/*- Out{{row:{},field:{},size:{}}} -*/",
            out.dest.row, out.dest.field, out.size
        ),
    }
}
