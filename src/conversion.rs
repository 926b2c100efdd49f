//! Value conversion and literal casting.
//!
//! Normalizes host values into bind expressions whose SQL form is unambiguous
//! for Oracle: typed NULL casts, `CAST(? AS VARCHAR2(n))` for strings, CLOB
//! wrapping past the inline threshold, `HEXTORAW` for 16-byte identifiers and
//! `TO_TIMESTAMP[_TZ]` literals with per-column fractional precision.

use chrono::{DateTime, Duration, FixedOffset, Timelike};

use crate::value::{SqlExpr, Value};

/// NLS formats shared between session setup and literal casts, so emitted
/// literals always parse under the session's settings.
pub const NLS_DATE_FORMAT: &str = "YYYY-MM-DD\"T\"HH24:MI:SS";
pub const NLS_TIMESTAMP_FORMAT: &str = "YYYY-MM-DD\"T\"HH24:MI:SS.FF9";
pub const NLS_TIMESTAMP_TZ_FORMAT: &str = "YYYY-MM-DD\"T\"HH24:MI:SS.FF9 TZH:TZM";
pub const NLS_TIME_FORMAT: &str = "HH24:MI:SS";
pub const NLS_TIME_TZ_FORMAT: &str = "HH24:MI:SS TZH:TZM";

/// Strings longer than this bind as CLOB instead of an inline cast.
pub const CLOB_THRESHOLD: usize = 2000;

/// Normalize one bind value for the given column metadata.
pub fn convert_value(value: Value, data_type: &str, precision: i32, not_null: bool) -> Value {
    match value {
        Value::Null => cast_null_expr(data_type),

        Value::Bool(b) => Value::Int(if b { 1 } else { 0 }),

        Value::Text(s) => {
            if is_raw_type(data_type) {
                if let Some(bytes) = parse_uuid_text(&s) {
                    return hextoraw(&bytes);
                }
            }
            if s.len() > CLOB_THRESHOLD {
                return Value::Clob(s);
            }
            if s.is_empty() {
                if not_null {
                    // Oracle treats '' as NULL; a single space preserves
                    // "empty but non-null" semantics.
                    return cast_text(" ".to_string(), data_type);
                }
                return cast_null_expr(data_type);
            }
            cast_text(s, data_type)
        }

        Value::Time(t) => cast_time(t, data_type, precision),

        Value::Raw16(b) => hextoraw(&b),

        Value::Bytes(b) if b.len() == 16 && is_raw_type(data_type) => {
            let mut raw = [0u8; 16];
            raw.copy_from_slice(&b);
            hextoraw(&raw)
        }

        other => other,
    }
}

fn cast_text(s: String, data_type: &str) -> Value {
    if data_type.is_empty() {
        return Value::Text(s);
    }
    Value::Expr(SqlExpr::new(
        format!("CAST(? AS {})", data_type),
        vec![Value::Text(s)],
    ))
}

/// `CAST(NULL AS <T>)` for recognized Oracle type families; untyped NULL
/// otherwise.
pub fn cast_null_expr(data_type: &str) -> Value {
    if data_type.is_empty() {
        return Value::Null;
    }
    let upper = data_type.to_uppercase();
    let base = upper.split('(').next().unwrap_or("").trim();
    let recognized = matches!(
        base,
        "RAW"
            | "LONG RAW"
            | "BLOB"
            | "CHAR"
            | "NCHAR"
            | "VARCHAR2"
            | "NVARCHAR2"
            | "CLOB"
            | "NCLOB"
            | "NUMBER"
            | "BINARY_FLOAT"
            | "BINARY_DOUBLE"
            | "FLOAT"
            | "DATE"
            | "XMLTYPE"
            | "JSON"
    ) || base.starts_with("TIMESTAMP")
        || base.starts_with("INTERVAL");
    if recognized {
        Value::Expr(SqlExpr::raw(format!("CAST(NULL AS {})", upper)))
    } else {
        Value::Null
    }
}

/// Time literals: format in the session offset, truncate fractional seconds
/// to the column precision, and cast through the matching `TO_*` function.
/// Accepts plain family names and sized forms (`TIMESTAMP(6) WITH TIME ZONE`).
pub fn cast_time(t: DateTime<FixedOffset>, data_type: &str, precision: i32) -> Value {
    let upper = data_type.to_uppercase();
    if upper == "DATE" {
        return Value::Expr(SqlExpr::new(
            format!("CAST(TO_DATE(?, '{}') AS DATE)", NLS_DATE_FORMAT),
            vec![Value::Text(t.format("%Y-%m-%dT%H:%M:%S").to_string())],
        ));
    }
    if !upper.starts_with("TIMESTAMP") {
        return Value::Time(t);
    }

    let precision = if (1..=9).contains(&precision) {
        precision
    } else {
        parse_paren_precision(&upper).unwrap_or(0)
    };

    if upper.contains("LOCAL TIME ZONE") {
        let (t, target) = sized_target(t, "TIMESTAMP", " WITH LOCAL TIME ZONE", precision);
        Value::Expr(SqlExpr::new(
            format!(
                "CAST(TO_TIMESTAMP_TZ(?, '{}') AS {})",
                NLS_TIMESTAMP_TZ_FORMAT, target
            ),
            vec![Value::Text(format_timestamp(t, precision, true))],
        ))
    } else if upper.contains("WITH TIME ZONE") {
        let (t, target) = sized_target(t, "TIMESTAMP", " WITH TIME ZONE", precision);
        Value::Expr(SqlExpr::new(
            format!(
                "CAST(TO_TIMESTAMP_TZ(?, '{}') AS {})",
                NLS_TIMESTAMP_TZ_FORMAT, target
            ),
            vec![Value::Text(format_timestamp(t, precision, true))],
        ))
    } else {
        let (t, target) = sized_target(t, "TIMESTAMP", "", precision);
        Value::Expr(SqlExpr::new(
            format!(
                "CAST(TO_TIMESTAMP(?, '{}') AS {})",
                NLS_TIMESTAMP_FORMAT, target
            ),
            vec![Value::Text(format_timestamp(t, precision, false))],
        ))
    }
}

fn parse_paren_precision(upper: &str) -> Option<i32> {
    let start = upper.find('(')? + 1;
    let end = upper[start..].find(')')? + start;
    upper[start..end].trim().parse().ok().filter(|p| (1..=9).contains(p))
}

fn sized_target(
    t: DateTime<FixedOffset>,
    base: &str,
    suffix: &str,
    precision: i32,
) -> (DateTime<FixedOffset>, String) {
    if (1..=9).contains(&precision) {
        (
            trim_frac_to(t, precision),
            format!("{}({}){}", base, precision, suffix),
        )
    } else {
        (t, format!("{}{}", base, suffix))
    }
}

/// Truncate the fractional second to `p` decimal digits, rounding half-up on
/// the residual; out-of-range precision leaves the instant untouched.
pub fn trim_frac_to(t: DateTime<FixedOffset>, p: i32) -> DateTime<FixedOffset> {
    if !(0..=9).contains(&p) {
        return t;
    }
    let nanos = t.nanosecond() % 1_000_000_000; // leap-second guard
    let scale = 10u32.pow((9 - p) as u32);
    let rounded = (nanos + scale / 2) / scale * scale;
    let base = t - Duration::nanoseconds(nanos as i64);
    base + Duration::nanoseconds(rounded as i64)
}

/// `YYYY-MM-DDTHH:MM:SS[.fff...][+HH:MM]`, fractional digits capped at the
/// precision so nothing beyond `p` leaks into the literal.
fn format_timestamp(t: DateTime<FixedOffset>, precision: i32, with_zone: bool) -> String {
    let mut out = t.format("%Y-%m-%dT%H:%M:%S").to_string();
    let nanos = t.nanosecond() % 1_000_000_000;
    let digits = if (1..=9).contains(&precision) {
        precision as usize
    } else {
        9
    };
    if nanos > 0 {
        let frac = format!("{:09}", nanos);
        let frac = &frac[..digits];
        let trimmed = frac.trim_end_matches('0');
        if !trimmed.is_empty() {
            out.push('.');
            out.push_str(trimmed);
        }
    }
    if with_zone {
        out.push_str(&t.format(" %:z").to_string());
    }
    out
}

/// `HEXTORAW(?)` with the 32-hex-digit text of the value.
pub fn hextoraw(bytes: &[u8; 16]) -> Value {
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    Value::Expr(SqlExpr::new("HEXTORAW(?)", vec![Value::Text(hex)]))
}

fn is_raw_type(data_type: &str) -> bool {
    data_type.to_uppercase().starts_with("RAW")
}

/// A 32/36-char UUID string, with or without hyphens.
pub fn parse_uuid_text(s: &str) -> Option<[u8; 16]> {
    let compact: String = s.chars().filter(|c| *c != '-').collect();
    if compact.len() != 32 {
        return None;
    }
    let mut out = [0u8; 16];
    for i in 0..16 {
        let hi = from_hex(compact.as_bytes()[i * 2])?;
        let lo = from_hex(compact.as_bytes()[i * 2 + 1])?;
        out[i] = (hi << 4) | lo;
    }
    Some(out)
}

fn from_hex(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn ts(nanos: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 5, 10, 20, 30)
            .unwrap()
            .with_nanosecond(nanos)
            .unwrap()
    }

    #[test]
    fn bool_binds_as_integer() {
        assert_eq!(convert_value(Value::Bool(true), "NUMBER(1)", 0, false), Value::Int(1));
        assert_eq!(convert_value(Value::Bool(false), "NUMBER(1)", 0, false), Value::Int(0));
    }

    #[test]
    fn short_string_is_cast() {
        let v = convert_value(Value::Text("abc".into()), "VARCHAR2(64)", 0, false);
        match v {
            Value::Expr(e) => {
                assert_eq!(e.sql, "CAST(? AS VARCHAR2(64))");
                assert_eq!(e.vars, vec![Value::Text("abc".into())]);
            }
            other => panic!("expected expr, got {:?}", other),
        }
    }

    #[test]
    fn long_string_becomes_clob() {
        let s = "x".repeat(2001);
        assert_eq!(
            convert_value(Value::Text(s.clone()), "VARCHAR2(4000)", 0, false),
            Value::Clob(s)
        );
    }

    #[test]
    fn empty_string_not_null_binds_a_space() {
        let v = convert_value(Value::Text(String::new()), "VARCHAR2(64)", 0, true);
        match v {
            Value::Expr(e) => assert_eq!(e.vars, vec![Value::Text(" ".into())]),
            other => panic!("expected expr, got {:?}", other),
        }
    }

    #[test]
    fn empty_string_nullable_is_typed_null() {
        let v = convert_value(Value::Text(String::new()), "VARCHAR2(64)", 0, false);
        match v {
            Value::Expr(e) => assert_eq!(e.sql, "CAST(NULL AS VARCHAR2(64))"),
            other => panic!("expected expr, got {:?}", other),
        }
    }

    #[test]
    fn null_cast_recognizes_families() {
        match cast_null_expr("timestamp(6) with time zone") {
            Value::Expr(e) => assert_eq!(e.sql, "CAST(NULL AS TIMESTAMP(6) WITH TIME ZONE)"),
            other => panic!("expected expr, got {:?}", other),
        }
        assert_eq!(cast_null_expr("SDO_GEOMETRY"), Value::Null);
        assert_eq!(cast_null_expr(""), Value::Null);
    }

    #[test]
    fn raw16_uses_hextoraw() {
        let v = convert_value(Value::Raw16([0xAB; 16]), "RAW(16)", 0, false);
        match v {
            Value::Expr(e) => {
                assert_eq!(e.sql, "HEXTORAW(?)");
                assert_eq!(e.vars, vec![Value::Text("ab".repeat(16))]);
            }
            other => panic!("expected expr, got {:?}", other),
        }
    }

    #[test]
    fn uuid_text_on_raw_column_uses_hextoraw() {
        let v = convert_value(
            Value::Text("6ba7b810-9dad-11d1-80b4-00c04fd430c8".into()),
            "RAW(16)",
            0,
            false,
        );
        match v {
            Value::Expr(e) => {
                assert_eq!(e.sql, "HEXTORAW(?)");
                assert_eq!(e.vars, vec![Value::Text("6ba7b8109dad11d180b400c04fd430c8".into())]);
            }
            other => panic!("expected expr, got {:?}", other),
        }
    }

    #[test]
    fn timestamp_tz_respects_precision() {
        let v = cast_time(ts(123_456_789), "TIMESTAMP WITH TIME ZONE", 6);
        match v {
            Value::Expr(e) => {
                assert_eq!(
                    e.sql,
                    format!(
                        "CAST(TO_TIMESTAMP_TZ(?, '{}') AS TIMESTAMP(6) WITH TIME ZONE)",
                        NLS_TIMESTAMP_TZ_FORMAT
                    )
                );
                assert_eq!(
                    e.vars,
                    vec![Value::Text("2024-03-05T10:20:30.123457 +01:00".into())]
                );
            }
            other => panic!("expected expr, got {:?}", other),
        }
    }

    #[test]
    fn date_cast_has_no_fraction() {
        let v = cast_time(ts(999_999_999), "DATE", 0);
        match v {
            Value::Expr(e) => {
                assert_eq!(e.vars, vec![Value::Text("2024-03-05T10:20:30".into())]);
            }
            other => panic!("expected expr, got {:?}", other),
        }
    }

    #[test]
    fn trim_rounds_half_up() {
        let t = trim_frac_to(ts(123_456_500), 6);
        assert_eq!(t.nanosecond(), 123_457_000);
        let t = trim_frac_to(ts(123_456_499), 6);
        assert_eq!(t.nanosecond(), 123_456_000);
    }

    #[test]
    fn trim_carries_into_seconds() {
        let t = trim_frac_to(ts(999_999_999), 3);
        assert_eq!(t.nanosecond(), 0);
        assert_eq!(t.second(), 31);
    }

    #[test]
    fn out_of_range_precision_is_untouched() {
        let t = trim_frac_to(ts(123_456_789), 12);
        assert_eq!(t.nanosecond(), 123_456_789);
    }
}
