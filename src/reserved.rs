//! Oracle reserved words.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Words that cannot appear as unquoted identifiers.
pub static RESERVED_WORDS: &[&str] = &[
    "ACCESS", "ELSE", "MODIFY", "START",
    "ADD", "EXCLUSIVE", "NOAUDIT", "SELECT",
    "ALL", "EXISTS", "NOCOMPRESS", "SESSION",
    "ALTER", "FILE", "NOT", "SET",
    "AND", "FLOAT", "NOTFOUND", "SHARE",
    "ANY", "FOR", "NOWAIT", "SIZE",
    "ARRAYLEN", "FROM", "NULL", "SMALLINT",
    "AS", "GRANT", "NUMBER", "SQLBUF",
    "ASC", "GROUP", "OF", "SUCCESSFUL",
    "AUDIT", "HAVING", "OFFLINE", "SYNONYM",
    "BETWEEN", "IDENTIFIED", "ON", "SYSDATE",
    "BY", "IMMEDIATE", "ONLINE", "TABLE",
    "CHAR", "IN", "OPTION", "THEN",
    "CHECK", "INCREMENT", "OR", "TO",
    "CLUSTER", "INDEX", "ORDER", "TRIGGER",
    "COLUMN", "INITIAL", "PCTFREE", "UID",
    "COMMENT", "INSERT", "PRIOR", "UNION",
    "COMPRESS", "INTEGER", "PRIVILEGES", "UNIQUE",
    "CONNECT", "INTERSECT", "PUBLIC", "UPDATE",
    "CREATE", "INTO", "RAW", "USER",
    "CURRENT", "IS", "RENAME", "VALIDATE",
    "DATE", "LEVEL", "RESOURCE", "VALUES",
    "DECIMAL", "LIKE", "REVOKE", "VARCHAR",
    "DEFAULT", "LOCK", "ROW", "VARCHAR2",
    "DELETE", "LONG", "ROWID", "VIEW",
    "DESC", "MAXEXTENTS", "ROWLABEL", "WHENEVER",
    "DISTINCT", "MINUS", "ROWNUM", "WHERE",
    "DROP", "MODE", "ROWS", "WITH",
];

static RESERVED_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| RESERVED_WORDS.iter().copied().collect());

/// Membership test: uppercases and splits on spaces, so multi-word inputs
/// such as `GROUP BY` count as reserved when every part is.
pub fn is_reserved_word(v: &str) -> bool {
    let upper = v.to_uppercase();
    let mut parts = upper.split(' ').filter(|p| !p.is_empty()).peekable();
    if parts.peek().is_none() {
        return false;
    }
    parts.all(|p| RESERVED_SET.contains(p))
}
