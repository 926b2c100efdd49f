//! Identifier naming policy.
//!
//! Renders identifiers the way they must appear in SQL (quoted or unquoted,
//! length-capped, reserved-word aware) and produces the *dictionary-case*
//! form used to compare against `ALL_*` / `USER_*` views: uppercase for
//! identifiers emitted unquoted, exact case for quoted ones.

use serde::{Deserialize, Serialize};

use crate::error::{OraError, OraResult};
use crate::reserved::is_reserved_word;

/// Preferred rendering case for identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Case {
    /// `UPPER_SNAKE`, emitted unquoted whenever Oracle allows it.
    #[default]
    ScreamingSnake,
    /// `lower_snake`, always quoted (forces case-sensitive storage).
    Snake,
    /// `CamelCase`, always quoted.
    Camel,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamingStrategy {
    pub table_prefix: String,
    pub singular_table: bool,
    /// 0 means "use the detected cap" (30 below 12.2, 128 from 12.2 on);
    /// the dialect resolves it at initialization.
    pub identifier_max_length: usize,
    pub preferred_case: Case,
    /// When false (Oracle-default semantics) every identifier is folded to
    /// unquoted `UPPER_SNAKE`; names that cannot be represented unquoted are
    /// an error.
    pub case_sensitive: bool,
}

/// A rendered identifier part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub text: String,
    pub quoted: bool,
}

impl Ident {
    pub fn render(&self) -> String {
        if self.quoted {
            quote_ident(&self.text)
        } else {
            self.text.clone()
        }
    }
}

/// Constraint and index name kinds for [`NamingStrategy::gen_token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Pk,
    Fk,
    Uk,
    Ck,
    Idx,
}

impl TokenKind {
    fn as_str(self) -> &'static str {
        match self {
            TokenKind::Pk => "PK",
            TokenKind::Fk => "FK",
            TokenKind::Uk => "UK",
            TokenKind::Ck => "CK",
            TokenKind::Idx => "IDX",
        }
    }
}

impl NamingStrategy {
    fn max_length(&self) -> usize {
        if self.identifier_max_length == 0 {
            30
        } else {
            self.identifier_max_length
        }
    }

    /// Normalize a single (non-dotted) identifier part.
    pub fn normalize_ident(&self, part: &str) -> OraResult<Ident> {
        let name = part.trim();
        if name.is_empty() {
            return Err(OraError::EmptyIdentifier);
        }

        // Explicitly quoted input is preserved byte for byte; the stored text
        // is the unescaped inner so rendering re-escapes it exactly once.
        if is_quoted(name) {
            return Ok(Ident {
                text: unescape_inner(&name[1..name.len() - 1]),
                quoted: true,
            });
        }

        if !self.case_sensitive {
            let up = self.cap(to_screaming_snake(name));
            if !valid_unquoted(&up) {
                return Err(OraError::UnquotableIdentifier(name.to_string()));
            }
            if is_reserved_word(&up) {
                return Ok(Ident {
                    text: up,
                    quoted: true,
                });
            }
            return Ok(Ident {
                text: up,
                quoted: false,
            });
        }

        match self.preferred_case {
            Case::ScreamingSnake => {
                let up = self.cap(to_screaming_snake(name));
                if valid_unquoted(&up) && !is_reserved_word(&up) {
                    Ok(Ident {
                        text: up,
                        quoted: false,
                    })
                } else {
                    Ok(Ident {
                        text: up,
                        quoted: true,
                    })
                }
            }
            Case::Snake => Ok(Ident {
                text: self.cap(to_snake(name)),
                quoted: true,
            }),
            Case::Camel => Ok(Ident {
                text: self.cap(to_camel(name)),
                quoted: true,
            }),
        }
    }

    /// Normalize each part of a possibly schema-qualified name, rendering
    /// quotes as decided. Falls back to the original input when a part is
    /// not representable (the probe will then simply find nothing).
    pub fn normalize_qualified(&self, input: &str) -> String {
        let trimmed = input.trim();
        let mut out = Vec::new();
        for part in trimmed.split('.') {
            match self.normalize_ident(part) {
                Ok(ident) => out.push(ident.render()),
                Err(_) => return input.to_string(),
            }
        }
        out.join(".")
    }

    /// The form of a part as the data dictionary stores it.
    pub fn dictionary_case(&self, part: &str) -> String {
        let name = part.trim();
        if is_quoted(name) {
            return unescape_inner(&name[1..name.len() - 1]);
        }
        match self.normalize_ident(name) {
            Ok(ident) => ident.text,
            Err(_) => name.to_uppercase(),
        }
    }

    /// Dictionary-case each dotted part, keeping the dots.
    pub fn dictionary_qualified(&self, input: &str) -> String {
        input
            .trim()
            .split('.')
            .map(|p| self.dictionary_case(p))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Apply the length cap: an over-long rendered part keeps its head and
    /// replaces the tail with `_` plus eight uppercase hex digits of the
    /// FNV-1a hash of the full pre-cap name.
    pub fn cap(&self, rendered: String) -> String {
        let max = self.max_length();
        if rendered.chars().count() <= max {
            return rendered;
        }
        let hash = fnv1a32(rendered.as_bytes());
        let prefix: String = rendered.chars().take(max.saturating_sub(9)).collect();
        format!("{}_{:08X}", prefix, hash)
    }

    /// Deterministic constraint/index names: `KIND_<OBJECT>[_<COL>...]_<FNV8>`.
    ///
    /// The hash seed is the dictionary-case anchor `OWNER.OBJECT|COL1|COL2|...`
    /// so quoted and unquoted twins of the same spelling get distinct names
    /// and the result is unique under the identifier cap.
    pub fn gen_token(&self, kind: TokenKind, object: &str, cols: &[&str]) -> String {
        let anchor = {
            let mut seed = self.dictionary_qualified(object);
            for col in cols {
                seed.push('|');
                seed.push_str(&self.dictionary_case(col));
            }
            seed
        };
        let hash = fnv1a32(anchor.as_bytes());

        let object_part = self
            .dictionary_qualified(object)
            .replace('.', "_")
            .replace(|c: char| !c.is_ascii_alphanumeric() && c != '_', "_");
        let mut base = format!("{}_{}", kind.as_str(), object_part);
        for col in cols {
            base.push('_');
            base.push_str(
                &self
                    .dictionary_case(col)
                    .replace(|c: char| !c.is_ascii_alphanumeric() && c != '_', "_"),
            );
        }

        let max = self.max_length();
        if base.chars().count() + 9 > max {
            base = base.chars().take(max.saturating_sub(9)).collect();
        }
        format!("{}_{:08X}", base, hash)
    }

    /// Render a table name: pluralize (unless disabled or the input is
    /// explicitly quoted), apply the prefix, then normalize each dotted part.
    /// A dotted prefix contributes schema qualifiers; a plain prefix
    /// concatenates into the base name.
    pub fn table_name(&self, raw: &str) -> String {
        let base = if is_quoted(raw) || self.singular_table {
            raw.to_string()
        } else {
            pluralize(raw)
        };

        let full = if self.table_prefix.is_empty() {
            base
        } else if let Some(dot) = self.table_prefix.rfind('.') {
            let (qualifier, rest) = self.table_prefix.split_at(dot + 1);
            if rest.is_empty() {
                format!("{}{}", qualifier, base)
            } else {
                format!("{}{}_{}", qualifier, rest, base)
            }
        } else {
            format!("{}_{}", self.table_prefix, base)
        };

        self.normalize_qualified(&full)
    }

    pub fn column_name(&self, raw: &str) -> String {
        self.normalize_qualified(raw)
    }
}

/// Whether `s` is already a double-quoted identifier.
pub fn is_quoted(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('"') && s.ends_with('"')
}

/// Wrap in double quotes, doubling embedded quotes.
pub fn quote_ident(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn unescape_inner(s: &str) -> String {
    s.replace("\"\"", "\"")
}

/// Oracle unquoted identifier: letter first, then letters, digits, `_ $ #`.
pub fn valid_unquoted(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '#')
}

/// 32-bit FNV-1a.
pub fn fnv1a32(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811C_9DC5;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

fn split_words(input: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = input.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
            // Boundary on lower->Upper and on the last capital of an acronym
            // run (HTTPServer -> HTTP, Server).
            if prev.is_lowercase() || (prev.is_uppercase() && next_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

pub fn to_screaming_snake(input: &str) -> String {
    split_words(input)
        .iter()
        .map(|w| w.to_uppercase())
        .collect::<Vec<_>>()
        .join("_")
}

pub fn to_snake(input: &str) -> String {
    split_words(input)
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

pub fn to_camel(input: &str) -> String {
    split_words(input)
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect()
}

/// Simple English pluralization for table names.
pub fn pluralize(word: &str) -> String {
    const IRREGULAR: &[(&str, &str)] = &[
        ("person", "people"),
        ("child", "children"),
        ("man", "men"),
        ("woman", "women"),
        ("tooth", "teeth"),
        ("foot", "feet"),
        ("mouse", "mice"),
        ("goose", "geese"),
    ];
    let lower = word.to_lowercase();
    for (singular, plural) in IRREGULAR {
        if lower == *singular {
            return match_case(plural, word);
        }
    }
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        return format!("{}es", word);
    }
    if lower.ends_with('y') && word.len() >= 2 {
        let before = word.chars().rev().nth(1).unwrap();
        if !matches!(before.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u') {
            return format!("{}ies", &word[..word.len() - 1]);
        }
    }
    format!("{}s", word)
}

fn match_case(replacement: &str, original: &str) -> String {
    if original
        .chars()
        .next()
        .map(|c| c.is_uppercase())
        .unwrap_or(false)
    {
        let mut chars = replacement.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    } else {
        replacement.to_string()
    }
}
