//! SQL identifier handling for table and column names.
//!
//! [`Ident`] represents a possibly schema-qualified name. Parts that match
//! `[A-Za-z_][A-Za-z0-9_$]*` render as-is; anything else is rendered quoted,
//! with `"` escaped as `""`.
//!
//! # Example
//! ```
//! use sqlcraft::Ident;
//!
//! let t = Ident::parse("public.Track")?;
//! assert_eq!(t.to_sql(), "public.Track");
//! let c = Ident::parse(r#""Unit Price""#)?;
//! assert_eq!(c.to_sql(), r#""Unit Price""#);
//! # Ok::<(), sqlcraft::DbError>(())
//! ```

use crate::error::{DbError, DbResult};
use std::fmt;

/// A part of a SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentPart {
    /// Unquoted identifier: must match `[A-Za-z_][A-Za-z0-9_$]*`.
    Unquoted(String),
    /// Quoted identifier: allows any characters except NUL.
    Quoted(String),
}

impl IdentPart {
    /// The name without quoting.
    pub fn name(&self) -> &str {
        match self {
            IdentPart::Unquoted(s) | IdentPart::Quoted(s) => s,
        }
    }
}

/// A SQL identifier (schema-qualified table name, or a column name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    pub parts: Vec<IdentPart>,
}

/// Whether `s` is usable as an identifier without quoting.
pub fn is_plain(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c == '$' || c.is_ascii_alphanumeric())
}

impl Ident {
    /// Create a single-part identifier from a raw name.
    ///
    /// Names that are not plain identifiers are kept verbatim and rendered quoted.
    pub fn new(name: &str) -> DbResult<Self> {
        if name.is_empty() {
            return Err(DbError::config("Identifier cannot be empty"));
        }
        if name.contains('\0') {
            return Err(DbError::config("Identifier cannot contain NUL character"));
        }
        let part = if is_plain(name) {
            IdentPart::Unquoted(name.to_string())
        } else {
            IdentPart::Quoted(name.to_string())
        };
        Ok(Self { parts: vec![part] })
    }

    /// Parse an identifier string, supporting dotted and quoted forms.
    ///
    /// - Dotted: `schema.table`
    /// - Quoted: `"CamelCase"."Track"`
    /// - Mixed: `public."Track"`
    pub fn parse(s: &str) -> DbResult<Self> {
        if s.is_empty() {
            return Err(DbError::config("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(DbError::config("Identifier cannot contain NUL character"));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') => {
                        if chars.peek().is_none() {
                            return Err(DbError::config("Trailing '.' in identifier"));
                        }
                    }
                    Some(c) => {
                        return Err(DbError::config(format!(
                            "Expected '.' between identifier parts, got '{c}'"
                        )));
                    }
                    None => break,
                }
            }

            if chars.peek() == Some(&'"') {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('"') => {
                            if chars.peek() == Some(&'"') {
                                chars.next();
                                name.push('"');
                            } else {
                                break;
                            }
                        }
                        Some(c) => name.push(c),
                        None => return Err(DbError::config("Unclosed quoted identifier")),
                    }
                }
                if name.is_empty() {
                    return Err(DbError::config("Empty quoted identifier"));
                }
                parts.push(IdentPart::Quoted(name));
                continue;
            }

            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                let ok = if name.is_empty() {
                    c == '_' || c.is_ascii_alphabetic()
                } else {
                    c == '_' || c == '$' || c.is_ascii_alphanumeric()
                };
                if !ok {
                    return Err(DbError::config(format!(
                        "Invalid character in identifier '{s}': '{c}'"
                    )));
                }
                name.push(c);
                chars.next();
            }
            if name.is_empty() {
                return Err(DbError::config("Empty identifier segment"));
            }
            parts.push(IdentPart::Unquoted(name));
        }

        if parts.is_empty() {
            return Err(DbError::config("Empty identifier"));
        }

        Ok(Self { parts })
    }

    /// The last part of the identifier (the table or column name itself).
    pub fn name(&self) -> &str {
        self.parts.last().map(IdentPart::name).unwrap_or_default()
    }

    /// Render the identifier as SQL.
    pub fn to_sql(&self) -> String {
        let mut out = String::new();
        self.write_sql(&mut out);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match part {
                IdentPart::Unquoted(s) => out.push_str(s),
                IdentPart::Quoted(s) => write_quoted(s, out),
            }
        }
    }
}

/// Render a single name, quoting it only when it is not a plain identifier.
pub(crate) fn write_name(name: &str, out: &mut String) {
    if is_plain(name) {
        out.push_str(name);
    } else {
        write_quoted(name, out);
    }
}

fn write_quoted(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}
