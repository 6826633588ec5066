//! Parameter placeholder styles.

use crate::error::{DbError, DbResult};
use std::fmt;

/// Placeholder syntax used when rendering value expressions.
///
/// Chosen once per database from the style the driver declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamStyle {
    /// `?`
    #[default]
    Qmark,
    /// `%s`
    Format,
    /// `%s` (keyword-style drivers bound positionally)
    Pyformat,
    /// `$1, $2, ...`
    Numeric,
}

impl ParamStyle {
    /// Resolve a driver's declared style name.
    pub fn from_name(name: &str) -> DbResult<Self> {
        match name {
            "qmark" => Ok(Self::Qmark),
            "format" => Ok(Self::Format),
            "pyformat" => Ok(Self::Pyformat),
            "numeric" => Ok(Self::Numeric),
            other => Err(DbError::config(format!(
                "unsupported parameter style '{other}'"
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Qmark => "qmark",
            Self::Format => "format",
            Self::Pyformat => "pyformat",
            Self::Numeric => "numeric",
        }
    }

    /// Write the placeholder for the `index`-th (1-based) parameter.
    pub(crate) fn write_placeholder(self, index: usize, out: &mut String) {
        match self {
            Self::Qmark => out.push('?'),
            Self::Format | Self::Pyformat => out.push_str("%s"),
            Self::Numeric => {
                out.push('$');
                out.push_str(&index.to_string());
            }
        }
    }

    /// Whether a literal `%` in SQL text must be doubled.
    pub(crate) fn escapes_percent(self) -> bool {
        matches!(self, Self::Format | Self::Pyformat)
    }
}

impl fmt::Display for ParamStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
