//! Pluggable value-format conversion for property handlers.

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use crate::value::Value;

/// Conversion failure; recoverable, reported with a location by the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConvertError {
    #[error("not a valid integer: '{0}'")]
    Integer(String),

    #[error("not a valid number: '{0}'")]
    Float(String),

    #[error("not a valid boolean: '{0}' (expected true/false/yes/no/1/0)")]
    Boolean(String),

    #[error("not a valid date: '{0}' (expected YYYY-MM-DD)")]
    Date(String),
}

/// How raw attribute or element text is turned into a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueFormat {
    /// Keep the raw text as-is.
    #[default]
    Text,
    Integer,
    Float,
    Boolean,
    /// ISO calendar date; stored back as its canonical `YYYY-MM-DD` text.
    Date,
}

impl ValueFormat {
    /// Convert raw text according to this format.
    pub fn convert(&self, raw: &str) -> Result<Value, ConvertError> {
        let trimmed = raw.trim();
        match self {
            ValueFormat::Text => Ok(Value::Str(raw.to_string())),
            ValueFormat::Integer => trimmed
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| ConvertError::Integer(trimmed.to_string())),
            ValueFormat::Float => trimmed
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| ConvertError::Float(trimmed.to_string())),
            ValueFormat::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "0" => Ok(Value::Bool(false)),
                _ => Err(ConvertError::Boolean(trimmed.to_string())),
            },
            ValueFormat::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(|d| Value::Str(d.format("%Y-%m-%d").to_string()))
                .map_err(|_| ConvertError::Date(trimmed.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_keeps_raw() {
        assert_eq!(
            ValueFormat::Text.convert("  spaced  "),
            Ok(Value::Str("  spaced  ".into()))
        );
    }

    #[test]
    fn test_integer() {
        assert_eq!(ValueFormat::Integer.convert(" 42 "), Ok(Value::Int(42)));
        assert_eq!(
            ValueFormat::Integer.convert("4x"),
            Err(ConvertError::Integer("4x".into()))
        );
    }

    #[test]
    fn test_boolean_aliases() {
        assert_eq!(ValueFormat::Boolean.convert("Yes"), Ok(Value::Bool(true)));
        assert_eq!(ValueFormat::Boolean.convert("0"), Ok(Value::Bool(false)));
        assert!(ValueFormat::Boolean.convert("maybe").is_err());
    }

    #[test]
    fn test_date_normalizes() {
        assert_eq!(
            ValueFormat::Date.convert("2025-01-01"),
            Ok(Value::Str("2025-01-01".into()))
        );
        assert_eq!(
            ValueFormat::Date.convert("01-01-2025"),
            Err(ConvertError::Date("01-01-2025".into()))
        );
    }

    #[test]
    fn test_float() {
        assert_eq!(ValueFormat::Float.convert("2.5"), Ok(Value::Float(2.5)));
        assert!(ValueFormat::Float.convert("").is_err());
    }
}
