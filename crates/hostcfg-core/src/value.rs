//! Typed attribute values
//!
//! Attribute text is untyped in file form; the known-attribute catalog in
//! [`crate::schema`] assigns each known attribute an expected type. Unknown
//! attributes stay available as raw text, preserving forward compatibility
//! with vendor extensions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Expected type of a known attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    /// Free-form text
    String,
    /// Signed 64-bit integer
    Int,
    /// `true` / `false` (case-insensitive in file form)
    Bool,
    /// Closed set of named values, each with a stable numeric code
    Enum(&'static [(&'static str, u32)]),
    /// Hex-encoded binary blob (certificate hashes and similar)
    Binary,
}

/// A parsed, typed attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Bool(bool),
    Enum { name: String, value: u32 },
    Binary(Vec<u8>),
}

impl AttributeValue {
    /// Parse raw attribute text against an expected type
    ///
    /// The error is a bare description; callers wrap it into a
    /// [`crate::error::ConfigError::Schema`] with file context.
    pub fn parse(raw: &str, ty: AttributeType) -> Result<Self, String> {
        match ty {
            AttributeType::String => Ok(AttributeValue::String(raw.to_string())),
            AttributeType::Int => raw
                .parse::<i64>()
                .map(AttributeValue::Int)
                .map_err(|_| format!("'{}' is not a valid integer", raw)),
            AttributeType::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" => Ok(AttributeValue::Bool(true)),
                "false" => Ok(AttributeValue::Bool(false)),
                _ => Err(format!("'{}' is not a valid boolean", raw)),
            },
            AttributeType::Enum(variants) => variants
                .iter()
                .find(|(name, _)| *name == raw)
                .map(|(name, value)| AttributeValue::Enum {
                    name: (*name).to_string(),
                    value: *value,
                })
                .ok_or_else(|| format!("'{}' is not a valid enumeration value", raw)),
            AttributeType::Binary => decode_hex(raw)
                .map(AttributeValue::Binary)
                .ok_or_else(|| format!("'{}' is not a valid hex-encoded value", raw)),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(value) => Some(value),
            AttributeValue::Enum { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Render back to attribute text form
    pub fn to_raw(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(value) => write!(f, "{}", value),
            AttributeValue::Int(value) => write!(f, "{}", value),
            AttributeValue::Bool(value) => write!(f, "{}", value),
            AttributeValue::Enum { name, .. } => write!(f, "{}", name),
            AttributeValue::Binary(bytes) => {
                for byte in bytes {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

/// Decode a hex string with an even number of digits
fn decode_hex(raw: &str) -> Option<Vec<u8>> {
    if raw.len() % 2 != 0 {
        return None;
    }
    (0..raw.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&raw[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("true", true)]
    #[case("True", true)]
    #[case("false", false)]
    #[case("FALSE", false)]
    fn test_bool_parsing(#[case] raw: &str, #[case] expected: bool) {
        let value = AttributeValue::parse(raw, AttributeType::Bool).unwrap();
        assert_eq!(value.as_bool(), Some(expected));
    }

    #[test]
    fn test_bool_rejects_other_text() {
        let error = AttributeValue::parse("enabled", AttributeType::Bool).unwrap_err();
        assert_eq!(error, "'enabled' is not a valid boolean");
    }

    #[test]
    fn test_int_parsing() {
        let value = AttributeValue::parse("8080", AttributeType::Int).unwrap();
        assert_eq!(value.as_int(), Some(8080));
        assert!(AttributeValue::parse("80a", AttributeType::Int).is_err());
    }

    #[test]
    fn test_enum_parsing() {
        const MODES: &[(&str, u32)] = &[("None", 0), ("Sni", 1)];
        let value = AttributeValue::parse("Sni", AttributeType::Enum(MODES)).unwrap();
        assert_eq!(value, AttributeValue::Enum { name: "Sni".to_string(), value: 1 });
        assert!(AttributeValue::parse("sni", AttributeType::Enum(MODES)).is_err());
    }

    #[test]
    fn test_binary_round_trip() {
        let value = AttributeValue::parse("0aff", AttributeType::Binary).unwrap();
        assert_eq!(value, AttributeValue::Binary(vec![0x0a, 0xff]));
        assert_eq!(value.to_raw(), "0aff");
        assert!(AttributeValue::parse("0af", AttributeType::Binary).is_err());
    }
}
