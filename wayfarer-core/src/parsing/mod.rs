//! Structured Output Parsing
//!
//! Model responses are free text that usually contain one JSON object,
//! sometimes fenced in markdown and surrounded by commentary.
//!
//! # Example
//!
//! ```rust
//! use wayfarer_core::parsing::{JsonObjectParser, OutputParser};
//!
//! let parser = JsonObjectParser::new();
//! let result = parser.parse("Sure!\n```json\n{\"key\": \"value\",}\n```").unwrap();
//! assert_eq!(result["key"], "value");
//! ```

mod json;
mod parser;

pub use json::JsonObjectParser;
pub use parser::{OutputParser, ParseError, ParseResult, ParserConfig};

use serde_json::{Map, Value};

/// Parse the first JSON object in `raw`, degrading to an empty map.
///
/// Failures are logged with the offending text and never propagated.
pub fn parse_object_lenient(raw: &str) -> Map<String, Value> {
    match JsonObjectParser::new().parse(raw) {
        Ok(map) => map,
        Err(e) => {
            tracing::error!(error = %e, response = %raw, "Failed to parse JSON response");
            Map::new()
        }
    }
}

/// String field lookup with a default for missing or non-string values.
pub fn str_field(object: Option<&Value>, key: &str, default: &str) -> String {
    object
        .and_then(|o| o.get(key))
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_returns_empty_on_garbage() {
        assert!(parse_object_lenient("no json here").is_empty());
        assert!(parse_object_lenient("").is_empty());
    }

    #[test]
    fn test_str_field_defaults() {
        let value = serde_json::json!({"title": "Drive", "year": 1996});
        assert_eq!(str_field(Some(&value), "title", "x"), "Drive");
        assert_eq!(str_field(Some(&value), "year", "n/a"), "n/a");
        assert_eq!(str_field(Some(&value), "missing", "Unknown"), "Unknown");
        assert_eq!(str_field(None, "title", "Unknown"), "Unknown");
    }
}
