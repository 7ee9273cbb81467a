//! Lenient extraction of a JSON object from model output

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use super::parser::{OutputParser, ParseError, ParseResult, ParserConfig};

/// Pulls the first balanced top-level `{ ... }` out of free text.
///
/// Models wrap their answer in commentary or markdown fences; everything
/// around the object is ignored.
pub struct JsonObjectParser {
    config: ParserConfig,
}

impl JsonObjectParser {
    pub fn new() -> Self {
        Self {
            config: ParserConfig::default(),
        }
    }

    /// Create a strict parser (no repair)
    pub fn strict() -> Self {
        Self {
            config: ParserConfig::strict(),
        }
    }

    fn strip_code_fences<'a>(&self, input: &'a str) -> &'a str {
        static CODE_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"```(?:json|JSON)?\s*\n?([\s\S]*?)\n?```").unwrap()
        });

        CODE_FENCE_RE
            .captures(input)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|body| body.contains('{'))
            .unwrap_or(input)
    }

    /// Slice of the first balanced object, or the unterminated tail starting
    /// at the first `{` when the braces never close.
    fn first_object<'a>(&self, input: &'a str) -> Option<(&'a str, bool)> {
        let start = input.find('{')?;
        let tail = &input[start..];
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escape_next = false;

        for (i, c) in tail.char_indices() {
            if escape_next {
                escape_next = false;
                continue;
            }
            match c {
                '\\' if in_string => escape_next = true,
                '"' => in_string = !in_string,
                '{' if !in_string => depth += 1,
                '}' if !in_string => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some((&tail[..=i], true));
                    }
                }
                _ => {}
            }
        }

        Some((tail, false))
    }

    fn repair(&self, candidate: &str) -> String {
        static TRAILING_COMMA_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r",(\s*[}\]])").unwrap());

        let mut repaired = TRAILING_COMMA_RE.replace_all(candidate, "$1").to_string();

        let open = repaired.matches('{').count();
        let close = repaired.matches('}').count();
        for _ in close..open {
            repaired.push('}');
        }
        repaired
    }

    fn into_object(value: Value) -> ParseResult<Map<String, Value>> {
        match value {
            Value::Object(map) => Ok(map),
            Value::Array(_) => Err(ParseError::NotAnObject("array")),
            Value::String(_) => Err(ParseError::NotAnObject("string")),
            Value::Number(_) => Err(ParseError::NotAnObject("number")),
            Value::Bool(_) => Err(ParseError::NotAnObject("bool")),
            Value::Null => Err(ParseError::NotAnObject("null")),
        }
    }
}

impl Default for JsonObjectParser {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputParser for JsonObjectParser {
    type Output = Map<String, Value>;

    fn parse(&self, raw: &str) -> ParseResult<Self::Output> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParseError::EmptyInput);
        }

        let input = if self.config.strip_code_fences {
            self.strip_code_fences(trimmed)
        } else {
            trimmed
        };

        let Some((candidate, balanced)) = self.first_object(input) else {
            return match serde_json::from_str::<Value>(input) {
                Ok(value) => Self::into_object(value),
                Err(_) => Err(ParseError::InvalidFormat(
                    "no JSON object found in output".to_string(),
                )),
            };
        };

        if balanced {
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                return Self::into_object(value);
            }
        }

        if self.config.attempt_repair {
            let repaired = self.repair(candidate);
            if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
                return Self::into_object(value);
            }
        }

        Err(ParseError::InvalidFormat(
            "failed to parse JSON object after repair attempts".to_string(),
        ))
    }
}
