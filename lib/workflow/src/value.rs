//! Stored comparison values for route conditions.
//!
//! A condition compares submitted data against a value authored in the
//! workflow editor. Editors persist these values loosely: a list of options
//! may arrive as a real JSON array or as the string `"[\"a\",\"b\"]"`. The
//! [`ConditionValue`] variant type makes the kind explicit and
//! [`ConditionValue::parse_literal`] is the single, total interpretation of
//! string literals that look structured.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as JsonValue};
use std::borrow::Cow;
use std::fmt;

/// A comparison value stored on a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    /// A boolean literal.
    Bool(bool),
    /// A numeric literal, kept in its original JSON representation.
    Number(Number),
    /// A string literal.
    String(String),
    /// An ordered sequence of values.
    List(Vec<JsonValue>),
    /// A keyed record.
    Record(Map<String, JsonValue>),
}

impl ConditionValue {
    /// Interprets a raw string literal.
    ///
    /// Strings starting with `[` or `{` are parsed as JSON; an array becomes
    /// [`ConditionValue::List`] and an object becomes
    /// [`ConditionValue::Record`]. Anything else, including a failed parse,
    /// stays a plain string. This never fails.
    #[must_use]
    pub fn parse_literal(raw: &str) -> Self {
        parse_structured(raw).unwrap_or_else(|| Self::String(raw.to_string()))
    }

    /// Returns this value with structured string literals expanded.
    ///
    /// Values that are already structured (or plain strings) are borrowed.
    #[must_use]
    pub fn interpreted(&self) -> Cow<'_, Self> {
        match self {
            Self::String(raw) => match parse_structured(raw) {
                Some(parsed) => Cow::Owned(parsed),
                None => Cow::Borrowed(self),
            },
            _ => Cow::Borrowed(self),
        }
    }

    /// Consumes the value, expanding a structured string literal in place.
    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            Self::String(raw) => Self::parse_literal(&raw),
            other => other,
        }
    }

    /// Converts the value to its JSON form.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Number(n) => JsonValue::Number(n.clone()),
            Self::String(s) => JsonValue::String(s.clone()),
            Self::List(items) => JsonValue::Array(items.clone()),
            Self::Record(map) => JsonValue::Object(map.clone()),
        }
    }

    /// Returns a short name of the value kind, for messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Record(_) => "record",
        }
    }
}

fn parse_structured(raw: &str) -> Option<ConditionValue> {
    let trimmed = raw.trim_start();
    if !(trimmed.starts_with('[') || trimmed.starts_with('{')) {
        return None;
    }
    match serde_json::from_str::<JsonValue>(raw) {
        Ok(JsonValue::Array(items)) => Some(ConditionValue::List(items)),
        Ok(JsonValue::Object(map)) => Some(ConditionValue::Record(map)),
        _ => None,
    }
}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(_) | Self::Record(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for ConditionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConditionValue {
    fn from(value: i64) -> Self {
        Self::Number(Number::from(value))
    }
}

impl From<Vec<JsonValue>> for ConditionValue {
    fn from(value: Vec<JsonValue>) -> Self {
        Self::List(value)
    }
}
