//! Route conditions and their evaluation against submitted data.

use crate::compare::compare;
use crate::value::ConditionValue;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// The keyed values submitted when a stage's work item completes.
pub type SubmittedData = Map<String, JsonValue>;

/// A comparison operator.
///
/// The serialized tokens are the persisted wire vocabulary; the short
/// names (`eq`, `ne`, ...) are accepted as aliases when reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// Equal to.
    #[serde(rename = "==", alias = "eq")]
    Eq,
    /// Not equal to.
    #[serde(rename = "!=", alias = "ne")]
    Ne,
    /// Numerically greater than.
    #[serde(rename = ">", alias = "gt")]
    Gt,
    /// Numerically less than.
    #[serde(rename = "<", alias = "lt")]
    Lt,
    /// List membership or substring.
    #[serde(rename = "contains")]
    Contains,
    /// Negation of [`Operator::Contains`].
    #[serde(rename = "not_contains")]
    NotContains,
    /// Submitted value coerces to `true`.
    #[serde(rename = "is_true")]
    IsTrue,
    /// Submitted value coerces to `false`.
    #[serde(rename = "is_false")]
    IsFalse,
}

impl Operator {
    /// All operators, in the order editors present them.
    pub const ALL: [Self; 8] = [
        Self::Eq,
        Self::Ne,
        Self::Gt,
        Self::Lt,
        Self::Contains,
        Self::NotContains,
        Self::IsTrue,
        Self::IsFalse,
    ];

    /// Returns the wire token for this operator.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::IsTrue => "is_true",
            Self::IsFalse => "is_false",
        }
    }

    /// Returns whether the operator compares against a stored value.
    #[must_use]
    pub fn requires_value(&self) -> bool {
        !matches!(self, Self::IsTrue | Self::IsFalse)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field test within a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Key into the submitted data record.
    pub field: String,
    /// The comparison operator.
    pub operator: Operator,
    /// The comparison value. Unused by `is_true`/`is_false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ConditionValue>,
}

impl Condition {
    /// Creates a condition comparing `field` against `value`.
    #[must_use]
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<ConditionValue>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: Some(value.into()),
        }
    }

    /// Creates a `field is_true` condition.
    #[must_use]
    pub fn is_true(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: Operator::IsTrue,
            value: None,
        }
    }

    /// Creates a `field is_false` condition.
    #[must_use]
    pub fn is_false(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: Operator::IsFalse,
            value: None,
        }
    }

    /// Evaluates this condition against a submitted data record.
    ///
    /// A field missing from the record never matches, whatever the operator.
    #[must_use]
    pub fn evaluate(&self, data: &SubmittedData) -> bool {
        match data.get(&self.field) {
            Some(submitted) => compare(self.operator, self.value.as_ref(), submitted),
            None => false,
        }
    }

    /// Expands a structured string literal in the stored value.
    pub fn normalize_value(&mut self) {
        if let Some(value) = self.value.take() {
            self.value = Some(value.normalized());
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.value, self.operator.requires_value()) {
            (Some(value), true) => write!(f, "{} {} {}", self.field, self.operator, value),
            _ => write!(f, "{} {}", self.field, self.operator),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: JsonValue) -> SubmittedData {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn operator_wire_tokens() {
        let tokens: Vec<String> = Operator::ALL
            .iter()
            .map(|op| serde_json::to_string(op).expect("serialize"))
            .collect();
        assert_eq!(
            tokens,
            vec![
                "\"==\"",
                "\"!=\"",
                "\">\"",
                "\"<\"",
                "\"contains\"",
                "\"not_contains\"",
                "\"is_true\"",
                "\"is_false\""
            ]
        );
    }

    #[test]
    fn operator_accepts_short_aliases() {
        let op: Operator = serde_json::from_str("\"eq\"").expect("deserialize");
        assert_eq!(op, Operator::Eq);
        let op: Operator = serde_json::from_str("\"gt\"").expect("deserialize");
        assert_eq!(op, Operator::Gt);
    }

    #[test]
    fn evaluate_looks_up_field() {
        let condition = Condition::new("urgency", Operator::Eq, "high");
        assert!(condition.evaluate(&record(json!({"urgency": "high"}))));
        assert!(!condition.evaluate(&record(json!({"urgency": "low"}))));
    }

    #[test]
    fn missing_field_never_matches() {
        let data = record(json!({"other": "high"}));
        let conditions = [
            Condition::new("urgency", Operator::Eq, "high"),
            Condition::new("urgency", Operator::Ne, "high"),
            Condition::new("urgency", Operator::Gt, 1_i64),
            Condition::new("urgency", Operator::Lt, 1_i64),
            Condition::new("urgency", Operator::Contains, "h"),
            Condition::new("urgency", Operator::NotContains, "h"),
            Condition::is_true("urgency"),
            Condition::is_false("urgency"),
        ];
        for condition in &conditions {
            assert!(!condition.evaluate(&data), "{condition} matched a missing field");
        }
    }

    #[test]
    fn condition_deserializes_without_value() {
        let condition: Condition =
            serde_json::from_value(json!({"field": "approved", "operator": "is_true"}))
                .expect("deserialize");
        assert_eq!(condition, Condition::is_true("approved"));
        assert!(condition.evaluate(&record(json!({"approved": "TRUE"}))));
    }

    #[test]
    fn normalize_value_parses_list_literal() {
        let mut condition = Condition::new("tags", Operator::Contains, r#"["vip"]"#);
        condition.normalize_value();
        assert_eq!(condition.value, Some(ConditionValue::List(vec![json!("vip")])));
    }

    #[test]
    fn display_is_readable() {
        assert_eq!(
            Condition::new("urgency", Operator::Eq, "high").to_string(),
            "urgency == \"high\""
        );
        assert_eq!(Condition::is_false("approved").to_string(), "approved is_false");
    }
}
