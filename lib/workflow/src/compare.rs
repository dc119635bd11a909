//! Type-aware comparison between stored condition values and submitted data.
//!
//! Every function here is total: values that cannot be compared under an
//! operator simply do not match. Route evaluation relies on this so that
//! malformed or missing data skips a route instead of aborting.

use crate::condition::Operator;
use crate::value::ConditionValue;
use serde_json::Value as JsonValue;

/// Compares a submitted value against a stored condition value.
///
/// `stored` is `None` for conditions authored without a value; only the
/// boolean operators (which ignore it) and `==`/`!=` against `null` can
/// match in that case.
#[must_use]
pub fn compare(operator: Operator, stored: Option<&ConditionValue>, submitted: &JsonValue) -> bool {
    let stored = stored.map(|value| value.interpreted().to_json());
    let stored = stored.as_ref().unwrap_or(&JsonValue::Null);

    match operator {
        Operator::Eq => values_equal(stored, submitted),
        Operator::Ne => !values_equal(stored, submitted),
        Operator::Gt => numeric_pair(submitted, stored).is_some_and(|(lhs, rhs)| lhs > rhs),
        Operator::Lt => numeric_pair(submitted, stored).is_some_and(|(lhs, rhs)| lhs < rhs),
        Operator::Contains => contains(submitted, stored),
        Operator::NotContains => !contains(submitted, stored),
        Operator::IsTrue => coerce_bool(submitted) == Some(true),
        Operator::IsFalse => coerce_bool(submitted) == Some(false),
    }
}

/// Coerces a value to a finite number.
///
/// JSON numbers convert directly; strings are trimmed and parsed. Anything
/// else, and non-finite results such as `"NaN"`, yield `None`.
#[must_use]
pub fn coerce_number(value: &JsonValue) -> Option<f64> {
    let number = match value {
        JsonValue::Number(n) => n.as_f64()?,
        JsonValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Coerces a value to a boolean.
///
/// Booleans pass through, the strings `"true"`/`"false"` match in any case,
/// and the numbers `1`/`0` map to `true`/`false`. Everything else is
/// neither.
#[must_use]
pub fn coerce_bool(value: &JsonValue) -> Option<bool> {
    match value {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        JsonValue::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        JsonValue::Number(n) => match n.as_f64() {
            Some(x) if x == 1.0 => Some(true),
            Some(x) if x == 0.0 => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Deep equality with numeric coercion.
///
/// When either side is a JSON number, both sides are compared numerically if
/// both coerce. Strings compare exactly (case-sensitive). Arrays and objects
/// compare element by element.
#[must_use]
pub fn values_equal(left: &JsonValue, right: &JsonValue) -> bool {
    if left.is_number() || right.is_number() {
        return match (coerce_number(left), coerce_number(right)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
    }

    match (left, right) {
        (JsonValue::Null, JsonValue::Null) => true,
        (JsonValue::Bool(a), JsonValue::Bool(b)) => a == b,
        (JsonValue::String(a), JsonValue::String(b)) => a == b,
        (JsonValue::Array(a), JsonValue::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (JsonValue::Object(a), JsonValue::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| values_equal(x, y)))
        }
        _ => false,
    }
}

fn numeric_pair(submitted: &JsonValue, stored: &JsonValue) -> Option<(f64, f64)> {
    Some((coerce_number(submitted)?, coerce_number(stored)?))
}

fn contains(submitted: &JsonValue, stored: &JsonValue) -> bool {
    match submitted {
        JsonValue::Array(items) => match stored {
            // An empty stored list matches nothing, as it does for text.
            JsonValue::Array(needles) => {
                !needles.is_empty()
                    && needles
                        .iter()
                        .all(|needle| items.iter().any(|item| values_equal(item, needle)))
            }
            JsonValue::Null => false,
            needle => items.iter().any(|item| values_equal(item, needle)),
        },
        JsonValue::String(haystack) => match stored {
            JsonValue::String(needle) => haystack.contains(needle.as_str()),
            JsonValue::Number(n) => haystack.contains(&n.to_string()),
            JsonValue::Bool(b) => haystack.contains(&b.to_string()),
            // A stored list is a set of accepted values for a text field.
            JsonValue::Array(options) => options.iter().any(|option| values_equal(option, submitted)),
            _ => false,
        },
        _ => false,
    }
}
