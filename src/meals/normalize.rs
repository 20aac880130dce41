use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::error::MealError;

use super::dto::MacroEstimate;

const FIELDS: [&str; 5] = ["calories", "protein", "fat", "fibre", "sugar"];

/// Removes a surrounding ```` ```json ```` or ```` ``` ```` fence. The closing
/// fence is optional, matching what models actually emit.
pub fn strip_fence(raw: &str) -> &str {
    lazy_static! {
        static ref FENCE_RE: Regex = Regex::new(r"(?s)\A```(?:json)?(.*?)(?:```)?\z").unwrap();
    }
    let trimmed = raw.trim();
    match FENCE_RE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

/// Turns a completion into a `MacroEstimate`. The text must be a JSON object
/// carrying all five fields as numbers; anything else is `MalformedEstimate`.
pub fn normalize(raw: &str) -> Result<MacroEstimate, MealError> {
    let body = strip_fence(raw);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| MealError::MalformedEstimate(format!("not json: {e}")))?;

    let Value::Object(map) = &value else {
        return Err(MealError::MalformedEstimate(format!(
            "expected object, got {}",
            kind_of(&value)
        )));
    };

    for field in FIELDS {
        match map.get(field) {
            Some(Value::Number(_)) => {}
            Some(other) => {
                return Err(MealError::MalformedEstimate(format!(
                    "field {field} is {}, not a number",
                    kind_of(other)
                )))
            }
            None => {
                return Err(MealError::MalformedEstimate(format!("missing field {field}")));
            }
        }
    }

    serde_json::from_value(value).map_err(|e| MealError::MalformedEstimate(e.to_string()))
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
