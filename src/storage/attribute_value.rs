//! Typed attribute-value JSON (`{"S": "x"}`, `{"N": "1"}`, ...).
//!
//! This is the encoding used by the managed table's change stream. Images are
//! unmarshalled into plain JSON items before anything else looks at them.

use serde_json::{Map, Number, Value};

use super::Item;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttributeValueError {
    #[error("Attribute value must be a single-key object, got: {0}")]
    Malformed(String),

    #[error("Unsupported attribute type: {0}")]
    UnsupportedType(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),
}

/// Unmarshal a map of typed attribute values into a plain item.
pub fn unmarshal_item(image: &Map<String, Value>) -> Result<Item, AttributeValueError> {
    image
        .iter()
        .map(|(name, value)| Ok((name.clone(), unmarshal(value)?)))
        .collect()
}

/// Unmarshal one typed attribute value.
pub fn unmarshal(value: &Value) -> Result<Value, AttributeValueError> {
    let (tag, inner) = match value.as_object() {
        Some(map) if map.len() == 1 => map
            .iter()
            .next()
            .ok_or_else(|| AttributeValueError::Malformed(value.to_string()))?,
        _ => return Err(AttributeValueError::Malformed(value.to_string())),
    };

    match tag.as_str() {
        "S" => Ok(Value::String(as_str(inner)?.to_string())),
        "N" => parse_number(as_str(inner)?),
        "BOOL" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| AttributeValueError::Malformed(value.to_string())),
        "NULL" => Ok(Value::Null),
        "M" => {
            let map = inner
                .as_object()
                .ok_or_else(|| AttributeValueError::Malformed(value.to_string()))?;
            Ok(Value::Object(unmarshal_item(map)?))
        }
        "L" => {
            let list = inner
                .as_array()
                .ok_or_else(|| AttributeValueError::Malformed(value.to_string()))?;
            Ok(Value::Array(
                list.iter().map(unmarshal).collect::<Result<_, _>>()?,
            ))
        }
        "SS" => {
            let list = inner
                .as_array()
                .ok_or_else(|| AttributeValueError::Malformed(value.to_string()))?;
            Ok(Value::Array(
                list.iter()
                    .map(|s| as_str(s).map(|s| Value::String(s.to_string())))
                    .collect::<Result<_, _>>()?,
            ))
        }
        "NS" => {
            let list = inner
                .as_array()
                .ok_or_else(|| AttributeValueError::Malformed(value.to_string()))?;
            Ok(Value::Array(
                list.iter()
                    .map(|s| as_str(s).and_then(parse_number))
                    .collect::<Result<_, _>>()?,
            ))
        }
        other => Err(AttributeValueError::UnsupportedType(other.to_string())),
    }
}

/// Parse a stringly-typed number; integral values stay integers.
pub(crate) fn parse_number(raw: &str) -> Result<Value, AttributeValueError> {
    if let Ok(int) = raw.parse::<i64>() {
        return Ok(Value::Number(int.into()));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| AttributeValueError::InvalidNumber(raw.to_string()))
}

fn as_str(value: &Value) -> Result<&str, AttributeValueError> {
    value
        .as_str()
        .ok_or_else(|| AttributeValueError::Malformed(value.to_string()))
}
