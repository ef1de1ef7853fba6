//! Typed decoding of inbound sensor, switch and device-echo payloads.

use serde_json::{Map, Value};

use crate::error::ParseError;

/// Interpret raw bytes as a UTF-8 string, as used for device echoes.
///
/// # Errors
///
/// Returns [`ParseError::Utf8`] if the bytes are not valid UTF-8.
pub fn decode_text(raw: &[u8]) -> Result<&str, ParseError> {
    Ok(std::str::from_utf8(raw)?)
}

/// Extract the boolean occupancy flag named `field`.
///
/// # Errors
///
/// Returns [`ParseError`] if the payload is not a JSON object, the field is
/// absent, or it is not a boolean.
pub fn decode_occupancy(raw: &[u8], field: &str) -> Result<bool, ParseError> {
    let object = decode_object(raw)?;
    match require(&object, field)? {
        Value::Bool(occupied) => Ok(*occupied),
        _ => Err(ParseError::WrongType {
            field: field.to_string(),
            expected: "boolean",
        }),
    }
}

/// Extract the string action named `field`.
///
/// # Errors
///
/// Returns [`ParseError`] if the payload is not a JSON object, the field is
/// absent, or it is not a string.
pub fn decode_action(raw: &[u8], field: &str) -> Result<String, ParseError> {
    let mut object = decode_object(raw)?;
    match object.remove(field) {
        Some(Value::String(action)) => Ok(action),
        Some(_) => Err(ParseError::WrongType {
            field: field.to_string(),
            expected: "string",
        }),
        None => Err(ParseError::MissingField {
            field: field.to_string(),
        }),
    }
}

fn decode_object(raw: &[u8]) -> Result<Map<String, Value>, ParseError> {
    match serde_json::from_str::<Value>(decode_text(raw)?)? {
        Value::Object(object) => Ok(object),
        _ => Err(ParseError::NotAnObject),
    }
}

fn require<'a>(object: &'a Map<String, Value>, field: &str) -> Result<&'a Value, ParseError> {
    object.get(field).ok_or_else(|| ParseError::MissingField {
        field: field.to_string(),
    })
}
