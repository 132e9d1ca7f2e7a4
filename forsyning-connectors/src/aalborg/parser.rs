//! Aalborg Forsyning response parser.

use forsyning_core::{MeterId, MeterReading};
use forsyning_fetch::{AccessToken, FetchError};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetersResponse {
    #[serde(rename = "RegisteredMeters", default)]
    registered_meters: Vec<Value>,
}

/// Extracts `access_token` from the token endpoint's JSON body.
pub fn parse_token(json_str: &str) -> Result<AccessToken, FetchError> {
    let response: TokenResponse = serde_json::from_str(json_str)
        .map_err(|e| FetchError::AuthenticationFailed(format!("Invalid token response: {e}")))?;

    match response.access_token {
        Some(token) if !token.is_empty() => Ok(AccessToken::new(token)),
        _ => Err(FetchError::AuthenticationFailed(
            "No access_token in response".to_string(),
        )),
    }
}

/// Extracts meter ids from `RegisteredMeters`.
///
/// Ids arrive as strings or numbers; anything else is ignored.
pub fn parse_meters(json_str: &str) -> Result<Vec<MeterId>, FetchError> {
    let response: MetersResponse = serde_json::from_str(json_str)
        .map_err(|e| FetchError::InvalidResponse(format!("Invalid meters response: {e}")))?;

    let meters: Vec<MeterId> = response
        .registered_meters
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(MeterId::new(s.trim())),
            Value::Number(n) => Some(MeterId::new(n.to_string())),
            _ => None,
        })
        .collect();

    debug!(count = meters.len(), "Parsed meter list");
    Ok(meters)
}

/// Parses a data response: an array whose first element is the reading.
pub fn parse_reading(json_str: &str) -> Result<MeterReading, FetchError> {
    let value: Value = serde_json::from_str(json_str)?;

    let first = match value {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        Value::Array(_) => {
            return Err(FetchError::InvalidResponse("Empty data array".to_string()));
        }
        other => {
            return Err(FetchError::InvalidResponse(format!(
                "Expected array, got {}",
                json_type(&other)
            )));
        }
    };

    match first {
        Value::Object(map) => Ok(MeterReading::from_map(map)),
        other => Err(FetchError::InvalidResponse(format!(
            "Expected object reading, got {}",
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token() {
        let token = parse_token(r#"{"access_token":"abc","token_type":"bearer","expires_in":86399}"#)
            .unwrap();
        assert_eq!(token.secret(), "abc");
    }

    #[test]
    fn test_parse_token_missing() {
        let err = parse_token(r#"{"error":"invalid_grant"}"#).unwrap_err();
        assert!(matches!(err, FetchError::AuthenticationFailed(_)));

        let err = parse_token("<html>").unwrap_err();
        assert!(matches!(err, FetchError::AuthenticationFailed(_)));
    }

    #[test]
    fn test_parse_meters_mixed_ids() {
        let meters = parse_meters(r#"{"RegisteredMeters":["123", 456, null, " "]}"#).unwrap();
        assert_eq!(meters, vec![MeterId::new("123"), MeterId::new("456")]);
    }

    #[test]
    fn test_parse_meters_absent_key_is_empty() {
        assert!(parse_meters("{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_reading_takes_first_element() {
        let json = r#"[
            {"MeterNumber":"123","Energy":"1234,5","Volume":88.2},
            {"MeterNumber":"123","Energy":"1200"}
        ]"#;
        let reading = parse_reading(json).unwrap();
        assert_eq!(reading.number("Energy"), Some(1234.5));
        assert_eq!(reading.number("Volume"), Some(88.2));
    }

    #[test]
    fn test_parse_reading_rejects_bad_shapes() {
        assert!(matches!(parse_reading("[]"), Err(FetchError::InvalidResponse(_))));
        assert!(matches!(parse_reading("{}"), Err(FetchError::InvalidResponse(_))));
        assert!(matches!(parse_reading("[1]"), Err(FetchError::InvalidResponse(_))));
        assert!(matches!(parse_reading("nope"), Err(FetchError::Json(_))));
    }
}
