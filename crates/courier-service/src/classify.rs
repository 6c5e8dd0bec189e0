//! Turns raw responses into normalized [`Outcome`]s.
//!
//! The declared content type decides how the body is decoded: anything whose content type
//! mentions `json` is decoded as structured data, everything else as text. The transport's
//! success flag then decides between [`Outcome::Success`] and [`Outcome::Failure`].
//!
//! A body that cannot be decoded is not a normal failure outcome. [`classify`] returns an
//! `Err` in that case.

use serde_json::Value;

use crate::error::{Failure, RequestError};
use crate::types::{HEADERS_FIELD, HeaderSnapshot, Payload, RawResponse, header_snapshot};

/// The marker that identifies a structured content type.
const STRUCTURED_MARKER: &str = "json";

/// The normalized result of a completed call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        payload: Payload,
        headers: HeaderSnapshot,
    },
    Failure(Failure),
}

/// A decoded response body.
#[derive(Debug)]
enum Decoded {
    Structured(Value),
    Text(String),
}

fn decode(raw: &RawResponse) -> Result<Decoded, RequestError> {
    let is_structured = raw
        .content_type()
        .is_some_and(|content_type| content_type.contains(STRUCTURED_MARKER));

    if is_structured {
        Ok(Decoded::Structured(serde_json::from_slice(&raw.body)?))
    } else {
        Ok(Decoded::Text(String::from_utf8_lossy(&raw.body).into_owned()))
    }
}

/// Extracts the message of a structured error body, falling back to `status_text`.
fn error_message(body: &Value, status_text: &str) -> String {
    match body.get("error") {
        Some(Value::String(message)) if !message.is_empty() => message.clone(),
        Some(Value::Null) | Some(Value::Bool(false)) | Some(Value::String(_)) | None => {
            status_text.to_owned()
        }
        Some(Value::Number(number)) if number.as_f64() == Some(0.0) => status_text.to_owned(),
        Some(other) => other.to_string(),
    }
}

/// Classifies `raw` into an [`Outcome`].
pub fn classify(raw: &RawResponse) -> Result<Outcome, RequestError> {
    let decoded = decode(raw)?;

    if raw.is_ok() {
        let headers = header_snapshot(&raw.headers);
        let payload = match decoded {
            Decoded::Structured(Value::Object(mut object)) => {
                let snapshot = headers
                    .iter()
                    .map(|(name, value)| (name.clone(), Value::String(value.clone())))
                    .collect();
                object.insert(HEADERS_FIELD.to_owned(), Value::Object(snapshot));
                Payload::Json(Value::Object(object))
            }
            // only objects get the header snapshot, everything else is returned as-is
            Decoded::Structured(value) => Payload::Json(value),
            Decoded::Text(text) => Payload::Text(text),
        };
        return Ok(Outcome::Success { payload, headers });
    }

    let message = match &decoded {
        Decoded::Structured(body) => error_message(body, &raw.status_text),
        Decoded::Text(_) => raw.status_text.clone(),
    };
    tracing::debug!(status = raw.status.as_u16(), %message, "Request failed");

    Ok(Outcome::Failure(Failure::from_response(message, raw)))
}
