/// Upstream reply decoding
///
/// The webhook may answer with `{"output": ..}`, `{"message": ..}`,
/// `{"error": ..}` or plain text. Precedence: Output > Message > Error > RawText.
use crate::error::{AppError, AppResult};
use serde_json::{Map, Value};

/// Decoded shape of a webhook reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamReply {
    Output(String),
    Message(String),
    Error(String),
    /// Body that is not JSON, used verbatim
    RawText(String),
    /// JSON without any usable field
    Empty,
}

impl UpstreamReply {
    pub fn decode(body: &str) -> Self {
        let value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(_) => return UpstreamReply::RawText(body.to_string()),
        };

        let object = match value {
            Value::Object(map) => map,
            // Workflow webhooks often answer with a one-item array
            Value::Array(items) => match items.into_iter().next() {
                Some(Value::Object(map)) => map,
                _ => return UpstreamReply::Empty,
            },
            _ => return UpstreamReply::Empty,
        };

        if let Some(text) = field_text(&object, "output") {
            UpstreamReply::Output(text)
        } else if let Some(text) = field_text(&object, "message") {
            UpstreamReply::Message(text)
        } else if let Some(text) = field_text(&object, "error") {
            UpstreamReply::Error(text)
        } else {
            UpstreamReply::Empty
        }
    }

    /// Answer text, or the failure the reply stands for
    pub fn into_answer(self) -> AppResult<String> {
        match self {
            UpstreamReply::Output(text)
            | UpstreamReply::Message(text)
            | UpstreamReply::RawText(text) => Ok(text),
            UpstreamReply::Error(message) => Err(AppError::Upstream(message)),
            UpstreamReply::Empty => Err(AppError::EmptyResponse),
        }
    }
}

/// Turn a status and body into the answer
pub fn interpret(status: u16, body: &str) -> AppResult<String> {
    if !(200..300).contains(&status) {
        return Err(AppError::Http(status));
    }
    UpstreamReply::decode(body).into_answer()
}

/// Null and empty strings count as absent; other values render as compact JSON
fn field_text(object: &Map<String, Value>, field: &str) -> Option<String> {
    match object.get(field)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
