//! Errors raised at the record-decoding boundary.

/// A store record could not be turned into a typed value.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("record is missing required field `{field}`")]
    MissingField { field: &'static str },
    #[error("record field `{field}` is empty")]
    EmptyField { field: &'static str },
    #[error("record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
