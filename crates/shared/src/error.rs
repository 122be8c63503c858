use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    UnknownMode,
    Internal,
}

/// Error payload carried by the `error` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Rejection of a frame at the channel boundary.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: String },
    #[error("unknown operating mode: {0}")]
    UnknownMode(String),
}

impl From<&ProtocolError> for ApiError {
    fn from(value: &ProtocolError) -> Self {
        let code = match value {
            ProtocolError::UnknownMode(_) => ErrorCode::UnknownMode,
            ProtocolError::Malformed(_) | ProtocolError::OutOfRange { .. } => {
                ErrorCode::Validation
            }
        };
        Self::new(code, value.to_string())
    }
}
