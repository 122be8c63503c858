use shared::error::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("invalid server url {url}: {reason}")]
    InvalidServerUrl { url: String, reason: String },
    #[error("outbound queue is full")]
    Backpressure,
    #[error("channel is disconnected")]
    Disconnected,
    #[error("session driver has stopped")]
    DriverStopped,
}
