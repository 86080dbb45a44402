use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("message type {0:?} is not valid in this direction")]
    UnexpectedDirection(&'static str),
}
