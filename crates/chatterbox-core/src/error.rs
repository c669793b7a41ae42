use thiserror::Error;

/// Errors produced by the ChatterBox protocol layer.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("codec error: {0}")]
    Codec(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("token error: {0}")]
    Token(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("timeout")]
    Timeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::Codec(e.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for ChatError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        ChatError::Token(e.to_string())
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
