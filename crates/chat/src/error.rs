use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("empty message")]
    EmptyUtterance,

    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
