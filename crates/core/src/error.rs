use thiserror::Error;

#[derive(Error, Debug)]
pub enum VistaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid record '{id}': {reason}")]
    InvalidRecord { id: String, reason: String },

    #[error("Invalid scoring config: {0}")]
    InvalidConfig(String),

    #[error("Branch not found: {0}")]
    BranchNotFound(String),
}

pub type Result<T> = std::result::Result<T, VistaError>;
