use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibrisError {
    #[error("not initialized: run 'libris init'")]
    NotInitialized,

    #[error("invalid role name '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidRoleName(String),

    #[error("role store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LibrisError>;
