use thiserror::Error;

/// Unified error type for relkit operations
#[derive(Error, Debug)]
pub enum CiError {
    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Version error: {0}")]
    Version(String),

    #[error("Release error: {0}")]
    Release(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Docs error: {0}")]
    Docs(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("GitHub API error: {0}")]
    GitHub(String),

    #[error("Database driver error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in relkit
pub type Result<T> = std::result::Result<T, CiError>;

impl CiError {
    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        CiError::Config(msg.into())
    }

    /// Create a version error with context
    pub fn version(msg: impl Into<String>) -> Self {
        CiError::Version(msg.into())
    }

    /// Create a release precondition error
    pub fn release(msg: impl Into<String>) -> Self {
        CiError::Release(msg.into())
    }

    /// Create an external command error
    pub fn command(msg: impl Into<String>) -> Self {
        CiError::Command(msg.into())
    }

    pub fn docs(msg: impl Into<String>) -> Self {
        CiError::Docs(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        CiError::Database(msg.into())
    }

    pub fn github(msg: impl Into<String>) -> Self {
        CiError::GitHub(msg.into())
    }
}
