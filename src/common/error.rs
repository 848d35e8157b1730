use thiserror::Error;

/// Structural failures. Field-level data defects never surface here; they are
/// resolved to sentinels inside the engines and counted in the run outcome.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to read relation '{relation}': {message}")]
    StoreRead { relation: String, message: String },

    #[error("Failed to write relation '{relation}': {message}")]
    StoreWrite { relation: String, message: String },

    #[error("Schema mismatch in relation '{relation}': {message}")]
    SchemaMismatch { relation: String, message: String },

    #[error("Relation '{0}' has never been published to this store")]
    MissingRelation(String),

    #[error("No conformer registered for relation: {0}")]
    UnknownRelation(String),

    #[error("Another run is already writing to store '{0}'")]
    RunInProgress(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PipelineError {
    pub fn read(relation: &str, message: impl ToString) -> Self {
        PipelineError::StoreRead {
            relation: relation.to_string(),
            message: message.to_string(),
        }
    }

    pub fn write(relation: &str, message: impl ToString) -> Self {
        PipelineError::StoreWrite {
            relation: relation.to_string(),
            message: message.to_string(),
        }
    }

    pub fn schema(relation: &str, message: impl ToString) -> Self {
        PipelineError::SchemaMismatch {
            relation: relation.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
