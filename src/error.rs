use std::path::PathBuf;

use thiserror::Error;

use crate::boost::BoostError;

/// Errors produced by the recommendation pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or out-of-domain customer input.
    #[error("invalid customer profile: {0}")]
    Validation(String),

    /// A category the fitted encoders never saw during training.
    #[error("unknown category '{value}' for field '{field}' (not present in training data)")]
    UnknownCategory { field: String, value: String },

    /// A model or encoder artifact is missing, corrupt or from another format version.
    #[error("failed to load artifact {}: {reason}", path.display())]
    ArtifactLoad { path: PathBuf, reason: String },

    /// The training table is missing, empty or holds values outside its schema.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Model(#[from] BoostError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("failed to serialize artifact: {0}")]
    ArtifactWrite(#[from] rmp_serde::encode::Error),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn artifact_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::ArtifactLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
