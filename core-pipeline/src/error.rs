use bridge_traits::error::BridgeError;
use core_imaging::ImagingError;
use core_library::LibraryError;
use std::fmt::Display;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Daily image processing limit of {daily_limit} reached")]
    LimitExceeded { username: String, daily_limit: u32 },

    #[error("File name is undefined or empty")]
    EmptyFilename,

    #[error("No files to process")]
    EmptyBatch,

    #[error("{stage} failed: {message}")]
    Upstream { stage: &'static str, message: String },

    #[error("Image processing error: {0}")]
    Imaging(#[from] ImagingError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl PipelineError {
    /// Wrap a collaborator failure with the pipeline stage it happened in.
    pub fn upstream<E: Display>(stage: &'static str) -> impl FnOnce(E) -> Self {
        move |e| PipelineError::Upstream {
            stage,
            message: e.to_string(),
        }
    }

    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, PipelineError::LimitExceeded { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PipelineError::UserNotFound(_))
    }

    /// HTTP status a front end should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::UserNotFound(_) => 404,
            PipelineError::LimitExceeded { .. } => 429,
            PipelineError::EmptyFilename | PipelineError::EmptyBatch => 400,
            PipelineError::Imaging(ImagingError::ModelUnavailable(_)) => 503,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
