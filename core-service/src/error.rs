use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Pipeline(#[from] core_pipeline::PipelineError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Imaging error: {0}")]
    Imaging(#[from] core_imaging::ImagingError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),
}

impl CoreError {
    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, CoreError::Pipeline(e) if e.is_limit_exceeded())
    }

    /// HTTP status a front end should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::UserNotFound(_) => 404,
            CoreError::InvalidInput(_) => 400,
            CoreError::Library(core_library::LibraryError::AlreadyExists { .. }) => 409,
            CoreError::Library(core_library::LibraryError::InvalidInput { .. }) => 400,
            CoreError::Imaging(core_imaging::ImagingError::ModelUnavailable(_)) => 503,
            CoreError::Pipeline(e) => e.status_code(),
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
