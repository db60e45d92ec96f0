//! Error types for dataset generation operations

use thiserror::Error;

/// Result type alias for dataset generation operations
pub type Result<T> = std::result::Result<T, DatagenError>;

/// Error types covering catalog lookups, planning, external tool
/// invocation, and image processing
#[derive(Error, Debug)]
pub enum DatagenError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image format or processing errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Unknown layer, projection, or resolution
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// External translator tool failures
    #[error("Tool error: {0}")]
    Tool(String),

    /// Segmentation failures (degenerate inputs, empty clusters)
    #[error("Segmentation error: {0}")]
    Segmentation(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DatagenError {
    /// Create a new catalog error
    pub fn catalog<S: Into<String>>(msg: S) -> Self {
        Self::Catalog(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new tool invocation error
    pub fn tool<S: Into<String>>(msg: S) -> Self {
        Self::Tool(msg.into())
    }

    /// Create a new segmentation error
    pub fn segmentation<S: Into<String>>(msg: S) -> Self {
        Self::Segmentation(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create a tool error carrying the exit status and a stderr excerpt
    pub fn tool_failure(command: &str, status: Option<i32>, stderr: &str) -> Self {
        let excerpt: String = stderr.chars().take(400).collect();
        match status {
            Some(code) => Self::Tool(format!(
                "'{}' exited with status {}: {}",
                command,
                code,
                excerpt.trim()
            )),
            None => Self::Tool(format!(
                "'{}' terminated by signal: {}",
                command,
                excerpt.trim()
            )),
        }
    }
}
