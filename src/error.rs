//! Error types for the screenshot service

use thiserror::Error;

/// Result type alias for engine and pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing a screenshot
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to launch the browser or open a page
    #[error("Engine initialization failed: {0}")]
    InitializationError(String),

    /// Failed to load the HTML content
    #[error("Failed to load content: {0}")]
    LoadError(String),

    /// Failed to size the viewport or capture the screenshot
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Failed to execute JavaScript
    #[error("Script execution failed: {0}")]
    ScriptError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The request body is not a valid render request
    #[error("Invalid render request: {0}")]
    InvalidRequest(#[from] serde_json::Error),

    /// The wrapper element never became visible
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// A command reached a page or browser that was already closed
    #[error("Browser session is closed")]
    SessionClosed,

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}
