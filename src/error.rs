//! Error types for the page runtime and its controllers

use thiserror::Error;

/// Result type alias for page operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or driving a page
#[derive(Error, Debug)]
pub enum Error {
    /// A fixed element id the controller depends on is absent from the markup
    #[error("Missing page element: #{0}")]
    MissingElement(String),

    /// Page markup could not be turned into a document
    #[error("Failed to parse page markup: {0}")]
    ParseError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The request never produced a response (unreachable host, refused, aborted)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// A response arrived but its body was not the JSON we expected
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Saving a downloaded resource failed
    #[error("Download failed: {0}")]
    DownloadError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::NetworkError(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::ConfigError(format!("bad url: {}", err))
    }
}

/// Client-side validation failures. Reported to the user, never sent anywhere.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a prompt")]
    EmptyPrompt,

    #[error("Please select a model")]
    NoModel,
}
