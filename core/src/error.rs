//! Core error types and utilities

use thiserror::Error as ThisError;

/// Core-specific error types
#[derive(ThisError, Debug)]
pub enum Error {
    /// Pipe or handle creation failed because of OS limits. Partial
    /// allocations are rolled back before this surfaces; never retried here.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The OS could not create the child process. Covers child-side
    /// redirection failures too, which reach the parent through the spawn
    /// error channel.
    #[error("Process creation failed: {0}")]
    ProcessCreation(String),

    /// A `ProcessHandle` was used after `release()`.
    #[error("Invalid process handle: {0}")]
    InvalidHandle(String),

    /// The interrupt subscription could not be armed. Fatal at startup.
    #[error("Interrupt setup failed: {0}")]
    InterruptSetup(String),

    /// Waiting on a child process failed.
    #[error("Process wait failed: {0}")]
    ProcessWait(String),

    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Other(String),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Error::ResourceExhausted(_) => "PROC001",
            Error::ProcessCreation(_) => "PROC002",
            Error::InvalidHandle(_) => "PROC003",
            Error::InterruptSetup(_) => "PROC004",
            Error::ProcessWait(_) => "PROC005",
            Error::Initialization(_) => "PROC006",
            Error::Io(_) => "PROC007",
            Error::Other(_) => "PROC999",
        }
    }
}

/// Core-specific result type
pub type Result<T> = std::result::Result<T, Error>;

// Convenience implementations
impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}
