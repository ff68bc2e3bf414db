// src/error.rs

use thiserror::Error;

/// Core error types for Formulary
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database initialization error
    #[error("Failed to initialize database: {0}")]
    InitError(String),

    /// Database not found
    #[error("Database not found at path: {0}")]
    DatabaseNotFound(String),

    /// Formula declaration is invalid or lacks a required field
    #[error("Malformed formula: {0}")]
    MalformedFormula(String),

    /// No formula with this name is known
    #[error("Formula not found: {0}")]
    FormulaNotFound(String),

    /// Dependency closure contains a cycle
    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// Source could not be fetched
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Fetched archive does not match the declared checksum
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Archive kind cannot be extracted
    #[error("Unsupported archive: {0}")]
    UnsupportedArchive(String),

    /// Archive kind is supported but its content could not be unpacked
    #[error("Failed to extract archive: {0}")]
    ExtractFailed(String),

    /// An install step exited non-zero
    #[error("Install step {step} failed with exit status {status}{}", format_output(.output))]
    InstallFailed {
        step: usize,
        status: i32,
        output: String,
    },

    /// A test step exited non-zero
    #[error("Test step {step} failed with exit status {status}{}", format_output(.output))]
    TestFailed {
        step: usize,
        status: i32,
        output: String,
    },

    /// A step exceeded its wall-clock deadline and was killed
    #[error("Step {step} timed out after {limit:?}")]
    Timeout {
        step: usize,
        limit: std::time::Duration,
    },

    /// Formula is not recorded as installed
    #[error("Formula '{0}' is not installed")]
    NotInstalled(String),
}

impl Error {
    /// Process exit code for this error
    ///
    /// Step failures surface the child's own exit status so callers can
    /// tell `make` failing with 2 from a checksum problem.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InstallFailed { status, .. } | Error::TestFailed { status, .. } if *status > 0 => {
                *status
            }
            _ => 1,
        }
    }
}

fn format_output(output: &str) -> String {
    if output.trim().is_empty() {
        String::new()
    } else {
        format!("\n{}", output.trim_end())
    }
}

/// Result type alias using Formulary's Error type
pub type Result<T> = std::result::Result<T, Error>;
