//! Error handling for the tape assembler
//!
//! Every stage reports failures through [`CompilerError`]. None of the
//! variants is recoverable: the operation that produced one is aborted.
//! Running out of interpreter steps is not an error and never shows up here.

use crate::source_loc::SourceLocation;
use thiserror::Error;

pub type CompilerResult<T> = Result<T, CompilerError>;

/// Main error type that encompasses every phase of compilation and execution
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompilerError {
    /// Unmatched brackets, unterminated diagnostic escapes, stray characters
    #[error("Structural error at {position}: {message}")]
    Structural {
        position: usize,
        message: String,
    },

    /// Unknown opcodes, bad operands, undefined labels, malformed headers
    #[error("Semantic error at {location}: {message}")]
    Semantic {
        location: SourceLocation,
        message: String,
    },

    /// The tape machine misbehaved while running a program
    #[error("Runtime error at instruction {ip}: {message}")]
    Runtime {
        ip: usize,
        message: String,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {message}")]
    IoError { message: String },

    #[error("Internal compiler error: {message}")]
    InternalError { message: String },
}

impl CompilerError {
    /// Create a structural error at a position of the tape program
    pub fn structural(message: impl Into<String>, position: usize) -> Self {
        CompilerError::Structural { position, message: message.into() }
    }

    /// Create a semantic error
    pub fn semantic(message: impl Into<String>, location: SourceLocation) -> Self {
        CompilerError::Semantic { location, message: message.into() }
    }

    /// Create a runtime error
    pub fn runtime(message: impl Into<String>, ip: usize) -> Self {
        CompilerError::Runtime { ip, message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        CompilerError::Config { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CompilerError::InternalError { message: message.into() }
    }

    /// True for errors raised while the program text was being checked
    pub fn is_structural(&self) -> bool {
        matches!(self, CompilerError::Structural { .. })
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for CompilerError {
    fn from(err: std::io::Error) -> Self {
        CompilerError::IoError {
            message: err.to_string(),
        }
    }
}
