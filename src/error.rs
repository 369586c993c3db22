//! Error types for the host and its engine collaborator

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that end the host process
///
/// Everything here is fatal: startup failures and a dead output transport.
/// Runtime command problems never become a `HostError`.
#[derive(Error, Debug)]
pub enum HostError {
    /// Side channel could not be created or opened
    #[error("Failed to open command pipe {path}: {source}")]
    ChannelOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Engine refused to initialize
    #[error("Engine initialization failed: {0}")]
    EngineInit(#[source] EngineError),

    /// Script given on the command line did not compile
    #[error("Failed to compile file: {path}: {source}")]
    ScriptCompile {
        path: PathBuf,
        #[source]
        source: EngineError,
    },

    /// Output transport rejected a block
    #[error("Failed to write audio block: {0}")]
    Output(#[source] io::Error),

    /// Invalid host configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Errors reported by an engine implementation
#[derive(Error, Debug)]
pub enum EngineError {
    /// Source text was rejected by the compiler
    #[error("{name}:{line}: {message}")]
    Compile {
        name: String,
        line: usize,
        message: String,
    },

    /// Script file could not be read
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Engine parameters were unusable
    #[error("{0}")]
    Init(String),
}

/// Errors from parsing a caller-supplied unit id
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdParseError {
    #[error("empty id")]
    Empty,

    #[error("invalid unit id: {0}")]
    Invalid(String),
}

/// Result type for host operations
pub type HostResult<T> = Result<T, HostError>;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
