//! Error types for mail-digest.
//!
//! Only run-level failures live here. A single malformed message is never an
//! error; the retrieval pipeline reports it as a skipped outcome instead.

use std::path::PathBuf;

/// Top-level error type for one digest run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IMAP error: {0}")]
    Imap(#[from] ImapError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("Mailbox task failed: {0}")]
    Task(String),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse YAML config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml_bw::Error,
    },

    #[error("No account named {0}")]
    UnknownAccount(String),

    #[error("No filter named {filter} for account {account}")]
    UnknownFilter { account: String, filter: String },

    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Mailbox protocol errors. Any of these aborts the whole run.
#[derive(Debug, thiserror::Error)]
pub enum ImapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Invalid server name: {0}")]
    InvalidServerName(String),

    #[error("IMAP connection closed")]
    ConnectionClosed,

    #[error("IMAP login failed on {server}")]
    AuthFailed { server: String },

    #[error("IMAP command {command} failed: {response}")]
    CommandFailed { command: String, response: String },

    #[error("IMAP protocol error: {0}")]
    Protocol(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Errors writing the raw dump or the summary.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type alias for a digest run.
pub type Result<T> = std::result::Result<T, Error>;
