//! Error types for template discovery and template instantiation.
//!
//! Discovery problems ([`TemplateError`]) are local: they are logged and the
//! registry degrades to fewer or staler templates. Creation problems
//! ([`CreateError`]) are returned to the caller of
//! [`Registry::create_file`](crate::Registry::create_file).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::mime::MimeType;

/// Errors raised while discovering and resolving template entries.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Could not determine MIME type of template {path}")]
    MimeUnresolved { path: PathBuf },

    #[error("Problem loading template {path}: {reason}")]
    MalformedDesktopEntry { path: PathBuf, reason: String },

    #[error("File monitor cannot be created for {path}: {reason}")]
    WatchUnavailable { path: PathBuf, reason: String },
}

/// Errors from [`Registry::create_file`](crate::Registry::create_file).
#[derive(Error, Debug)]
pub enum CreateError {
    #[error("No default application is set for MIME type {mime_type}")]
    NoHandler { mime_type: MimeType },

    #[error("Invalid template command '{command}': {reason}")]
    InvalidCommand { command: String, reason: String },

    #[error("Failed to copy template {source_path} to {destination}: {cause}")]
    CopyFailed {
        source_path: PathBuf,
        destination: PathBuf,
        cause: io::Error,
    },

    #[error("Failed to launch application: {reason}")]
    LaunchFailed { reason: String },
}

/// Result type for template creation.
pub type CreateResult<T> = Result<T, CreateError>;

/// Errors from loading or saving [`Settings`](crate::Settings).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
