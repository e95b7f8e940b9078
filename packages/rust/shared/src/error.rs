//! Error types for PageForge.
//!
//! Library crates use [`PageForgeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all PageForge operations.
#[derive(Debug, thiserror::Error)]
pub enum PageForgeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching remote media.
    #[error("network error: {0}")]
    Network(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Media download, type check, or write failure.
    #[error("media error: {0}")]
    Media(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Tool argument or data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A referenced content item could not be resolved.
    #[error("not found: {message}")]
    NotFound { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PageForgeError>;

impl PageForgeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a not-found error from any displayable message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP-like status code reported to tool callers for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::NotFound { .. } => 404,
            _ => 500,
        }
    }

    /// The bare message, without the category prefix used by `Display`.
    ///
    /// Tool results surface the store's own message, so the prefix is dropped.
    pub fn message(&self) -> String {
        match self {
            Self::Config { message }
            | Self::Validation { message }
            | Self::NotFound { message } => message.clone(),
            Self::Network(m) | Self::Storage(m) | Self::Media(m) => m.clone(),
            Self::Io { .. } => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = PageForgeError::config("missing base_url");
        assert_eq!(err.to_string(), "config error: missing base_url");

        let err = PageForgeError::validation("Missing required fields: content");
        assert!(err.to_string().contains("Missing required fields"));
    }

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(PageForgeError::validation("x").status_code(), 400);
        assert_eq!(PageForgeError::not_found("x").status_code(), 404);
        assert_eq!(PageForgeError::Storage("disk full".into()).status_code(), 500);
    }

    #[test]
    fn message_drops_category_prefix() {
        let err = PageForgeError::Storage("UNIQUE constraint failed".into());
        assert_eq!(err.message(), "UNIQUE constraint failed");
    }
}
