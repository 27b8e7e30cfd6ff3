//! Load error taxonomy

use std::io;

/// Reason a load was aborted
///
/// Every variant carries the name of the stream being loaded and the same
/// message that was written to the log.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Source file does not exist
    #[error("{name}: file not found")]
    NotFound { name: String },

    /// File extension or container is not one of the supported formats
    #[error("{name}: unsupported format: {message}")]
    UnsupportedFormat { name: String, message: String },

    /// Structural failure inside the container (invalid JSON, FBX tree, ...)
    #[error("{name}: parse error: {message}")]
    Parse { name: String, message: String },

    /// Container parsed but violates the format's rules (e.g. buffer load failure)
    #[error("{name}: validation error: {message}")]
    Validation { name: String, message: String },

    /// Stream could not be read
    #[error("{name}: I/O error: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl LoadError {
    pub(crate) fn unsupported(name: &str, message: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn parse(name: &str, message: impl Into<String>) -> Self {
        Self::Parse {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn validation(name: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn io(name: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            return Self::NotFound {
                name: name.to_string(),
            };
        }
        Self::Io {
            name: name.to_string(),
            source,
        }
    }

    /// Name of the stream the error refers to
    pub fn stream_name(&self) -> &str {
        match self {
            Self::NotFound { name }
            | Self::UnsupportedFormat { name, .. }
            | Self::Parse { name, .. }
            | Self::Validation { name, .. }
            | Self::Io { name, .. } => name,
        }
    }
}
