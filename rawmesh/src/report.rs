//! Load diagnostics

use crate::readers::MeshFormat;

/// Outcome of a successful load
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    /// Format the asset was read as
    pub format: MeshFormat,
    /// Recoverable anomalies, in the order they were logged
    pub warnings: Vec<String>,
}

impl LoadReport {
    /// Whether any warning was logged during the load
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Collects warnings for one load while forwarding them to `tracing`
#[derive(Debug)]
pub struct ImportLog {
    stream: String,
    warnings: Vec<String>,
}

impl ImportLog {
    pub fn new(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            warnings: Vec::new(),
        }
    }

    /// Name of the stream being loaded
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Log a recoverable anomaly
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(stream = %self.stream, "{}", message);
        self.warnings.push(message);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub(crate) fn into_report(self, format: MeshFormat) -> LoadReport {
        LoadReport {
            format,
            warnings: self.warnings,
        }
    }
}
