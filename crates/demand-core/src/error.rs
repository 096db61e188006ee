use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the ride-demand pipeline.
#[derive(Error, Debug)]
pub enum DemandError {
    /// The ingestion source file does not exist.
    #[error("Source file not found: {0}")]
    SourceNotFound(PathBuf),

    /// A stage's required input artifact is absent.
    #[error("Missing prerequisite {artifact}: run the `{producer}` stage first")]
    MissingPrerequisite { artifact: String, producer: String },

    /// An ingestion chunk lacks one or more of the expected columns.
    #[error("Chunk {index} is missing expected columns: {}", .missing.join(", "))]
    MalformedChunk { index: usize, missing: Vec<String> },

    /// A stage's input has no usable rows.
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    /// An output file could not be written.
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A delimited file could not be read or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The structured store rejected an operation.
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// A model artifact could not be (de)serialized.
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The forecaster's least-squares system could not be solved.
    #[error("Model fit failed: {0}")]
    ModelFit(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DemandError {
    /// Shorthand for [`DemandError::MissingPrerequisite`].
    pub fn missing(artifact: impl Into<String>, producer: impl Into<String>) -> Self {
        Self::MissingPrerequisite {
            artifact: artifact.into(),
            producer: producer.into(),
        }
    }

    /// `true` for errors a stage may log and continue past.
    ///
    /// Only a malformed ingestion chunk qualifies.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MalformedChunk { .. })
    }
}

/// Convenience alias used throughout the demand crates.
pub type Result<T> = std::result::Result<T, DemandError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_source_not_found() {
        let err = DemandError::SourceNotFound(PathBuf::from("data/uber_data.csv"));
        assert_eq!(err.to_string(), "Source file not found: data/uber_data.csv");
    }

    #[test]
    fn test_error_display_missing_prerequisite() {
        let err = DemandError::missing("cleaned dataset data/cleaned.csv", "clean");
        let msg = err.to_string();
        assert!(msg.contains("data/cleaned.csv"));
        assert!(msg.contains("`clean`"));
    }

    #[test]
    fn test_error_display_malformed_chunk() {
        let err = DemandError::MalformedChunk {
            index: 3,
            missing: vec!["passenger_count".to_string(), "trip_duration".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Chunk 3 is missing expected columns: passenger_count, trip_duration"
        );
    }

    #[test]
    fn test_error_display_degenerate_input() {
        let err = DemandError::DegenerateInput("no rows survived cleaning".to_string());
        assert_eq!(err.to_string(), "Degenerate input: no rows survived cleaning");
    }

    #[test]
    fn test_error_display_file_write() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = DemandError::FileWrite {
            path: PathBuf::from("/readonly/out.csv"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to write file"));
        assert!(msg.contains("/readonly/out.csv"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_error_display_config() {
        let err = DemandError::Config("chunk size must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: chunk size must be positive"
        );
    }

    #[test]
    fn test_only_malformed_chunk_is_recoverable() {
        let chunk = DemandError::MalformedChunk {
            index: 1,
            missing: vec!["passenger_count".to_string()],
        };
        assert!(chunk.is_recoverable());
        assert!(!DemandError::DegenerateInput("x".to_string()).is_recoverable());
        assert!(!DemandError::missing("a", "b").is_recoverable());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: DemandError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: DemandError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
