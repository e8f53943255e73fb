//! Error types for podsynth.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PodsynthError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Caller errors (user-correctable, no state mutation)
    #[error("Invalid input: {message}")]
    Input { message: String },

    #[error("Job not found: {job_id}")]
    JobNotFound { job_id: String },

    // Stage errors
    #[error("Transcription failed for {document} page {page}: {message}")]
    Transcription {
        document: String,
        page: usize,
        message: String,
    },

    #[error("Knowledge extraction failed: {message}")]
    Extraction { message: String },

    #[error("Script drafting failed: {message}")]
    Draft { message: String },

    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    #[error("Audio format error: {message}")]
    AudioFormat { message: String },

    // Storage errors
    #[error("Persistence failed: {message}")]
    Persistence { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl PodsynthError {
    /// Whether this error must move the job into the `error` state.
    ///
    /// Input errors are returned to the caller untouched; page- and turn-level
    /// failures are recovered where they happen and never reach this check.
    pub fn is_stage_fatal(&self) -> bool {
        !matches!(
            self,
            PodsynthError::Input { .. } | PodsynthError::JobNotFound { .. }
        )
    }

    pub(crate) fn persistence(err: impl std::fmt::Display) -> Self {
        PodsynthError::Persistence {
            message: err.to_string(),
        }
    }

    pub(crate) fn synthesis(err: impl std::fmt::Display) -> Self {
        PodsynthError::Synthesis {
            message: err.to_string(),
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, PodsynthError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_file_not_found_display() {
        let error = PodsynthError::ConfigFileNotFound {
            path: "/path/to/config.toml".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Configuration file not found at /path/to/config.toml"
        );
    }

    #[test]
    fn test_config_invalid_value_display() {
        let error = PodsynthError::ConfigInvalidValue {
            key: "planner.char_budget".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for planner.char_budget: must be positive"
        );
    }

    #[test]
    fn test_transcription_display_names_page() {
        let error = PodsynthError::Transcription {
            document: "doc-1".to_string(),
            page: 3,
            message: "blurry scan".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Transcription failed for doc-1 page 3: blurry scan"
        );
    }

    #[test]
    fn test_synthesis_display() {
        let error = PodsynthError::synthesis("timed out after 60s");
        assert_eq!(
            error.to_string(),
            "Speech synthesis failed: timed out after 60s"
        );
    }

    #[test]
    fn test_persistence_display() {
        let error = PodsynthError::persistence("disk full");
        assert_eq!(error.to_string(), "Persistence failed: disk full");
    }

    #[test]
    fn test_input_errors_are_not_stage_fatal() {
        let input = PodsynthError::Input {
            message: "no documents".to_string(),
        };
        assert!(!input.is_stage_fatal());

        let missing = PodsynthError::JobNotFound {
            job_id: "job-1".to_string(),
        };
        assert!(!missing.is_stage_fatal());
    }

    #[test]
    fn test_stage_errors_are_fatal() {
        assert!(
            PodsynthError::Extraction {
                message: "x".to_string()
            }
            .is_stage_fatal()
        );
        assert!(
            PodsynthError::Draft {
                message: "x".to_string()
            }
            .is_stage_fatal()
        );
        assert!(PodsynthError::persistence("x").is_stage_fatal());
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: PodsynthError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: PodsynthError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_from_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: PodsynthError = json_error.into();
        assert!(error.to_string().starts_with("JSON error"));
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: PodsynthError = io_error.into();

        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<PodsynthError>();
        assert_sync::<PodsynthError>();
    }
}
