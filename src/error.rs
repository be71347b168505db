use std::path::PathBuf;

use thiserror::Error;

use crate::lm::bounds::BoundsError;
use crate::model::expression::ExpressionError;

/// Error types for the chainfit-rs library.
#[derive(Error, Debug)]
pub enum FitError {
    /// A data, definition, settings or recipe file could not be opened.
    #[error("File not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    /// A data row did not resolve to a complete measurement record.
    ///
    /// This is the only recoverable variant: the row is skipped and parsing continues.
    #[error("Malformed row {line} in {}: {message}", .path.display())]
    MalformedRow {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// A settings lookup for a key that is not present.
    #[error("Missing configuration key: {0}")]
    MissingConfigurationKey(String),

    /// A settings value that could not be interpreted as the requested type.
    #[error("Invalid value for setting {key}: \"{value}\"")]
    InvalidSetting { key: String, value: String },

    /// No complete model definition exists in the catalog for this type/id pair.
    #[error("Model definition not found: {model_type}{model_id}")]
    ModelDefinitionNotFound { model_type: String, model_id: u32 },

    /// A model definition was found but is internally inconsistent.
    #[error("Invalid model definition {model}: {message}")]
    InvalidDefinition { model: String, message: String },

    /// The formula could not be parsed or evaluated.
    #[error("Formula error: {0}")]
    Expression(#[from] ExpressionError),

    /// A parameter value is incompatible with its limits.
    #[error("Parameter bounds error: {0}")]
    Bounds(#[from] BoundsError),

    /// The global covariance matrix could not be inverted.
    #[error("Singular covariance matrix: {0}")]
    SingularCovariance(String),

    /// The minimizer returned a non-zero error flag.
    #[error("Minimizer did not converge (flag {flag}): {message}")]
    MinimizerNonConvergence { flag: i32, message: String },

    /// Error indicating a mismatch in vector or matrix dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Error during objective or model evaluation.
    #[error("Function evaluation error: {0}")]
    FunctionEvaluation(String),

    /// An operation was requested in the wrong fit state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FitError {
    /// Whether this error must abort the run before (or instead of) minimization.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FitError::MalformedRow { .. })
    }

    /// Process exit code for the command-line front end.
    ///
    /// `1` is reserved for a fit that ran but did not converge; everything that
    /// stops the run earlier is a configuration/data problem and maps to `2`.
    pub fn exit_code(&self) -> u8 {
        match self {
            FitError::MinimizerNonConvergence { .. } => 1,
            _ => 2,
        }
    }

    /// Convenience constructor used by every file reader.
    pub(crate) fn open(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            FitError::FileNotFound { path }
        } else {
            FitError::Io(err)
        }
    }
}

/// Result type alias for chainfit-rs operations.
pub type Result<T> = std::result::Result<T, FitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FitError::MissingConfigurationKey("UP".to_string());
        assert!(format!("{}", err).contains("UP"));

        let err = FitError::ModelDefinitionNotFound {
            model_type: "NRQY".to_string(),
            model_id: 3,
        };
        assert!(format!("{}", err).contains("NRQY3"));
    }

    #[test]
    fn test_fatal_classification() {
        let row = FitError::MalformedRow {
            path: PathBuf::from("set.txt"),
            line: 4,
            message: "expected 9 fields, found 8".to_string(),
        };
        assert!(!row.is_fatal());
        assert!(FitError::SingularCovariance("pivot 0".to_string()).is_fatal());
    }

    #[test]
    fn test_exit_codes() {
        let err = FitError::MinimizerNonConvergence {
            flag: 4,
            message: "call limit".to_string(),
        };
        assert_eq!(err.exit_code(), 1);
        assert_eq!(FitError::MissingConfigurationKey("UP".into()).exit_code(), 2);
    }

    #[test]
    fn test_open_maps_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        match FitError::open("missing.txt", io_err) {
            FitError::FileNotFound { path } => assert_eq!(path, PathBuf::from("missing.txt")),
            other => panic!("Expected FileNotFound, got {other:?}"),
        }

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(FitError::open("x", io_err), FitError::Io(_)));
    }
}
