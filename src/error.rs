use thiserror::Error;

use crate::ml::ModelFamily;

/// Errors surfaced by the data preparation and modelling pipeline.
///
/// Every variant renders a message that can be shown to an end user as-is.
#[derive(Debug, Error)]
pub enum SalesMlError {
    #[error("Missing required columns: {}", .missing.join(", "))]
    MissingRequiredColumns { missing: Vec<String> },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("No trained model available. Please train models first.")]
    NoActiveModel,

    #[error("Hyperparameter tuning is not supported for '{0}'")]
    UnsupportedTuningTarget(String),

    #[error("Could not decode {path} with any of the encodings: {tried}")]
    UndecodableInput { path: String, tried: String },

    #[error("Feature shape mismatch: expected {expected} columns, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("{0} is not available in this build")]
    FamilyUnavailable(ModelFamily),

    #[error("{family} training failed: {reason}")]
    Training { family: ModelFamily, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Model artifact error: {0}")]
    Artifact(#[from] bincode::Error),
}

impl SalesMlError {
    pub fn training(family: ModelFamily, reason: impl std::fmt::Display) -> Self {
        SalesMlError::Training {
            family,
            reason: reason.to_string(),
        }
    }

    /// Short machine readable kind, used in logs and JSON reports
    pub fn kind(&self) -> &'static str {
        match self {
            SalesMlError::MissingRequiredColumns { .. } => "MissingRequiredColumns",
            SalesMlError::InsufficientData(_) => "InsufficientData",
            SalesMlError::NoActiveModel => "NoActiveModel",
            SalesMlError::UnsupportedTuningTarget(_) => "UnsupportedTuningTarget",
            SalesMlError::UndecodableInput { .. } => "UndecodableInput",
            SalesMlError::ShapeMismatch { .. } => "ShapeMismatch",
            SalesMlError::FamilyUnavailable(_) => "FamilyUnavailable",
            SalesMlError::Training { .. } => "Training",
            SalesMlError::Io(_) => "Io",
            SalesMlError::Csv(_) => "Csv",
            SalesMlError::Artifact(_) => "Artifact",
        }
    }
}

pub type Result<T> = std::result::Result<T, SalesMlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message() {
        let err = SalesMlError::MissingRequiredColumns {
            missing: vec!["SALES".to_string(), "PRICEEACH".to_string()],
        };
        assert_eq!(err.to_string(), "Missing required columns: SALES, PRICEEACH");
        assert_eq!(err.kind(), "MissingRequiredColumns");
    }

    #[test]
    fn test_training_error_names_family() {
        let err = SalesMlError::training(ModelFamily::RandomForest, "empty matrix");
        assert_eq!(err.to_string(), "Random_Forest training failed: empty matrix");
    }

    #[test]
    fn test_unavailable_family_message() {
        let err = SalesMlError::FamilyUnavailable(ModelFamily::LightGBMLike);
        assert_eq!(err.to_string(), "LightGBM is not available in this build");
        assert_eq!(err.kind(), "FamilyUnavailable");
    }
}
