//! Error taxonomy shared by every pipeline stage.

use serde::{Deserialize, Serialize};

/// Errors produced by detection and analysis.
///
/// Parameter and decode errors are raised before any detection work starts.
/// `CalibrationReferenceNotFound` is never returned from the pipeline itself:
/// it is recorded in [`crate::AnalysisResult::calibration_error`] while the
/// analysis continues in pixel units.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisError {
    /// Pixel buffer is malformed or inconsistent with its declared geometry.
    #[error("image decode failure: {reason}")]
    ImageDecodeFailure {
        /// Human-readable description of the inconsistency.
        reason: String,
    },
    /// A detection or analysis parameter is outside its valid range.
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameterRange {
        /// Name of the offending field.
        field: String,
        /// Constraint that was violated.
        reason: String,
    },
    /// No measurable particle remained after filtering and reference exclusion.
    #[error("no measurable particles detected")]
    NoCircleDetected,
    /// No detected circle qualifies as an unambiguous calibration reference.
    #[error("calibration reference not found: {reason}")]
    CalibrationReferenceNotFound {
        /// Why selection failed.
        reason: String,
    },
    /// Cooperative cancellation was observed mid-scan.
    #[error("analysis cancelled")]
    Cancelled,
    /// Parameter file could not be read or parsed.
    #[error("configuration error: {reason}")]
    Config {
        /// Underlying IO or JSON failure.
        reason: String,
    },
}

/// Corrective action a caller should suggest for a given failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    /// Grounds were not found: take a new photograph.
    RetakePhoto,
    /// Scale is unknown: place a reference coin or disc in the frame.
    AddReferenceObject,
    /// Input buffer or parameters are unusable: fix capture settings.
    FixCaptureSettings,
    /// Nothing to do (for example, the caller cancelled).
    None,
}

impl AnalysisError {
    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        Self::ImageDecodeFailure {
            reason: reason.into(),
        }
    }

    pub(crate) fn param(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameterRange {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn no_reference(reason: impl Into<String>) -> Self {
        Self::CalibrationReferenceNotFound {
            reason: reason.into(),
        }
    }

    /// Returns `true` when the invocation cannot produce any result.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::CalibrationReferenceNotFound { .. })
    }

    /// Map the failure onto the user-facing corrective action.
    pub fn user_action(&self) -> UserAction {
        match self {
            Self::NoCircleDetected => UserAction::RetakePhoto,
            Self::CalibrationReferenceNotFound { .. } => UserAction::AddReferenceObject,
            Self::ImageDecodeFailure { .. }
            | Self::InvalidParameterRange { .. }
            | Self::Config { .. } => UserAction::FixCaptureSettings,
            Self::Cancelled => UserAction::None,
        }
    }
}

impl From<std::io::Error> for AnalysisError {
    fn from(e: std::io::Error) -> Self {
        Self::Config {
            reason: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config {
            reason: e.to_string(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AnalysisError>;
