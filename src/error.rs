//! Typed errors for the analysis and publication surface.
//!
//! Engine noise (unreadable overlay text, low-quality detections) is never an
//! error: it shows up as absent fields. These types cover the failures that
//! must reach the caller with enough detail to render a specific message.

use thiserror::Error;

/// A manual edit or camera payload was rejected before any write happened.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
    },

    #[error("camera {0} does not exist")]
    UnknownCamera(i64),

    #[error("camera name {0:?} is invalid: use letters and digits with optional - or _, e.g. TRAILCAM05")]
    InvalidCameraName(String),

    #[error("camera name {0:?} is already in use")]
    DuplicateCameraName(String),

    #[error("description must be 255 characters or fewer")]
    DescriptionTooLong,

    #[error("camera {0} not found")]
    CameraNotFound(i64),

    #[error("photograph {0} not found")]
    PhotoNotFound(i64),

    #[error("photograph {0} is published; unpublish before editing")]
    Published(i64),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Analysis of a photograph could not run. A failed run leaves the
/// photograph's existing metadata untouched.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("photograph {0} not found")]
    NotFound(i64),

    #[error("photograph {0} is published; unpublish before re-analysis")]
    NotStaging(i64),

    #[error("recognition engine unavailable: {0}")]
    RecognitionUnavailable(String),

    #[error("could not decode image {path}: {reason}")]
    ImageDecode { path: String, reason: String },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// A publication state transition was rejected or failed. Rejections leave
/// the photograph exactly as it was.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("photograph {0} not found")]
    NotFound(i64),

    #[error("photograph {0} is already published")]
    AlreadyPublished(i64),

    #[error("photograph {0} is not published")]
    NotPublished(i64),

    #[error("cannot publish: {0} has not been set")]
    MissingField(&'static str),

    #[error("invalid edit: {0}")]
    InvalidEdit(#[from] EditError),

    #[error("could not decode image {path}: {reason}")]
    ImageDecode { path: String, reason: String },

    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),
}
