//! Error types for exposure examination and annotation handling.

use thiserror::Error;

use crate::types::Centroid;

/// Main error type for quick-look analysis.
#[derive(Error, Debug)]
pub enum Error {
    /// No centroid was supplied and source detection found nothing usable.
    #[error("failed to find a source in the exposure; provide a centroid manually or use a new image")]
    NoSourceFound,

    /// The requested cutout cannot be made to fit inside the exposure bounds.
    #[error(
        "centroid ({:.1}, {:.1}) with box half-size {half_size} lies outside the exposure",
        .centroid.x,
        .centroid.y
    )]
    Geometry { centroid: Centroid, half_size: usize },

    /// The radial Gaussian fit exhausted its iteration budget.
    #[error("radial Gaussian fit did not converge within {iterations} iterations")]
    FitConvergence { iterations: usize },

    /// Encircled-energy normalization is undefined for this cutout.
    #[error("cumulative flux total {total} is not positive; encircled energy is undefined")]
    DegenerateData { total: f64 },

    /// Mask dimensions do not match the image.
    #[error("mask shape {mask:?} does not match image shape {image:?}")]
    MaskShapeMismatch {
        image: (usize, usize),
        mask: (usize, usize),
    },

    /// An exposure must carry at least one pixel.
    #[error("exposure has no pixels")]
    EmptyExposure,

    /// A filename does not carry a parseable (dayObs, seqNum) key.
    #[error("cannot derive a data id from filename {filename:?}")]
    BadDataId { filename: String },

    /// Annotation store I/O failure.
    #[error("annotation I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Annotation store encoding failure.
    #[error("annotation encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for quick-look operations.
pub type Result<T> = std::result::Result<T, Error>;
