use std::path::PathBuf;

use thiserror::Error;

use crate::correspondence::CornerRole;
use crate::params::ParamsError;

/// Every way the rectification pipeline can stop early
#[derive(Debug, Error)]
pub enum RectifyError {
    #[error("no arguments supplied")]
    NoArguments,

    #[error("invalid input image {path:?}")]
    InvalidInput {
        path: PathBuf,
        #[source]
        source: Option<image::ImageError>,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid detector parameters in {path:?}")]
    InvalidParams {
        path: PathBuf,
        #[source]
        source: ParamsError,
    },

    #[error("found {found} markers, at least 4 are required")]
    InsufficientMarkers { found: usize },

    #[error("marker {id} for the {corner} corner was not detected")]
    MissingMarker { id: u32, corner: CornerRole },

    #[error("marker centers do not define a usable homography")]
    DegenerateHomography,

    #[error("failed to write {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl RectifyError {
    /// Process exit code reported for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            RectifyError::NoArguments => 1,
            RectifyError::InvalidInput { .. } => 2,
            RectifyError::InvalidArgument(_) | RectifyError::InvalidParams { .. } => 3,
            RectifyError::InsufficientMarkers { .. } => 4,
            RectifyError::MissingMarker { .. } => 5,
            RectifyError::DegenerateHomography => 6,
            RectifyError::Write { .. } => 7,
        }
    }

    /// Failures that exit without a diagnostic on stderr
    pub fn is_silent(&self) -> bool {
        matches!(self, RectifyError::InsufficientMarkers { .. })
    }
}

pub type Result<T> = std::result::Result<T, RectifyError>;
