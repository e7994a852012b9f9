pub mod annotate;
pub mod cli;
pub mod compose;
pub mod correspondence;
pub mod detection;
pub mod dictionary;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod params;
pub mod pipeline;
mod threshold;
pub mod transform;

pub use cli::Cli;
pub use compose::overlay;
pub use correspondence::{
    center_of_id, find_center, CornerLayout, CornerRole, Correspondence, OutputSize,
};
pub use detection::{detect_markers, Detection, MarkerDetector, MarkerObservation};
pub use dictionary::{Dictionary, DICT_4X4_50};
pub use error::RectifyError;
pub use geometry::Homography;
pub use params::{DetectorParams, ParamsError};
pub use pipeline::{rectify_detected, run, RectifyOptions, Rectified};
pub use transform::Raster;
