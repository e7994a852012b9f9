use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{RectifyError, Result};

/// Largest adaptive threshold window
pub const MAX_THRESHOLD_WINDOW: u32 = 255;
/// Largest marker border, in cells
pub const MAX_BORDER_BITS: u32 = 4;
/// Largest sampling resolution per marker cell
pub const MAX_PIXELS_PER_CELL: u32 = 64;
/// Largest corner refinement half-window
pub const MAX_REFINEMENT_WINDOW: u32 = 32;
/// Largest corner refinement iteration count
pub const MAX_REFINEMENT_ITERATIONS: u32 = 1000;

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{field} must be {requirement}")]
    OutOfRange {
        field: &'static str,
        requirement: String,
    },
}

fn out_of_range(field: &'static str, requirement: impl Into<String>) -> ParamsError {
    ParamsError::OutOfRange {
        field,
        requirement: requirement.into(),
    }
}

/// Tuning knobs of the marker detector
///
/// Field names and defaults follow the OpenCV ArUco detector so existing
/// parameter sets translate one to one
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorParams {
    pub adaptive_thresh_win_size_min: u32,
    pub adaptive_thresh_win_size_max: u32,
    pub adaptive_thresh_win_size_step: u32,
    pub adaptive_thresh_constant: f64,
    pub min_marker_perimeter_rate: f64,
    pub max_marker_perimeter_rate: f64,
    pub polygonal_approx_accuracy_rate: f64,
    pub min_corner_distance_rate: f64,
    pub min_distance_to_border: u32,
    pub min_marker_distance_rate: f64,
    pub corner_refinement: bool,
    pub corner_refinement_win_size: u32,
    pub corner_refinement_max_iterations: u32,
    pub corner_refinement_min_accuracy: f64,
    pub marker_border_bits: u32,
    pub perspective_remove_pixel_per_cell: u32,
    pub perspective_remove_ignored_margin_per_cell: f64,
    pub max_erroneous_bits_in_border_rate: f64,
    pub min_otsu_std_dev: f64,
    pub error_correction_rate: f64,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            adaptive_thresh_win_size_min: 3,
            adaptive_thresh_win_size_max: 23,
            adaptive_thresh_win_size_step: 10,
            adaptive_thresh_constant: 7.0,
            min_marker_perimeter_rate: 0.03,
            max_marker_perimeter_rate: 4.0,
            polygonal_approx_accuracy_rate: 0.03,
            min_corner_distance_rate: 0.05,
            min_distance_to_border: 3,
            min_marker_distance_rate: 0.05,
            corner_refinement: false,
            corner_refinement_win_size: 5,
            corner_refinement_max_iterations: 30,
            corner_refinement_min_accuracy: 0.1,
            marker_border_bits: 1,
            perspective_remove_pixel_per_cell: 4,
            perspective_remove_ignored_margin_per_cell: 0.13,
            max_erroneous_bits_in_border_rate: 0.35,
            min_otsu_std_dev: 5.0,
            error_correction_rate: 0.6,
        }
    }
}

impl DetectorParams {
    /// Read and validate a JSON parameter file. Missing fields keep defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let load = || -> std::result::Result<Self, ParamsError> {
            let text = std::fs::read_to_string(path)?;
            Self::from_json(&text)
        };
        load().map_err(|source| RectifyError::InvalidParams {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(text: &str) -> std::result::Result<Self, ParamsError> {
        let params: Self = serde_json::from_str(text)?;
        params.validate()?;
        Ok(params)
    }

    /// Adaptive threshold window sizes to try, smallest first
    pub fn window_sizes(&self) -> Vec<u32> {
        let step = self.adaptive_thresh_win_size_step.max(1) as usize;
        (self.adaptive_thresh_win_size_min..=self.adaptive_thresh_win_size_max)
            .step_by(step)
            .collect()
    }

    pub fn validate(&self) -> std::result::Result<(), ParamsError> {
        if self.adaptive_thresh_win_size_min < 3 {
            return Err(out_of_range("adaptive_thresh_win_size_min", "at least 3"));
        }
        if self.adaptive_thresh_win_size_max < self.adaptive_thresh_win_size_min {
            return Err(out_of_range(
                "adaptive_thresh_win_size_max",
                "at least adaptive_thresh_win_size_min",
            ));
        }
        if self.adaptive_thresh_win_size_max > MAX_THRESHOLD_WINDOW {
            return Err(out_of_range(
                "adaptive_thresh_win_size_max",
                format!("at most {MAX_THRESHOLD_WINDOW}"),
            ));
        }
        if self.adaptive_thresh_win_size_step == 0 {
            return Err(out_of_range("adaptive_thresh_win_size_step", "positive"));
        }
        if !(self.min_marker_perimeter_rate > 0.0
            && self.max_marker_perimeter_rate > self.min_marker_perimeter_rate)
        {
            return Err(out_of_range(
                "max_marker_perimeter_rate",
                "above min_marker_perimeter_rate, which must be positive",
            ));
        }
        for (name, v) in [
            ("polygonal_approx_accuracy_rate", self.polygonal_approx_accuracy_rate),
            ("min_corner_distance_rate", self.min_corner_distance_rate),
            ("min_marker_distance_rate", self.min_marker_distance_rate),
        ] {
            if !(v > 0.0) {
                return Err(out_of_range(name, "positive"));
            }
        }
        if !(1..=MAX_REFINEMENT_WINDOW).contains(&self.corner_refinement_win_size) {
            return Err(out_of_range(
                "corner_refinement_win_size",
                format!("in 1..={MAX_REFINEMENT_WINDOW}"),
            ));
        }
        if !(1..=MAX_REFINEMENT_ITERATIONS).contains(&self.corner_refinement_max_iterations) {
            return Err(out_of_range(
                "corner_refinement_max_iterations",
                format!("in 1..={MAX_REFINEMENT_ITERATIONS}"),
            ));
        }
        if !(1..=MAX_PIXELS_PER_CELL).contains(&self.perspective_remove_pixel_per_cell) {
            return Err(out_of_range(
                "perspective_remove_pixel_per_cell",
                format!("in 1..={MAX_PIXELS_PER_CELL}"),
            ));
        }
        if !(0.0..0.5).contains(&self.perspective_remove_ignored_margin_per_cell) {
            return Err(out_of_range(
                "perspective_remove_ignored_margin_per_cell",
                "in [0, 0.5)",
            ));
        }
        if !(1..=MAX_BORDER_BITS).contains(&self.marker_border_bits) {
            return Err(out_of_range(
                "marker_border_bits",
                format!("in 1..={MAX_BORDER_BITS}"),
            ));
        }
        if !(0.0..=1.0).contains(&self.error_correction_rate) {
            return Err(out_of_range("error_correction_rate", "in [0, 1]"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let p = DetectorParams::default();
        assert!(p.validate().is_ok());
        assert_eq!(p.window_sizes(), vec![3, 13, 23]);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let p = DetectorParams::from_json(r#"{ "adaptive_thresh_constant": 9.5 }"#).unwrap();
        assert_eq!(p.adaptive_thresh_constant, 9.5);
        assert_eq!(p.min_distance_to_border, 3);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = DetectorParams::from_json(r#"{ "doCornerRefinement": true }"#).unwrap_err();
        assert!(matches!(err, ParamsError::Json(_)));
        assert!(err.to_string().contains("doCornerRefinement"));
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        assert!(DetectorParams::from_json(r#"{ "adaptive_thresh_win_size_min": 1 }"#).is_err());
        assert!(DetectorParams::from_json(r#"{ "adaptive_thresh_win_size_step": 0 }"#).is_err());
        assert!(DetectorParams::from_json(r#"{ "error_correction_rate": 1.5 }"#).is_err());
        assert!(DetectorParams::from_json(
            r#"{ "min_marker_perimeter_rate": 2.0, "max_marker_perimeter_rate": 1.0 }"#
        )
        .is_err());
    }

    #[test]
    fn test_from_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = DetectorParams::from_file(file.path()).unwrap_err();
        assert_eq!(err.exit_code(), 3);

        let missing = DetectorParams::from_file(Path::new("/nonexistent/params.json"));
        match missing {
            Err(RectifyError::InvalidParams { path, source }) => {
                assert_eq!(path, Path::new("/nonexistent/params.json"));
                assert!(matches!(source, ParamsError::Io(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_single_window_when_min_equals_max() {
        let p = DetectorParams {
            adaptive_thresh_win_size_min: 7,
            adaptive_thresh_win_size_max: 7,
            ..Default::default()
        };
        assert_eq!(p.window_sizes(), vec![7]);
    }

    fn rejected_field(json: &str) -> &'static str {
        match DetectorParams::from_json(json) {
            Err(ParamsError::OutOfRange { field, .. }) => field,
            other => panic!("{json} was not rejected by range: {other:?}"),
        }
    }

    #[test]
    fn test_threshold_window_is_bounded() {
        assert_eq!(
            rejected_field(
                r#"{ "adaptive_thresh_win_size_max": 4294967295, "adaptive_thresh_win_size_step": 1 }"#
            ),
            "adaptive_thresh_win_size_max"
        );
        let widest = DetectorParams::from_json(
            r#"{ "adaptive_thresh_win_size_min": 255, "adaptive_thresh_win_size_max": 255 }"#,
        )
        .unwrap();
        assert_eq!(widest.window_sizes(), vec![255]);
    }

    #[test]
    fn test_border_bits_are_bounded() {
        assert_eq!(
            rejected_field(r#"{ "marker_border_bits": 5 }"#),
            "marker_border_bits"
        );
        assert!(DetectorParams::from_json(r#"{ "marker_border_bits": 4 }"#).is_ok());
    }

    #[test]
    fn test_pixels_per_cell_are_bounded() {
        assert_eq!(
            rejected_field(r#"{ "perspective_remove_pixel_per_cell": 65 }"#),
            "perspective_remove_pixel_per_cell"
        );
        assert_eq!(
            rejected_field(r#"{ "perspective_remove_pixel_per_cell": 4000000000 }"#),
            "perspective_remove_pixel_per_cell"
        );
        assert!(DetectorParams::from_json(r#"{ "perspective_remove_pixel_per_cell": 64 }"#).is_ok());
    }

    #[test]
    fn test_refinement_is_bounded() {
        assert_eq!(
            rejected_field(r#"{ "corner_refinement_win_size": 33 }"#),
            "corner_refinement_win_size"
        );
        assert_eq!(
            rejected_field(r#"{ "corner_refinement_max_iterations": 4294967295 }"#),
            "corner_refinement_max_iterations"
        );
        assert!(DetectorParams::from_json(r#"{ "corner_refinement_win_size": 32 }"#).is_ok());
    }

    #[test]
    fn test_file_error_keeps_source_chain() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "marker_border_bits": 9 }}"#).unwrap();
        let err = DetectorParams::from_file(file.path()).unwrap_err();
        let source = std::error::Error::source(&err).expect("params error attached");
        assert!(source.to_string().contains("marker_border_bits"));
    }
}
