use std::path::PathBuf;

use crate::annotate::draw_detection;
use crate::correspondence::{CornerLayout, Correspondence, OutputSize};
use crate::detection::{Detection, MarkerDetector};
use crate::dictionary::DICT_4X4_50;
use crate::error::{RectifyError, Result};
use crate::geometry::Homography;
use crate::params::DetectorParams;
use crate::transform::Raster;

/// Everything one run of the tool needs
#[derive(Clone, Debug)]
pub struct RectifyOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub size: OutputSize,
    pub layout: CornerLayout,
    pub params: DetectorParams,
    /// Where to write the marker debug view, if anywhere
    pub markers_out: Option<PathBuf>,
}

/// A rectified image and how it was obtained
#[derive(Clone, Debug)]
pub struct Rectified {
    pub image: Raster,
    pub correspondence: Correspondence,
    pub homography: Homography,
}

/// Detect the dictionary-0 markers in `source`
pub fn detect(source: &Raster, params: &DetectorParams) -> Detection {
    let gray = source.to_gray();
    MarkerDetector::new(DICT_4X4_50, params.clone()).detect(&gray)
}

/// Map the layout's markers onto an `size` rectangle and cut it out
pub fn rectify_detected(
    source: &Raster,
    detection: &Detection,
    layout: &CornerLayout,
    size: OutputSize,
) -> Result<Rectified> {
    let correspondence = Correspondence::build(layout, &detection.markers, size)?;

    let homography = Homography::from_correspondences(&correspondence.src, &correspondence.dst)
        .ok_or(RectifyError::DegenerateHomography)?;
    log::debug!("homography {:?}", homography.to_row_major_f32());

    let warped = source.warp(&homography)?;
    let image = warped.crop(size.width, size.height);

    Ok(Rectified {
        image,
        correspondence,
        homography,
    })
}

/// Run the whole tool. Nothing is written to `output` unless every stage
/// succeeds
pub fn run(options: &RectifyOptions) -> Result<Rectified> {
    let source = Raster::load(&options.input)?;
    let (width, height) = source.dimensions();
    log::info!(
        "loaded {:?}: {width}x{height}, {} channels",
        options.input,
        source.channels()
    );

    let params = DetectorParams {
        corner_refinement: true,
        ..options.params.clone()
    };
    let detection = detect(&source, &params);
    log::info!(
        "detected {} markers, {} rejected candidates",
        detection.markers.len(),
        detection.rejected.len()
    );

    if let Some(path) = &options.markers_out {
        draw_detection(&source, &detection).save(path)?;
        log::info!("wrote marker view to {path:?}");
    }

    let rectified = rectify_detected(&source, &detection, &options.layout, options.size)?;
    rectified.image.save(&options.output)?;
    log::info!(
        "wrote {}x{} image to {:?}",
        options.size.width,
        options.size.height,
        options.output
    );

    Ok(rectified)
}
