use std::fmt;

use nalgebra::Point2;

use crate::detection::MarkerObservation;
use crate::error::{RectifyError, Result};

/// Role a marker plays on the physical surface
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CornerRole {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl CornerRole {
    /// Order in which correspondences are built
    pub const ALL: [CornerRole; 4] = [
        CornerRole::TopLeft,
        CornerRole::TopRight,
        CornerRole::BottomLeft,
        CornerRole::BottomRight,
    ];
}

impl fmt::Display for CornerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CornerRole::TopLeft => "top-left",
            CornerRole::TopRight => "top-right",
            CornerRole::BottomLeft => "bottom-left",
            CornerRole::BottomRight => "bottom-right",
        };
        f.write_str(name)
    }
}

/// Which marker id sits at which corner of the surface
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CornerLayout {
    pub top_left: u32,
    pub top_right: u32,
    pub bottom_left: u32,
    pub bottom_right: u32,
}

impl Default for CornerLayout {
    /// The printed marker sheet: 2 top-left, 0 top-right, 3 bottom-left,
    /// 1 bottom-right
    fn default() -> Self {
        Self {
            top_left: 2,
            top_right: 0,
            bottom_left: 3,
            bottom_right: 1,
        }
    }
}

impl CornerLayout {
    pub fn marker_for(&self, role: CornerRole) -> u32 {
        match role {
            CornerRole::TopLeft => self.top_left,
            CornerRole::TopRight => self.top_right,
            CornerRole::BottomLeft => self.bottom_left,
            CornerRole::BottomRight => self.bottom_right,
        }
    }
}

/// Requested output resolution
///
/// Both sides must be at least 2. With a 1-pixel side the destination
/// corners collapse and no homography exists
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputSize {
    pub width: u32,
    pub height: u32,
}

impl OutputSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Destination corners in [`CornerRole::ALL`] order
    pub fn corners(&self) -> [Point2<f32>; 4] {
        let right = self.width.saturating_sub(1) as f32;
        let bottom = self.height.saturating_sub(1) as f32;
        [
            Point2::new(0.0, 0.0),
            Point2::new(right, 0.0),
            Point2::new(0.0, bottom),
            Point2::new(right, bottom),
        ]
    }
}

/// Center of the last observation carrying `id`
///
/// Corner coordinates are truncated to integers before averaging and the
/// mean is rounded to the nearest integer (ties to even)
pub fn find_center(id: u32, observations: &[MarkerObservation]) -> Option<Point2<f32>> {
    let found = observations.iter().rev().find(|o| o.id == id)?;

    let (mut sx, mut sy) = (0i64, 0i64);
    for c in &found.corners {
        sx += c.x as i64;
        sy += c.y as i64;
    }
    Some(Point2::new(
        (sx as f64 / 4.0).round_ties_even() as f32,
        (sy as f64 / 4.0).round_ties_even() as f32,
    ))
}

/// Like [`find_center`], but an absent marker yields the origin
///
/// The origin is indistinguishable from a marker centered at `(0, 0)`;
/// prefer [`find_center`] when the difference matters
pub fn center_of_id(id: u32, observations: &[MarkerObservation]) -> Point2<f32> {
    find_center(id, observations).unwrap_or_else(Point2::origin)
}

/// Four source/destination pairs in [`CornerRole::ALL`] order
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Correspondence {
    pub src: [Point2<f32>; 4],
    pub dst: [Point2<f32>; 4],
}

impl Correspondence {
    /// Pair the marker centers named by `layout` with the corners of `size`
    ///
    /// Fails when fewer than four observations exist (duplicates included),
    /// or when any marker named by the layout is absent
    pub fn build(
        layout: &CornerLayout,
        observations: &[MarkerObservation],
        size: OutputSize,
    ) -> Result<Self> {
        if observations.len() < 4 {
            return Err(RectifyError::InsufficientMarkers {
                found: observations.len(),
            });
        }

        let mut src = [Point2::origin(); 4];
        for (slot, role) in src.iter_mut().zip(CornerRole::ALL) {
            let id = layout.marker_for(role);
            *slot = find_center(id, observations)
                .ok_or(RectifyError::MissingMarker { id, corner: role })?;
            log::debug!("{role} corner: marker {id} at ({:.1}, {:.1})", slot.x, slot.y);
        }

        Ok(Self {
            src,
            dst: size.corners(),
        })
    }
}
