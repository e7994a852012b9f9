use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use nalgebra::Point2;

use crate::compose::overlay_raster;
use crate::correspondence::find_center;
use crate::detection::Detection;
use crate::transform::Raster;

const MARKER_COLOR: Rgba<u8> = Rgba([0, 220, 0, 255]);
const FIRST_CORNER_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const CENTER_COLOR: Rgba<u8> = Rgba([0, 80, 255, 255]);
const REJECTED_COLOR: Rgba<u8> = Rgba([255, 0, 255, 160]);

/// Source image with markers outlined, first corners boxed and centers
/// crossed. Rejected candidates are outlined in translucent magenta
pub fn draw_detection(source: &Raster, detection: &Detection) -> Raster {
    let (width, height) = source.dimensions();
    let mut layer = RgbaImage::new(width, height);

    for quad in &detection.rejected {
        draw_quad(&mut layer, quad, REJECTED_COLOR);
    }

    for marker in &detection.markers {
        draw_quad(&mut layer, &marker.corners, MARKER_COLOR);

        let first = marker.corners[0];
        draw_hollow_rect_mut(
            &mut layer,
            Rect::at(first.x as i32 - 3, first.y as i32 - 3).of_size(7, 7),
            FIRST_CORNER_COLOR,
        );

        if let Some(center) = find_center(marker.id, std::slice::from_ref(marker)) {
            draw_cross_mut(&mut layer, CENTER_COLOR, center.x as i32, center.y as i32);
        }
    }

    overlay_raster(source, &layer, (0, 0))
}

fn draw_quad(layer: &mut RgbaImage, quad: &[Point2<f32>; 4], color: Rgba<u8>) {
    for i in 0..4 {
        let a = quad[i];
        let b = quad[(i + 1) % 4];
        draw_line_segment_mut(layer, (a.x, a.y), (b.x, b.y), color);
    }
}
