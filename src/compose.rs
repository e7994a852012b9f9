use image::{ImageBuffer, Pixel, RgbaImage};

use crate::transform::Raster;

/// Alpha-blend `foreground` onto `background` with its top-left at `location`
///
/// Each background channel `c` becomes `bg * (1 - a) + fg[c] * a`, with `a`
/// the foreground alpha scaled to `[0, 1]`. Pixels with zero alpha or outside
/// the background are left alone; `location` may be negative
pub fn overlay<P>(
    background: &ImageBuffer<P, Vec<u8>>,
    foreground: &RgbaImage,
    location: (i32, i32),
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let mut output = background.clone();
    let (bw, bh) = background.dimensions();
    let (fw, fh) = foreground.dimensions();
    let (lx, ly) = location;
    let channels = (P::CHANNEL_COUNT as usize).min(4);

    for y in ly.max(0)..bh as i32 {
        let fy = y - ly;
        if fy >= fh as i32 {
            break;
        }
        for x in lx.max(0)..bw as i32 {
            let fx = x - lx;
            if fx >= fw as i32 {
                break;
            }

            let fg = foreground.get_pixel(fx as u32, fy as u32);
            let opacity = fg[3] as f64 / 255.0;
            if opacity <= 0.0 {
                continue;
            }

            let px = output.get_pixel_mut(x as u32, y as u32).channels_mut();
            for c in 0..channels {
                px[c] = (px[c] as f64 * (1.0 - opacity) + fg[c] as f64 * opacity) as u8;
            }
        }
    }

    output
}

/// [`overlay`] onto whichever layout `background` has. 16-bit backgrounds
/// are reduced to 8 bits first
pub fn overlay_raster(background: &Raster, foreground: &RgbaImage, location: (i32, i32)) -> Raster {
    match background {
        Raster::Gray(buf) => Raster::Gray(overlay(buf, foreground, location)),
        Raster::Rgb(buf) => Raster::Rgb(overlay(buf, foreground, location)),
        Raster::Rgba(buf) => Raster::Rgba(overlay(buf, foreground, location)),
        deep => overlay_raster(&deep.to_8bit(), foreground, location),
    }
}
