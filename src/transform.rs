use std::path::Path;

use image::{
    DynamicImage, GrayImage, ImageBuffer, ImageFormat, ImageReader, Luma, Pixel, Rgb, RgbImage,
    Rgba, RgbaImage,
};
use imageproc::geometric_transformations::{warp, Interpolation, Projection};

use crate::error::{RectifyError, Result};
use crate::geometry::Homography;

pub type Gray16Image = ImageBuffer<Luma<u16>, Vec<u16>>;
pub type Rgb16Image = ImageBuffer<Rgb<u16>, Vec<u16>>;
pub type Rgba16Image = ImageBuffer<Rgba<u16>, Vec<u16>>;

/// An image in one of the channel layouts the pipeline works with, at its
/// decoded depth
#[derive(Clone, Debug, PartialEq)]
pub enum Raster {
    Gray(GrayImage),
    Rgb(RgbImage),
    Rgba(RgbaImage),
    Gray16(Gray16Image),
    Rgb16(Rgb16Image),
    Rgba16(Rgba16Image),
}

impl Raster {
    /// Decode an image file, keeping depth and alpha
    pub fn load(path: &Path) -> Result<Self> {
        let invalid = |source| RectifyError::InvalidInput {
            path: path.to_path_buf(),
            source,
        };
        let img = ImageReader::open(path)
            .map_err(|e| invalid(Some(e.into())))?
            .with_guessed_format()
            .map_err(|e| invalid(Some(e.into())))?
            .decode()
            .map_err(|e| invalid(Some(e)))?;

        if img.width() == 0 || img.height() == 0 {
            return Err(invalid(None));
        }
        Ok(Self::from_dynamic(img))
    }

    /// Gray+alpha is widened to RGBA and float layouts become 16-bit
    pub fn from_dynamic(img: DynamicImage) -> Self {
        match img {
            DynamicImage::ImageLuma8(buf) => Raster::Gray(buf),
            DynamicImage::ImageRgb8(buf) => Raster::Rgb(buf),
            DynamicImage::ImageRgba8(buf) => Raster::Rgba(buf),
            DynamicImage::ImageLuma16(buf) => Raster::Gray16(buf),
            DynamicImage::ImageRgb16(buf) => Raster::Rgb16(buf),
            DynamicImage::ImageRgba16(buf) => Raster::Rgba16(buf),
            DynamicImage::ImageLumaA8(_) => Raster::Rgba(img.to_rgba8()),
            other if other.color().has_alpha() => Raster::Rgba16(other.to_rgba16()),
            other => Raster::Rgb16(other.to_rgb16()),
        }
    }

    pub fn into_dynamic(self) -> DynamicImage {
        match self {
            Raster::Gray(buf) => DynamicImage::ImageLuma8(buf),
            Raster::Rgb(buf) => DynamicImage::ImageRgb8(buf),
            Raster::Rgba(buf) => DynamicImage::ImageRgba8(buf),
            Raster::Gray16(buf) => DynamicImage::ImageLuma16(buf),
            Raster::Rgb16(buf) => DynamicImage::ImageRgb16(buf),
            Raster::Rgba16(buf) => DynamicImage::ImageRgba16(buf),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Raster::Gray(buf) => buf.dimensions(),
            Raster::Rgb(buf) => buf.dimensions(),
            Raster::Rgba(buf) => buf.dimensions(),
            Raster::Gray16(buf) => buf.dimensions(),
            Raster::Rgb16(buf) => buf.dimensions(),
            Raster::Rgba16(buf) => buf.dimensions(),
        }
    }

    pub fn channels(&self) -> u8 {
        match self {
            Raster::Gray(_) | Raster::Gray16(_) => 1,
            Raster::Rgb(_) | Raster::Rgb16(_) => 3,
            Raster::Rgba(_) | Raster::Rgba16(_) => 4,
        }
    }

    /// Bits per channel: 8 or 16
    pub fn bit_depth(&self) -> u8 {
        match self {
            Raster::Gray(_) | Raster::Rgb(_) | Raster::Rgba(_) => 8,
            Raster::Gray16(_) | Raster::Rgb16(_) | Raster::Rgba16(_) => 16,
        }
    }

    /// Same layout at 8 bits per channel
    pub fn to_8bit(&self) -> Raster {
        match self {
            Raster::Gray16(buf) => {
                Raster::Gray(DynamicImage::ImageLuma16(buf.clone()).to_luma8())
            }
            Raster::Rgb16(buf) => Raster::Rgb(DynamicImage::ImageRgb16(buf.clone()).to_rgb8()),
            Raster::Rgba16(buf) => {
                Raster::Rgba(DynamicImage::ImageRgba16(buf.clone()).to_rgba8())
            }
            eight => eight.clone(),
        }
    }

    /// Luma view used for marker detection
    pub fn to_gray(&self) -> GrayImage {
        match self {
            Raster::Gray(buf) => buf.clone(),
            other => other.clone().into_dynamic().to_luma8(),
        }
    }

    /// Resample the whole image through `h` (source to destination)
    ///
    /// The result has the source dimensions and depth. Bilinear
    /// interpolation; pixels mapping outside the source are zero
    pub fn warp(&self, h: &Homography) -> Result<Self> {
        let projection = Projection::from_matrix(h.to_row_major_f32())
            .ok_or(RectifyError::DegenerateHomography)?;
        let bilinear = Interpolation::Bilinear;

        Ok(match self {
            Raster::Gray(buf) => Raster::Gray(warp(buf, &projection, bilinear, Luma([0]))),
            Raster::Rgb(buf) => Raster::Rgb(warp(buf, &projection, bilinear, Rgb([0; 3]))),
            Raster::Rgba(buf) => Raster::Rgba(warp(buf, &projection, bilinear, Rgba([0; 4]))),
            Raster::Gray16(buf) => Raster::Gray16(warp(buf, &projection, bilinear, Luma([0]))),
            Raster::Rgb16(buf) => Raster::Rgb16(warp(buf, &projection, bilinear, Rgb([0; 3]))),
            Raster::Rgba16(buf) => {
                Raster::Rgba16(warp(buf, &projection, bilinear, Rgba([0; 4])))
            }
        })
    }

    /// Top-left `width x height` region. Area beyond the image is zero
    pub fn crop(&self, width: u32, height: u32) -> Self {
        match self {
            Raster::Gray(buf) => Raster::Gray(crop_origin(buf, width, height, Luma([0]))),
            Raster::Rgb(buf) => Raster::Rgb(crop_origin(buf, width, height, Rgb([0; 3]))),
            Raster::Rgba(buf) => Raster::Rgba(crop_origin(buf, width, height, Rgba([0; 4]))),
            Raster::Gray16(buf) => Raster::Gray16(crop_origin(buf, width, height, Luma([0]))),
            Raster::Rgb16(buf) => Raster::Rgb16(crop_origin(buf, width, height, Rgb([0; 3]))),
            Raster::Rgba16(buf) => {
                Raster::Rgba16(crop_origin(buf, width, height, Rgba([0; 4])))
            }
        }
    }

    /// Write to `path`, format from the extension
    ///
    /// Alpha is dropped for formats that cannot store it, and 16-bit data is
    /// reduced to 8 bits for formats without 16-bit support
    pub fn save(&self, path: &Path) -> Result<()> {
        let write_err = |source| RectifyError::Write {
            path: path.to_path_buf(),
            source,
        };
        let format = ImageFormat::from_path(path).map_err(write_err)?;

        let mut raster = self.clone();
        if raster.bit_depth() == 16 && !supports_16bit(format) {
            log::debug!("{format:?} has no 16-bit mode, reducing to 8 bits");
            raster = raster.to_8bit();
        }
        let mut img = raster.into_dynamic();
        if img.color().has_alpha() && !supports_alpha(format) {
            log::debug!("{format:?} has no alpha channel, dropping it");
            img = match img {
                DynamicImage::ImageRgba16(_) => DynamicImage::ImageRgb16(img.to_rgb16()),
                other => DynamicImage::ImageRgb8(other.to_rgb8()),
            };
        }
        img.save_with_format(path, format).map_err(write_err)
    }
}

fn supports_alpha(format: ImageFormat) -> bool {
    !matches!(format, ImageFormat::Jpeg | ImageFormat::Pnm)
}

fn supports_16bit(format: ImageFormat) -> bool {
    matches!(format, ImageFormat::Png | ImageFormat::Tiff)
}

fn crop_origin<P>(
    img: &ImageBuffer<P, Vec<P::Subpixel>>,
    width: u32,
    height: u32,
    border: P,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel,
{
    let (w, h) = img.dimensions();
    ImageBuffer::from_fn(width, height, |x, y| {
        if x < w && y < h {
            *img.get_pixel(x, y)
        } else {
            border
        }
    })
}
