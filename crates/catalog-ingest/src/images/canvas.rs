//! 800x800 white canvas normalization and JPEG encoding

use super::ImageError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageReader, Rgba, RgbaImage, RgbImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

pub const CANVAS_SIZE: u32 = 800;
pub const JPEG_QUALITY: u8 = 90;

/// Decode by file extension, falling back to sniffing the bytes once
pub fn decode(raw: &Path) -> Result<DynamicImage, ImageError> {
    let primary = ImageReader::open(raw)
        .map_err(ImageError::Io)?
        .decode();

    match primary {
        Ok(img) => Ok(img),
        Err(e) => {
            debug!(path = %raw.display(), error = %e, "Extension-based decode failed, guessing format");
            let bytes = std::fs::read(raw)?;
            image::load_from_memory(&bytes).map_err(|_| ImageError::Decode {
                path: raw.display().to_string(),
            })
        },
    }
}

/// Fit inside the canvas keeping aspect ratio and center it on opaque white
pub fn fit_to_canvas(img: &DynamicImage) -> RgbImage {
    let fitted = if img.dimensions() == (CANVAS_SIZE, CANVAS_SIZE) {
        img.to_rgba8()
    } else {
        img.resize(CANVAS_SIZE, CANVAS_SIZE, FilterType::Lanczos3)
            .to_rgba8()
    };

    let mut canvas = RgbaImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, Rgba([255, 255, 255, 255]));
    let x = (CANVAS_SIZE - fitted.width()) / 2;
    let y = (CANVAS_SIZE - fitted.height()) / 2;
    imageops::overlay(&mut canvas, &fitted, i64::from(x), i64::from(y));

    DynamicImage::ImageRgba8(canvas).to_rgb8()
}

pub fn encode_jpeg(canvas: &RgbImage, out: &Path) -> Result<(), ImageError> {
    let mut writer = BufWriter::new(File::create(out)?);
    JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY)
        .encode_image(canvas)
        .map_err(|e| ImageError::Encode(e.to_string()))?;
    writer.flush()?;
    Ok(())
}

/// Decode `raw`, normalize it and write the JPEG to `out`
///
/// Returns the source dimensions.
pub fn normalize_file(raw: &Path, out: &Path) -> Result<(u32, u32), ImageError> {
    let img = decode(raw)?;
    let dimensions = img.dimensions();
    encode_jpeg(&fit_to_canvas(&img), out)?;
    Ok(dimensions)
}
