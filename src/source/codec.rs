//! Decoding, orientation, resizing and JPEG encoding of library assets.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use fast_image_resize as fir;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};
use tracing::debug;

// Decodes an image to RGBA8 and applies EXIF orientation if available.
// When metadata is missing the stored orientation is kept.
pub fn decode_rgba8_apply_exif(path: &Path) -> Result<RgbaImage> {
    let img = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?;
    let img = img.to_rgba8();
    let orientation = read_orientation(path).unwrap_or(1);
    Ok(apply_orientation(img, orientation))
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let o = field.value.get_uint(0)? as u16;
    debug!("exif orientation {} for {}", o, path.display());
    Some(o)
}

fn apply_orientation(img: RgbaImage, orientation: u16) -> RgbaImage {
    use image::imageops::{flip_horizontal, flip_vertical, rotate90, rotate180, rotate270};
    match orientation {
        2 => flip_horizontal(&img),
        3 => rotate180(&img),
        4 => flip_vertical(&img),
        // transpose
        5 => flip_horizontal(&rotate90(&img)),
        6 => rotate90(&img),
        // transverse
        7 => flip_horizontal(&rotate270(&img)),
        8 => rotate270(&img),
        _ => img,
    }
}

/// Center-crop to a square and scale it to `edge` pixels (never upscales).
pub fn aspect_fill_square(source: &RgbaImage, edge: u32) -> Result<RgbaImage> {
    let (w, h) = source.dimensions();
    if w == 0 || h == 0 || edge == 0 {
        bail!("thumbnail dimensions must be positive");
    }
    let side = w.min(h);
    let target = edge.min(side);
    let left = f64::from(w - side) / 2.0;
    let top = f64::from(h - side) / 2.0;

    let src_view = fir::images::ImageRef::new(w, h, source.as_raw(), fir::PixelType::U8x4)
        .context("failed to create source view for thumbnail resize")?;
    let mut dst_image = fir::images::Image::new(target, target, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom))
        .crop(left, top, f64::from(side), f64::from(side));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .context("thumbnail resize failed")?;
    RgbaImage::from_raw(target, target, dst_image.into_vec())
        .ok_or_else(|| anyhow!("failed to construct resized RGBA image"))
}

/// JPEG-encode an RGBA buffer, discarding alpha.
pub fn encode_jpeg(img: RgbaImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(img).to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode_image(&rgb)
        .context("jpeg encode failed")?;
    Ok(out)
}

/// Size-reduced, compressed thumbnail suitable for transport.
pub fn thumbnail_jpeg(path: &Path, edge: u32, quality: u8) -> Result<Vec<u8>> {
    let oriented = decode_rgba8_apply_exif(path)?;
    let square = aspect_fill_square(&oriented, edge)?;
    encode_jpeg(square, quality)
}

/// Full-resolution, orientation-corrected re-encode of the original.
pub fn full_jpeg(path: &Path, quality: u8) -> Result<Vec<u8>> {
    let oriented = decode_rgba8_apply_exif(path)?;
    encode_jpeg(oriented, quality)
}
