use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::codecs::webp::WebPDecoder;
use image::imageops::FilterType;
use image::{AnimationDecoder, DynamicImage, ImageFormat as ImgFormat, RgbaImage};

use crate::error::ProcessingError;

/// Decoded RGBA bitmap whose longest side is bounded.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedImage {
    pixels: RgbaImage,
}

impl NormalizedImage {
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn rgba(&self) -> &RgbaImage {
        &self.pixels
    }

    /// True if any pixel is not fully opaque.
    pub fn has_alpha(&self) -> bool {
        self.pixels.pixels().any(|p| p.0[3] != u8::MAX)
    }

    pub fn into_rgba(self) -> RgbaImage {
        self.pixels
    }
}

/// Decode raw upload bytes, keep the first frame, convert to RGBA and
/// shrink so the longest side is at most `max_side`.
pub fn decode_and_normalize(raw: &[u8], max_side: u32) -> Result<NormalizedImage, ProcessingError> {
    let rgba = decode_rgba(raw)?;
    let (width, height) = rgba.dimensions();
    let (new_width, new_height) = fit_within(width, height, max_side);

    let pixels = if (new_width, new_height) == (width, height) {
        rgba
    } else {
        log::debug!(
            "Downsampling {}x{} -> {}x{} (max side {})",
            width,
            height,
            new_width,
            new_height,
            max_side
        );
        image::imageops::resize(&rgba, new_width, new_height, FilterType::CatmullRom)
    };

    Ok(NormalizedImage { pixels })
}

/// Dimensions after scaling so the longer side equals `max_side`.
///
/// Aspect ratio is preserved, sides are rounded to the nearest integer and
/// never drop below 1. Images already within the bound are returned as-is.
pub fn fit_within(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_side || longest == 0 {
        return (width, height);
    }

    let scale = (max_side as f64 / longest as f64).min(1.0);
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

/// Plain PNG encoding of a normalized image, used to hand pixels to the
/// cutout model.
pub fn encode_png(image: &NormalizedImage) -> Result<Vec<u8>, ProcessingError> {
    let mut output = Vec::new();
    let mut cursor = Cursor::new(&mut output);
    image
        .rgba()
        .write_to(&mut cursor, ImgFormat::Png)
        .map_err(|e| ProcessingError::Encode(format!("Failed to encode PNG: {}", e)))?;
    Ok(output)
}

fn decode_rgba(raw: &[u8]) -> Result<RgbaImage, ProcessingError> {
    if is_heif(raw) {
        return decode_heif(raw);
    }

    let format = image::guess_format(raw)
        .map_err(|e| ProcessingError::Decode(format!("Unrecognized image data: {}", e)))?;

    if let Some(frame) = first_frame(raw, format) {
        return Ok(frame);
    }

    let img = image::load_from_memory_with_format(raw, format)
        .map_err(|e| ProcessingError::Decode(format!("Failed to load image: {}", e)))?;

    Ok(flatten_to_rgba(img))
}

/// First composited frame of an animated GIF or WebP. Any failure here
/// means "treat it as a still image" and the caller falls back to the plain
/// decoder. Other multi-image formats (TIFF, ICO) already decode to their
/// first image.
fn first_frame(raw: &[u8], format: ImgFormat) -> Option<RgbaImage> {
    let mut frames = match format {
        ImgFormat::Gif => GifDecoder::new(Cursor::new(raw)).ok()?.into_frames(),
        ImgFormat::WebP => WebPDecoder::new(Cursor::new(raw)).ok()?.into_frames(),
        _ => return None,
    };

    match frames.next()? {
        Ok(frame) => Some(frame.into_buffer()),
        Err(e) => {
            log::debug!(
                "{:?} frame extraction failed, decoding as still image: {}",
                format,
                e
            );
            None
        }
    }
}

fn flatten_to_rgba(img: DynamicImage) -> RgbaImage {
    match img {
        DynamicImage::ImageRgba8(buffer) => buffer,
        other => other.to_rgba8(),
    }
}

/// ISO-BMFF `ftyp` box with a HEIF family brand.
pub fn is_heif(raw: &[u8]) -> bool {
    const BRANDS: [&[u8; 4]; 8] = [
        b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"mif1", b"msf1",
    ];

    raw.len() >= 12 && &raw[4..8] == b"ftyp" && BRANDS.iter().any(|brand| &raw[8..12] == *brand)
}

#[cfg(feature = "heic")]
fn decode_heif(raw: &[u8]) -> Result<RgbaImage, ProcessingError> {
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let heif_err = |e: libheif_rs::HeifError| ProcessingError::Decode(format!("HEIF: {}", e));

    let lib = LibHeif::new();
    let context = HeifContext::read_from_bytes(raw).map_err(heif_err)?;
    let handle = context.primary_image_handle().map_err(heif_err)?;
    let decoded = lib
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgba), None)
        .map_err(heif_err)?;

    let planes = decoded.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| ProcessingError::Decode("HEIF: missing interleaved plane".into()))?;

    let row_len = plane.width as usize * 4;
    let mut pixels = Vec::with_capacity(row_len * plane.height as usize);
    for row in plane.data.chunks(plane.stride).take(plane.height as usize) {
        pixels.extend_from_slice(&row[..row_len]);
    }

    RgbaImage::from_raw(plane.width, plane.height, pixels)
        .ok_or_else(|| ProcessingError::Decode("HEIF: plane size mismatch".into()))
}

#[cfg(not(feature = "heic"))]
fn decode_heif(_raw: &[u8]) -> Result<RgbaImage, ProcessingError> {
    Err(ProcessingError::Decode(
        "HEIC/HEIF input requires the `heic` feature".to_string(),
    ))
}
