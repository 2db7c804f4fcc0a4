use std::io::Cursor;

use image::{DynamicImage, ImageFormat as ImgFormat, RgbImage};

use crate::config::CodecConfig;
use crate::error::ProcessingError;
use crate::format::TargetFormat;
use crate::preprocess::NormalizedImage;

/// Encode a normalized image to the target format.
pub fn encode(
    image: &NormalizedImage,
    target: TargetFormat,
    config: &CodecConfig,
) -> Result<Vec<u8>, ProcessingError> {
    log::debug!(
        "Encoding {}x{} image as {}",
        image.width(),
        image.height(),
        target.as_str()
    );

    let output = match target {
        TargetFormat::Jpeg => encode_jpeg(image, config)?,
        TargetFormat::Png => encode_png(image, config)?,
        TargetFormat::Webp => encode_webp(image, config)?,
    };

    log::debug!("Encoded {} bytes ({})", output.len(), target.as_str());
    Ok(output)
}

/// Encode to a format given by name (`jpg`, `png`, ...).
pub fn encode_named(
    image: &NormalizedImage,
    format_name: &str,
    config: &CodecConfig,
) -> Result<Vec<u8>, ProcessingError> {
    let target = format_name
        .parse::<TargetFormat>()
        .map_err(|_| ProcessingError::UnsupportedFormat(format_name.to_string()))?;
    encode(image, target, config)
}

/// JPEG: alpha composited onto white, progressive with optimized Huffman tables.
fn encode_jpeg(image: &NormalizedImage, config: &CodecConfig) -> Result<Vec<u8>, ProcessingError> {
    let rgb = flatten_onto_white(image);
    let (width, height) = rgb.dimensions();

    let width = u16::try_from(width)
        .map_err(|_| ProcessingError::Encode(format!("JPEG width {} exceeds 65535", width)))?;
    let height = u16::try_from(height)
        .map_err(|_| ProcessingError::Encode(format!("JPEG height {} exceeds 65535", height)))?;

    let mut output = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut output, config.jpeg_quality);
    encoder.set_progressive(true);
    encoder.set_optimized_huffman_tables(true);
    encoder
        .encode(rgb.as_raw(), width, height, jpeg_encoder::ColorType::Rgb)
        .map_err(|e| ProcessingError::Encode(format!("Failed to encode JPEG: {}", e)))?;

    Ok(output)
}

/// PNG: RGB when fully opaque, RGBA otherwise, then lossless optimization.
fn encode_png(image: &NormalizedImage, config: &CodecConfig) -> Result<Vec<u8>, ProcessingError> {
    let rgba = DynamicImage::ImageRgba8(image.rgba().clone());
    let img = if image.has_alpha() {
        rgba
    } else {
        DynamicImage::ImageRgb8(rgba.to_rgb8())
    };

    let mut raw = Vec::new();
    img.write_to(&mut Cursor::new(&mut raw), ImgFormat::Png)
        .map_err(|e| ProcessingError::Encode(format!("Failed to encode PNG: {}", e)))?;

    let opts = oxipng::Options::from_preset(config.png_preset);
    oxipng::optimize_from_memory(&raw, &opts)
        .map_err(|e| ProcessingError::Encode(format!("Failed to optimize PNG: {}", e)))
}

/// WebP: lossy with alpha, highest-effort method.
fn encode_webp(image: &NormalizedImage, config: &CodecConfig) -> Result<Vec<u8>, ProcessingError> {
    let (width, height) = image.dimensions();
    let encoder = webp::Encoder::from_rgba(image.rgba().as_raw(), width, height);

    let mut webp_config = webp::WebPConfig::new()
        .map_err(|_| ProcessingError::Encode("Failed to initialize WebP config".to_string()))?;
    webp_config.quality = config.webp_quality;
    webp_config.method = config.webp_method;

    let encoded = encoder
        .encode_advanced(&webp_config)
        .map_err(|e| ProcessingError::Encode(format!("Failed to encode WebP: {:?}", e)))?;

    Ok(encoded.to_vec())
}

fn flatten_onto_white(image: &NormalizedImage) -> RgbImage {
    let rgba = image.rgba();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let blend = |c: u8| -> u8 {
            let a = a as u32;
            ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8
        };
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}
