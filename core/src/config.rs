/// Longest side allowed before the cutout model sees an image.
pub const MAX_SIDE_REMOVAL: u32 = 2000;
/// Longest side allowed for format conversion.
pub const MAX_SIDE_CONVERT: u32 = 2500;

/// Encoder knobs shared by every format conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct CodecConfig {
    /// JPEG quality 0-100
    pub jpeg_quality: u8,
    /// WebP quality 0-100
    pub webp_quality: f32,
    /// WebP effort 0-6 (6 = slowest, smallest output)
    pub webp_method: i32,
    /// oxipng preset 0-6
    pub png_preset: u8,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 85,
            webp_quality: 85.0,
            webp_method: 6,
            png_preset: 2,
        }
    }
}

/// Alpha-matting parameters passed to the cutout model.
///
/// These are fixed policy, not user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MattingParams {
    pub alpha_matting: bool,
    pub foreground_threshold: u8,
    pub background_threshold: u8,
    pub erode_size: u32,
}

impl Default for MattingParams {
    fn default() -> Self {
        Self {
            alpha_matting: true,
            foreground_threshold: 240,
            background_threshold: 10,
            erode_size: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Downsampling bound for background removal
    pub max_side_removal: u32,
    /// Downsampling bound for format conversion
    pub max_side_convert: u32,
    /// Encoder settings for format conversion
    pub codec: CodecConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_side_removal: MAX_SIDE_REMOVAL,
            max_side_convert: MAX_SIDE_CONVERT,
            codec: CodecConfig::default(),
        }
    }
}
