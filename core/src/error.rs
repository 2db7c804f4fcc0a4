use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("background removal failed: {0}")]
    BackgroundRemoval(String),

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}
