//! Background removal through an external cutout model.
//!
//! [`CutoutModel`] is the seam to the model itself; [`MemoizedRemover`]
//! wraps any model with the fixed matting policy and a bounded cache so
//! repeated uploads of the same image never reach the model twice.

pub mod cache;
pub mod rembg;

pub use cache::MemoizedRemover;
pub use rembg::RembgClient;

use crate::config::MattingParams;
use crate::error::ProcessingError;

/// An external model that separates foreground from background.
pub trait CutoutModel: Send + Sync {
    /// Takes PNG bytes, returns PNG bytes with a transparent background.
    fn cut_out(&self, png: &[u8], params: &MattingParams) -> Result<Vec<u8>, ProcessingError>;
}

/// PNG in, PNG with transparent background out.
pub trait BackgroundRemover: Send + Sync {
    fn remove_background(&self, png: &[u8]) -> Result<Vec<u8>, ProcessingError>;
}
