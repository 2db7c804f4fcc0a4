use crate::error::ProcessingError;
use crate::format::stem_of;
use crate::preprocess::{decode_and_normalize, encode_png};
use crate::processor::ImageProcessor;
use crate::removal::BackgroundRemover;

/// Suffix appended to background-removed outputs.
pub const NO_BG_SUFFIX: &str = "_no-bg";

/// Normalizes the upload to PNG and hands it to the cutout model.
pub struct CutoutProcessor<'a> {
    remover: Option<&'a dyn BackgroundRemover>,
    max_side: u32,
}

impl<'a> CutoutProcessor<'a> {
    pub fn new(remover: Option<&'a dyn BackgroundRemover>, max_side: u32) -> Self {
        Self { remover, max_side }
    }
}

impl ImageProcessor for CutoutProcessor<'_> {
    fn output_name(&self, file_name: &str) -> String {
        format!("{}{}.png", stem_of(file_name), NO_BG_SUFFIX)
    }

    fn process(&self, input: &[u8]) -> Result<Vec<u8>, ProcessingError> {
        let image = decode_and_normalize(input, self.max_side)?;
        let png = encode_png(&image)?;

        let remover = self.remover.ok_or_else(|| {
            ProcessingError::BackgroundRemoval("no cutout model configured".to_string())
        })?;
        remover.remove_background(&png)
    }
}
