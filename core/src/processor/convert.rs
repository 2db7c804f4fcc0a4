use crate::codec;
use crate::config::CodecConfig;
use crate::error::ProcessingError;
use crate::format::{stem_of, TargetFormat};
use crate::preprocess::decode_and_normalize;
use crate::processor::ImageProcessor;

/// Re-encodes any decodable upload into the target format.
pub struct ConvertProcessor<'a> {
    target: TargetFormat,
    max_side: u32,
    codec: &'a CodecConfig,
}

impl<'a> ConvertProcessor<'a> {
    pub fn new(target: TargetFormat, max_side: u32, codec: &'a CodecConfig) -> Self {
        Self {
            target,
            max_side,
            codec,
        }
    }
}

impl ImageProcessor for ConvertProcessor<'_> {
    fn should_skip(&self, file_name: &str) -> bool {
        self.target.matches_name(file_name)
    }

    fn output_name(&self, file_name: &str) -> String {
        format!("{}.{}", stem_of(file_name), self.target.extension())
    }

    fn process(&self, input: &[u8]) -> Result<Vec<u8>, ProcessingError> {
        let image = decode_and_normalize(input, self.max_side)?;
        codec::encode(&image, self.target, self.codec)
    }
}
