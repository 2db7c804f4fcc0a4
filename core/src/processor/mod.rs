pub mod convert;
pub mod cutout;

use crate::error::ProcessingError;

/// Mode-specific transform applied to each uploaded item.
pub trait ImageProcessor {
    /// Items this processor leaves untouched, judged by file name only.
    fn should_skip(&self, _file_name: &str) -> bool {
        false
    }

    /// Output file name for an upload named `file_name`.
    fn output_name(&self, file_name: &str) -> String;

    fn process(&self, input: &[u8]) -> Result<Vec<u8>, ProcessingError>;
}
