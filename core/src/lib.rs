//! Batch pipeline behind the image suite: decode, normalize, convert or cut
//! out, package as ZIP, stage for download.

pub mod archive;
pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod preprocess;
pub mod processor;
pub mod removal;
pub mod report;
pub mod session;

pub use config::{CodecConfig, MattingParams, PipelineConfig};
pub use error::ProcessingError;
pub use format::{TargetFormat, Tool};
pub use pipeline::{BatchRunner, UploadedItem};
pub use report::{BatchOutcome, ConversionRequest, ItemResult, ItemStatus, Mode};
pub use session::{dispatch, Action, ResultKey, SessionResultStore, StagedFile};
