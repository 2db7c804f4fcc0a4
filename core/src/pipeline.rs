use std::sync::Arc;

use crate::archive::ArchiveBuilder;
use crate::config::PipelineConfig;
use crate::processor::convert::ConvertProcessor;
use crate::processor::cutout::CutoutProcessor;
use crate::processor::ImageProcessor;
use crate::removal::BackgroundRemover;
use crate::report::{BatchOutcome, ConversionRequest, ItemResult, Mode};

/// One uploaded file: its original name and raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedItem {
    pub name: String,
    pub content: Vec<u8>,
}

impl UploadedItem {
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }
}

/// Runs a batch of uploads through one tool, one item at a time.
///
/// A failing item never aborts the batch: its error is recorded on the
/// item's result and the run moves on.
pub struct BatchRunner {
    config: PipelineConfig,
    remover: Option<Arc<dyn BackgroundRemover>>,
}

impl BatchRunner {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            remover: None,
        }
    }

    pub fn with_remover(mut self, remover: Arc<dyn BackgroundRemover>) -> Self {
        self.remover = Some(remover);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, items: Vec<UploadedItem>, request: &ConversionRequest) -> BatchOutcome {
        self.run_with(items, request, |_| {})
    }

    /// Like [`run`](Self::run), calling `on_item` after each item finishes.
    pub fn run_with<F>(
        &self,
        items: Vec<UploadedItem>,
        request: &ConversionRequest,
        mut on_item: F,
    ) -> BatchOutcome
    where
        F: FnMut(&ItemResult),
    {
        let processor = self.processor_for(request);
        let mut archive = ArchiveBuilder::new();
        let mut outcome = BatchOutcome::new(*request);

        log::info!(
            "Batch started: {} item(s), {:?} -> {}",
            items.len(),
            request.mode,
            request.target_format
        );

        for item in items {
            let result = process_item(processor.as_ref(), item, &mut archive);
            match &result.error {
                Some(err) => log::warn!("{}: {}", result.source_name, err),
                None => log::debug!("{}: {}", result.source_name, result.status),
            }
            on_item(&result);
            outcome.add(result);
        }

        if !archive.is_empty() {
            match archive.finish() {
                Ok(bytes) => outcome.archive = Some(bytes),
                Err(e) => {
                    log::error!("Failed to finalize archive: {}", e);
                    outcome.fail_converted(&e.to_string());
                }
            }
        }

        log::info!(
            "Batch finished: {} converted, {} skipped, {} failed",
            outcome.converted,
            outcome.skipped,
            outcome.failed
        );

        outcome
    }

    fn processor_for(&self, request: &ConversionRequest) -> Box<dyn ImageProcessor + '_> {
        match request.mode {
            Mode::FormatConvert => Box::new(ConvertProcessor::new(
                request.target_format,
                self.config.max_side_convert,
                &self.config.codec,
            )),
            Mode::BackgroundRemoval => Box::new(CutoutProcessor::new(
                self.remover.as_deref(),
                self.config.max_side_removal,
            )),
        }
    }
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

fn process_item(
    processor: &dyn ImageProcessor,
    item: UploadedItem,
    archive: &mut ArchiveBuilder,
) -> ItemResult {
    let UploadedItem { name, content } = item;

    if processor.should_skip(&name) {
        return ItemResult::skipped(name);
    }

    let output = match processor.process(&content) {
        Ok(output) => output,
        Err(e) => return ItemResult::failed(name, e.to_string()),
    };

    let wanted = processor.output_name(&name);
    match archive.add(&wanted, &output) {
        Ok(stored) => ItemResult::converted(name, stored, output),
        Err(e) => ItemResult::failed(name, e.to_string()),
    }
}
