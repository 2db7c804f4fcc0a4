use std::fmt;

use crate::format::{mime_for_name, TargetFormat};

/// How the batch ran: cutout or format conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    BackgroundRemoval,
    FormatConvert,
}

/// Fixed for the duration of one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionRequest {
    pub target_format: TargetFormat,
    pub mode: Mode,
}

impl ConversionRequest {
    pub fn convert(target_format: TargetFormat) -> Self {
        Self {
            target_format,
            mode: Mode::FormatConvert,
        }
    }

    /// Background removal always produces PNG.
    pub fn remove_background() -> Self {
        Self {
            target_format: TargetFormat::Png,
            mode: Mode::BackgroundRemoval,
        }
    }

    /// Name of the archive offered for download.
    pub fn archive_name(&self) -> String {
        match self.mode {
            Mode::BackgroundRemoval => "no-bg.zip".to_string(),
            Mode::FormatConvert => {
                format!("converted_{}.zip", self.target_format.as_str().to_lowercase())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Converted,
    Skipped,
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Converted => "converted",
            ItemStatus::Skipped => "skipped",
            ItemStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for one uploaded item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResult {
    pub source_name: String,
    /// Empty unless converted
    pub output_name: String,
    pub output_bytes: Vec<u8>,
    pub status: ItemStatus,
    pub error: Option<String>,
}

impl ItemResult {
    pub fn converted(source_name: String, output_name: String, output_bytes: Vec<u8>) -> Self {
        Self {
            source_name,
            output_name,
            output_bytes,
            status: ItemStatus::Converted,
            error: None,
        }
    }

    pub fn skipped(source_name: String) -> Self {
        Self {
            source_name,
            output_name: String::new(),
            output_bytes: Vec::new(),
            status: ItemStatus::Skipped,
            error: None,
        }
    }

    pub fn failed(source_name: String, error: String) -> Self {
        Self {
            source_name,
            output_name: String::new(),
            output_bytes: Vec::new(),
            status: ItemStatus::Failed,
            error: Some(error),
        }
    }

    pub fn mime(&self) -> &'static str {
        mime_for_name(&self.output_name)
    }
}

/// Everything a batch run produced, in input order.
///
/// The archive holds exactly the converted items. If it cannot be produced
/// the converted items are downgraded with [`fail_converted`](Self::fail_converted),
/// so `archive.is_some() == (converted > 0)` always holds.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub request: ConversionRequest,
    pub results: Vec<ItemResult>,
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// ZIP of every converted item; present iff `converted > 0`
    pub archive: Option<Vec<u8>>,
}

impl BatchOutcome {
    pub fn new(request: ConversionRequest) -> Self {
        Self {
            request,
            results: Vec::new(),
            converted: 0,
            skipped: 0,
            failed: 0,
            archive: None,
        }
    }

    pub fn add(&mut self, result: ItemResult) {
        match result.status {
            ItemStatus::Converted => self.converted += 1,
            ItemStatus::Skipped => self.skipped += 1,
            ItemStatus::Failed => self.failed += 1,
        }
        self.results.push(result);
    }

    /// Mark every converted item as failed with `error` and drop the archive.
    pub fn fail_converted(&mut self, error: &str) {
        for result in &mut self.results {
            if result.status == ItemStatus::Converted {
                let source_name = std::mem::take(&mut result.source_name);
                *result = ItemResult::failed(source_name, error.to_string());
            }
        }
        self.failed += self.converted;
        self.converted = 0;
        self.archive = None;
    }

    pub fn submitted(&self) -> usize {
        self.results.len()
    }

    pub fn archive_name(&self) -> String {
        self.request.archive_name()
    }

    /// The one output of a single-file batch, offered without a ZIP.
    pub fn single_output(&self) -> Option<&ItemResult> {
        match self.results.as_slice() {
            [only] if only.status == ItemStatus::Converted => Some(only),
            _ => None,
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &ItemResult> {
        self.results.iter().filter(|r| r.status == ItemStatus::Failed)
    }

    /// One-line, user-facing description of the run.
    pub fn summary(&self) -> String {
        let target = self.request.target_format.as_str();

        if self.request.mode == Mode::BackgroundRemoval {
            let mut msg = format!(
                "Background removed: {} of {} image(s)",
                self.converted,
                self.submitted()
            );
            if self.failed > 0 {
                msg.push_str(&format!(" • Failed: {}", self.failed));
            }
            return msg;
        }

        if let [only] = self.results.as_slice() {
            return match only.status {
                ItemStatus::Converted => {
                    format!("Converted 1 file to {}: {}", target, only.output_name)
                }
                ItemStatus::Skipped => format!(
                    "Already {}: {} (no conversion needed)",
                    target, only.source_name
                ),
                ItemStatus::Failed => format!("Failed to convert {}", only.source_name),
            };
        }

        if self.converted == 0 && self.failed == 0 {
            return format!("Nothing to convert (all files were already {}).", target);
        }

        let mut msg = format!(
            "Converted: {} • Skipped (already {}): {}",
            self.converted, target, self.skipped
        );
        if self.failed > 0 {
            msg.push_str(&format!(" • Failed: {}", self.failed));
        }
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_follow_status() {
        let mut outcome = BatchOutcome::new(ConversionRequest::convert(TargetFormat::Png));
        outcome.add(ItemResult::converted("a.jpg".into(), "a.png".into(), vec![1]));
        outcome.add(ItemResult::skipped("b.png".into()));
        outcome.add(ItemResult::failed("c.gif".into(), "bad".into()));
        assert_eq!((outcome.converted, outcome.skipped, outcome.failed), (1, 1, 1));
        assert_eq!(outcome.submitted(), 3);
        assert!(outcome.single_output().is_none());
        assert_eq!(outcome.errors().count(), 1);
    }

    #[test]
    fn test_single_output_only_for_one_converted_item() {
        let mut outcome = BatchOutcome::new(ConversionRequest::convert(TargetFormat::Webp));
        outcome.add(ItemResult::converted("a.jpg".into(), "a.webp".into(), vec![9]));
        let single = outcome.single_output().unwrap();
        assert_eq!(single.output_name, "a.webp");
        assert_eq!(single.mime(), "image/webp");

        let mut skipped = BatchOutcome::new(ConversionRequest::convert(TargetFormat::Webp));
        skipped.add(ItemResult::skipped("a.webp".into()));
        assert!(skipped.single_output().is_none());
    }

    #[test]
    fn test_fail_converted_keeps_archive_invariant() {
        let mut outcome = BatchOutcome::new(ConversionRequest::convert(TargetFormat::Png));
        outcome.add(ItemResult::converted("a.jpg".into(), "a.png".into(), vec![1]));
        outcome.add(ItemResult::skipped("b.png".into()));
        outcome.add(ItemResult::converted("c.gif".into(), "c.png".into(), vec![2]));
        outcome.archive = Some(vec![0xAA]);

        outcome.fail_converted("archive error");

        assert_eq!((outcome.converted, outcome.skipped, outcome.failed), (0, 1, 2));
        assert!(outcome.archive.is_none());
        assert_eq!(outcome.results[0].source_name, "a.jpg");
        assert_eq!(outcome.results[0].error.as_deref(), Some("archive error"));
        assert!(outcome.results[2].output_bytes.is_empty());
        assert_eq!(outcome.results[1].status, ItemStatus::Skipped);
    }

    #[test]
    fn test_archive_names() {
        assert_eq!(
            ConversionRequest::convert(TargetFormat::Jpeg).archive_name(),
            "converted_jpeg.zip"
        );
        assert_eq!(ConversionRequest::remove_background().archive_name(), "no-bg.zip");
    }

    #[test]
    fn test_summary_messages() {
        let mut all_skipped = BatchOutcome::new(ConversionRequest::convert(TargetFormat::Png));
        all_skipped.add(ItemResult::skipped("a.png".into()));
        all_skipped.add(ItemResult::skipped("b.PNG".into()));
        assert_eq!(all_skipped.summary(), "Nothing to convert (all files were already PNG).");

        let mut single = BatchOutcome::new(ConversionRequest::convert(TargetFormat::Png));
        single.add(ItemResult::skipped("a.png".into()));
        assert_eq!(single.summary(), "Already PNG: a.png (no conversion needed)");

        let mut mixed = BatchOutcome::new(ConversionRequest::convert(TargetFormat::Jpeg));
        mixed.add(ItemResult::converted("a.png".into(), "a.jpg".into(), vec![]));
        mixed.add(ItemResult::failed("b.gif".into(), "x".into()));
        assert_eq!(mixed.summary(), "Converted: 1 • Skipped (already JPEG): 0 • Failed: 1");
    }
}
