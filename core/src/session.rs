//! Per-session staging of the most recent batch's downloads.
//!
//! A store is owned by whoever owns the session (the server keeps one per
//! session id); there is no global state. Every new run clears the store
//! before writing, so a download from an earlier run is never offered again.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::format::mime_for_name;
use crate::pipeline::{BatchRunner, UploadedItem};
use crate::report::{BatchOutcome, ConversionRequest, ItemStatus};

/// Logical slots a session can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultKey {
    /// ZIP of every converted item
    Archive,
    /// The one output of a single-file batch
    SingleOutput,
    /// Output of the item at this input position
    Item(usize),
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultKey::Archive => write!(f, "archive"),
            ResultKey::SingleOutput => write!(f, "single"),
            ResultKey::Item(index) => write!(f, "item-{}", index),
        }
    }
}

impl FromStr for ResultKey {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "archive" => Ok(ResultKey::Archive),
            "single" => Ok(ResultKey::SingleOutput),
            _ => s
                .strip_prefix("item-")
                .and_then(|index| index.parse().ok())
                .map(ResultKey::Item)
                .ok_or_else(|| format!("unknown result key: {s}")),
        }
    }
}

/// A downloadable payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl StagedFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime = mime_for_name(&file_name);
        Self {
            file_name,
            mime,
            bytes,
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionResultStore {
    entries: HashMap<ResultKey, StagedFile>,
    summary: Option<String>,
}

impl SessionResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: ResultKey, value: StagedFile) {
        self.entries.insert(key, value);
    }

    pub fn get(&self, key: ResultKey) -> Option<&StagedFile> {
        self.entries.get(&key)
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
        self.summary = None;
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.summary.is_none()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ResultKey> {
        self.entries.keys()
    }

    /// Replace everything with the downloads of `outcome`.
    pub fn stage(&mut self, outcome: &BatchOutcome) {
        self.clear_all();

        if let Some(archive) = &outcome.archive {
            self.set(ResultKey::Archive, StagedFile::new(outcome.archive_name(), archive.clone()));
        }

        if let Some(single) = outcome.single_output() {
            self.set(
                ResultKey::SingleOutput,
                StagedFile::new(single.output_name.clone(), single.output_bytes.clone()),
            );
        }

        for (index, result) in outcome.results.iter().enumerate() {
            if result.status == ItemStatus::Converted {
                self.set(
                    ResultKey::Item(index),
                    StagedFile::new(result.output_name.clone(), result.output_bytes.clone()),
                );
            }
        }

        self.summary = Some(outcome.summary());
    }
}

/// What the user asked for.
#[derive(Debug, Clone)]
pub enum Action {
    Convert {
        items: Vec<UploadedItem>,
        request: ConversionRequest,
    },
    Reset,
}

/// Apply `action` to one session. Returns the batch outcome for `Convert`.
pub fn dispatch(
    runner: &BatchRunner,
    store: &mut SessionResultStore,
    action: Action,
) -> Option<BatchOutcome> {
    match action {
        Action::Convert { items, request } => {
            store.clear_all();
            let outcome = runner.run(items, &request);
            store.stage(&outcome);
            Some(outcome)
        }
        Action::Reset => {
            store.clear_all();
            None
        }
    }
}
