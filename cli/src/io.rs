use std::fs;
use std::path::{Path, PathBuf};

use image_suite_core::{BatchOutcome, Tool, UploadedItem};
use walkdir::WalkDir;

use crate::error::IoError;

/// Collect every file under `input` that `tool` accepts.
/// A single file is returned as-is, whatever its extension.
pub fn collect_files(input: &Path, recursive: bool, tool: Tool) -> Result<Vec<PathBuf>, IoError> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    if !input.is_dir() {
        return Err(IoError::NotFound(input.to_path_buf()));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };

    let mut files = Vec::new();
    for entry in WalkDir::new(input).max_depth(max_depth).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let accepted = entry
            .file_name()
            .to_str()
            .map(|name| tool.accepts(name))
            .unwrap_or(false);
        if accepted {
            files.push(entry.into_path());
        } else {
            log::debug!("Ignoring {}", entry.path().display());
        }
    }

    Ok(files)
}

/// Read files into upload items named by their file name.
pub fn read_items(paths: &[PathBuf]) -> Result<Vec<UploadedItem>, IoError> {
    paths
        .iter()
        .map(|path| {
            let content = read_file(path)?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(UploadedItem::new(name, content))
        })
        .collect()
}

/// Write the downloadable result of a batch into `output_dir`: the file
/// itself for a one-file batch, the ZIP otherwise. Returns the written path.
pub fn write_outcome(
    outcome: &BatchOutcome,
    output_dir: &Path,
) -> Result<Option<PathBuf>, IoError> {
    if let Some(single) = outcome.single_output() {
        let path = output_dir.join(&single.output_name);
        write_file(&path, &single.output_bytes)?;
        return Ok(Some(path));
    }

    match &outcome.archive {
        Some(archive) => {
            let path = output_dir.join(outcome.archive_name());
            write_file(&path, archive)?;
            Ok(Some(path))
        }
        None => Ok(None),
    }
}

/// Read file contents.
pub fn read_file(path: &Path) -> Result<Vec<u8>, IoError> {
    fs::read(path).map_err(|e| IoError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write file contents, creating parent directories as needed.
pub fn write_file(path: &Path, data: &[u8]) -> Result<(), IoError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| IoError::WriteFile {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    fs::write(path, data).map_err(|e| IoError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}
