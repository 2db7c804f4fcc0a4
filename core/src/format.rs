use std::fmt;
use std::str::FromStr;

/// Output formats a batch can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    Jpeg,
    Png,
    Webp,
}

impl TargetFormat {
    pub const ALL: [TargetFormat; 3] = [TargetFormat::Jpeg, TargetFormat::Png, TargetFormat::Webp];

    /// Extension written on converted files.
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "jpg",
            TargetFormat::Png => "png",
            TargetFormat::Webp => "webp",
        }
    }

    /// Extensions that already count as this format (lowercase).
    pub fn accepted_extensions(&self) -> &'static [&'static str] {
        match self {
            TargetFormat::Jpeg => &["jpg", "jpeg"],
            TargetFormat::Png => &["png"],
            TargetFormat::Webp => &["webp"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "JPEG",
            TargetFormat::Png => "PNG",
            TargetFormat::Webp => "WEBP",
        }
    }

    pub fn mime(&self) -> &'static str {
        mime_for_extension(self.extension())
    }

    /// True when `file_name` already carries one of this format's extensions.
    /// Names without an extension never match.
    pub fn matches_name(&self, file_name: &str) -> bool {
        match extension_of(file_name) {
            Some(ext) => self
                .accepted_extensions()
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted)),
            None => false,
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(TargetFormat::Jpeg),
            "png" => Ok(TargetFormat::Png),
            "webp" => Ok(TargetFormat::Webp),
            _ => Err(format!("unknown target format: {s}")),
        }
    }
}

/// The two tools of the suite, each with its own upload whitelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    BackgroundRemover,
    Converter,
}

impl Tool {
    pub fn upload_extensions(&self) -> &'static [&'static str] {
        match self {
            Tool::BackgroundRemover => &["png", "jpg", "jpeg"],
            Tool::Converter => &[
                "heic", "heif", "jpg", "jpeg", "png", "webp", "gif", "bmp", "tif", "tiff", "ico",
            ],
        }
    }

    /// Whether an upload named `file_name` is accepted by this tool.
    pub fn accepts(&self, file_name: &str) -> bool {
        let allowed = self.upload_extensions();
        extension_of(file_name)
            .is_some_and(|ext| allowed.iter().any(|a| ext.eq_ignore_ascii_case(a)))
    }
}

/// Text after the last `.`, if any.
pub fn extension_of(file_name: &str) -> Option<&str> {
    file_name.rsplit_once('.').map(|(_, ext)| ext)
}

/// File name with its last extension removed.
pub fn stem_of(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => file_name,
    }
}

pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

/// MIME type for a file name, derived from its extension.
pub fn mime_for_name(file_name: &str) -> &'static str {
    extension_of(file_name)
        .map(mime_for_extension)
        .unwrap_or("application/octet-stream")
}
