//! File classification for the scanner.

use std::path::Path;

/// What a file is to the culling engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Raw,
    Jpeg,
    Other,
}

/// Classifies files by extension against ordered RAW and JPEG lists
///
/// The order of each list is significant: it is the priority used when two
/// files of the same kind share a basename.
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    raw_extensions: Vec<String>,
    jpeg_extensions: Vec<String>,
    include_hidden: bool,
}

impl ExtensionFilter {
    pub fn new(raw_extensions: &[String], jpeg_extensions: &[String]) -> Self {
        Self {
            raw_extensions: raw_extensions.iter().map(|e| normalize(e)).collect(),
            jpeg_extensions: jpeg_extensions.iter().map(|e| normalize(e)).collect(),
            include_hidden: false,
        }
    }

    /// Include hidden files (starting with .)
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Whether a file or directory name is hidden and should be skipped
    pub fn is_excluded_hidden(&self, path: &Path) -> bool {
        if self.include_hidden {
            return false;
        }
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
    }

    /// Classify a file by its extension, case-insensitively
    pub fn classify(&self, path: &Path) -> FileKind {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return FileKind::Other;
        };
        let ext = ext.to_lowercase();

        if self.raw_extensions.contains(&ext) {
            FileKind::Raw
        } else if self.jpeg_extensions.contains(&ext) {
            FileKind::Jpeg
        } else {
            FileKind::Other
        }
    }

    /// Position of the file's extension in its kind's list; lower wins.
    pub fn priority(&self, path: &Path) -> usize {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let list = match self.classify(path) {
            FileKind::Raw => &self.raw_extensions,
            FileKind::Jpeg => &self.jpeg_extensions,
            FileKind::Other => return usize::MAX,
        };
        list.iter().position(|e| *e == ext).unwrap_or(usize::MAX)
    }
}

fn normalize(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}
