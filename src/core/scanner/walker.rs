//! Directory walking implementation using walkdir.

use super::filter::{ExtensionFilter, FileKind};
use super::grouping::{group_candidates, Candidate};
use super::{PhotoScanner, ScanResult, ScanWarning};
use crate::error::ScanError;
use crate::events::{Event, EventSender, ScanEvent, ScanProgress};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Configuration for the directory scanner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// RAW extensions in priority order (earlier wins a basename collision)
    pub raw_extensions: Vec<String>,
    /// JPEG extensions in priority order
    pub jpeg_extensions: Vec<String>,
    /// Descend into subdirectories
    pub recursive: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            raw_extensions: ["arw", "cr2", "cr3", "nef", "orf", "raf", "rw2", "dng"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            jpeg_extensions: ["jpg", "jpeg", "jpe", "jif", "jfif"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            recursive: true,
            include_hidden: false,
            follow_symlinks: false,
        }
    }
}

/// Scanner implementation using the walkdir crate
pub struct WalkDirScanner {
    config: ScanConfig,
    filter: ExtensionFilter,
}

impl WalkDirScanner {
    /// Create a new scanner with the given configuration
    pub fn new(config: ScanConfig) -> Self {
        let filter = ExtensionFilter::new(&config.raw_extensions, &config.jpeg_extensions)
            .with_hidden(config.include_hidden);
        Self { config, filter }
    }

    /// Fail early if the root itself is unusable
    fn check_root(root: &Path) -> Result<(), ScanError> {
        if !root.exists() {
            return Err(ScanError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory {
                path: root.to_path_buf(),
            });
        }
        fs::read_dir(root).map_err(|e| match e.kind() {
            io::ErrorKind::PermissionDenied => ScanError::PermissionDenied {
                path: root.to_path_buf(),
            },
            _ => ScanError::ReadDirectory {
                path: root.to_path_buf(),
                source: e,
            },
        })?;
        Ok(())
    }

    fn walk(
        &self,
        root: &Path,
        events: &EventSender,
    ) -> (Vec<Candidate>, Vec<ScanWarning>) {
        let mut candidates = Vec::new();
        let mut warnings = Vec::new();
        let mut directories_scanned = 0;

        let mut walker = WalkDir::new(root).follow_links(self.config.follow_symlinks);
        if !self.config.recursive {
            walker = walker.max_depth(1);
        }

        // filter_entry prunes hidden directories instead of only skipping them
        let entries = walker
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.filter.is_excluded_hidden(entry.path()));

        for entry_result in entries {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                    let reason = e.to_string();
                    warn!("Skipping unreadable {}: {}", path.display(), reason);
                    events.send(Event::Scan(ScanEvent::Warning {
                        path: path.clone(),
                        message: reason.clone(),
                    }));
                    warnings.push(ScanWarning::Unreadable { path, reason });
                    continue;
                }
            };

            let path = entry.path();

            if entry.file_type().is_dir() {
                directories_scanned += 1;
                events.send(Event::Scan(ScanEvent::Progress(ScanProgress {
                    directories_scanned,
                    files_found: candidates.len(),
                    current_path: path.to_path_buf(),
                })));
                continue;
            }

            if !entry.file_type().is_file() {
                continue;
            }

            let kind = self.filter.classify(path);
            if kind == FileKind::Other {
                continue;
            }

            let Some(basename) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            let relative_dir = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(Path::to_path_buf)
                .unwrap_or_default();

            debug!("Found {:?} file {}", kind, path.display());
            candidates.push(Candidate {
                path: path.to_path_buf(),
                relative_dir,
                basename,
                kind,
            });
        }

        (candidates, warnings)
    }
}

impl PhotoScanner for WalkDirScanner {
    fn scan(&self, root: &Path) -> Result<ScanResult, ScanError> {
        self.scan_with_events(root, &crate::events::null_sender())
    }

    fn scan_with_events(&self, root: &Path, events: &EventSender) -> Result<ScanResult, ScanError> {
        Self::check_root(root)?;

        info!("Scanning {}", root.display());
        events.send(Event::Scan(ScanEvent::Started {
            root: root.to_path_buf(),
        }));

        let (candidates, mut warnings) = self.walk(root, events);
        let files_found = candidates.len();

        let (groups, duplicates) = group_candidates(candidates, &self.filter);
        for duplicate in &duplicates {
            warn!("{}", duplicate);
            events.send(Event::Scan(ScanEvent::Warning {
                path: duplicate.path().to_path_buf(),
                message: duplicate.to_string(),
            }));
        }
        warnings.extend(duplicates);

        info!(
            "Scan complete: {} groups from {} files ({} warnings)",
            groups.len(),
            files_found,
            warnings.len()
        );
        events.send(Event::Scan(ScanEvent::Completed {
            total_groups: groups.len(),
            total_files: files_found,
        }));

        Ok(ScanResult {
            root: root.to_path_buf(),
            groups,
            warnings,
            files_found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventChannel;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = File::create(&path).unwrap();
        file.write_all(&[0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
        path
    }

    fn ids(result: &ScanResult) -> Vec<String> {
        result.groups.iter().map(|g| g.id().to_string()).collect()
    }

    #[test]
    fn scan_empty_directory_returns_no_groups() {
        let temp_dir = TempDir::new().unwrap();
        let scanner = WalkDirScanner::new(ScanConfig::default());

        let result = scanner.scan(temp_dir.path()).unwrap();

        assert!(result.groups.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn scan_pairs_raw_with_jpeg() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "IMG_001.CR2");
        create_file(temp_dir.path(), "IMG_001.JPG");
        create_file(temp_dir.path(), "IMG_002.JPG");

        let scanner = WalkDirScanner::new(ScanConfig::default());
        let result = scanner.scan(temp_dir.path()).unwrap();

        assert_eq!(ids(&result), vec!["IMG_001", "IMG_002"]);
        assert!(result.groups[0].is_pair());
        assert!(result.groups[1].raw_path().is_none());
        assert_eq!(result.files_found, 3);
    }

    #[test]
    fn scan_ignores_other_files() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "IMG_001.JPG");
        create_file(temp_dir.path(), "IMG_001.xmp");
        create_file(temp_dir.path(), "notes.txt");

        let scanner = WalkDirScanner::new(ScanConfig::default());
        let result = scanner.scan(temp_dir.path()).unwrap();

        assert_eq!(ids(&result), vec!["IMG_001"]);
    }

    #[test]
    fn scan_traverses_nested_directories() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "day2/IMG_001.JPG");
        create_file(temp_dir.path(), "day1/IMG_001.JPG");
        create_file(temp_dir.path(), "IMG_000.NEF");

        let scanner = WalkDirScanner::new(ScanConfig::default());
        let result = scanner.scan(temp_dir.path()).unwrap();

        assert_eq!(ids(&result), vec!["IMG_000", "day1/IMG_001", "day2/IMG_001"]);
    }

    #[test]
    fn non_recursive_scan_stays_at_top_level() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "IMG_001.JPG");
        create_file(temp_dir.path(), "sub/IMG_002.JPG");

        let config = ScanConfig {
            recursive: false,
            ..Default::default()
        };
        let result = WalkDirScanner::new(config).scan(temp_dir.path()).unwrap();

        assert_eq!(ids(&result), vec!["IMG_001"]);
    }

    #[test]
    fn scan_skips_hidden_files_and_directories_by_default() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "visible.jpg");
        create_file(temp_dir.path(), ".hidden.jpg");
        create_file(temp_dir.path(), ".cache/inside.jpg");

        let scanner = WalkDirScanner::new(ScanConfig::default());
        let result = scanner.scan(temp_dir.path()).unwrap();
        assert_eq!(ids(&result), vec!["visible"]);

        let config = ScanConfig {
            include_hidden: true,
            ..Default::default()
        };
        let result = WalkDirScanner::new(config).scan(temp_dir.path()).unwrap();
        assert_eq!(result.groups.len(), 3);
    }

    #[test]
    fn duplicate_raw_candidates_produce_warning() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "IMG_001.NEF");
        create_file(temp_dir.path(), "IMG_001.CR2");

        let scanner = WalkDirScanner::new(ScanConfig::default());
        let result = scanner.scan(temp_dir.path()).unwrap();

        // cr2 precedes nef in the default priority list
        assert!(result.groups[0].raw_path().unwrap().ends_with("IMG_001.CR2"));
        assert!(matches!(
            result.warnings.as_slice(),
            [ScanWarning::DuplicateCandidate { .. }]
        ));
    }

    #[test]
    fn repeated_scans_are_identical() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["b.JPG", "a.CR2", "c/a.JPG", "a.JPG"] {
            create_file(temp_dir.path(), name);
        }

        let scanner = WalkDirScanner::new(ScanConfig::default());
        let first = scanner.scan(temp_dir.path()).unwrap();
        let second = scanner.scan(temp_dir.path()).unwrap();

        assert_eq!(first.groups, second.groups);
    }

    #[test]
    fn missing_root_is_fatal() {
        let scanner = WalkDirScanner::new(ScanConfig::default());
        let result = scanner.scan(Path::new("/nonexistent/path/12345"));
        assert!(matches!(result, Err(ScanError::DirectoryNotFound { .. })));
    }

    #[test]
    fn file_root_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let file = create_file(temp_dir.path(), "IMG_001.JPG");

        let scanner = WalkDirScanner::new(ScanConfig::default());
        assert!(matches!(
            scanner.scan(&file),
            Err(ScanError::NotADirectory { .. })
        ));
    }

    #[test]
    fn scan_reports_start_and_completion_events() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "IMG_001.JPG");

        let (sender, receiver) = EventChannel::new();
        let scanner = WalkDirScanner::new(ScanConfig::default());
        scanner.scan_with_events(temp_dir.path(), &sender).unwrap();

        let events: Vec<_> = receiver.try_iter().collect();
        assert!(matches!(events.first(), Some(Event::Scan(ScanEvent::Started { .. }))));
        assert!(matches!(
            events.last(),
            Some(Event::Scan(ScanEvent::Completed { total_groups: 1, total_files: 1 }))
        ));
    }
}
