//! # Configuration Module
//!
//! TOML configuration for the culling engine.
//!
//! Looked up from (first match wins):
//! - an explicit `--config <FILE>` path (must exist)
//! - XDG config: `~/.config/photo-cull/config.toml`
//! - built-in defaults
//!
//! Unknown keys are ignored and missing keys take their defaults, so a
//! config file only needs to mention what it changes:
//!
//! ```toml
//! [culling]
//! blur_threshold = 150.0
//!
//! [export]
//! backup_targets = ["~/Backup/photos", "/mnt/nas/photos"]
//!
//! [darktable]
//! enabled = false
//! ```

use crate::core::export::ExportConfig;
use crate::core::scanner::ScanConfig;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Top-level configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullConfig {
    /// File discovery and RAW/JPEG classification
    pub scan: ScanConfig,
    /// Culling behaviour
    pub culling: CullingConfig,
    /// Cursor movement
    pub navigation: NavigationConfig,
    /// Blur scoring
    pub blur: BlurConfig,
    /// Backup export
    pub export: ExportSection,
    /// Darktable hand-off
    pub darktable: DarktableConfig,
    /// Background enrichment workers
    pub enrich: EnrichConfig,
}

/// Culling behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingConfig {
    /// Scores below this are flagged blurry (higher = stricter)
    pub blur_threshold: f64,
    /// Move to the next photo after a rating or rejection
    pub auto_advance: bool,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            blur_threshold: 100.0,
            auto_advance: true,
        }
    }
}

/// Cursor movement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Wrap around at either end instead of clamping
    pub circular: bool,
}

/// Blur scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurConfig {
    /// Longest edge the preview is resized to before scoring
    pub analysis_size: u32,
    /// Persistent score cache (None = in-memory for this session only)
    pub cache_path: Option<PathBuf>,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            analysis_size: 512,
            cache_path: None,
        }
    }
}

/// Backup export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSection {
    /// Backup roots, in the order they are written
    pub backup_targets: Vec<PathBuf>,
    /// Compare content checksums, not only sizes, before skipping a copy
    pub verify_checksum: bool,
}

/// Darktable hand-off
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DarktableConfig {
    pub enabled: bool,
    pub executable: String,
    /// Where registrations are remembered (None = default cache location)
    pub ledger_path: Option<PathBuf>,
}

impl Default for DarktableConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            executable: "darktable".to_string(),
            ledger_path: None,
        }
    }
}

/// Background enrichment workers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    /// Worker threads (None = available parallelism, capped at 4)
    pub workers: Option<usize>,
}

impl CullConfig {
    /// Load configuration from an explicit file, the XDG location, or defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match xdg_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                Some(path) => {
                    debug!("No config at {}, using defaults", path.display());
                    Self::default()
                }
                None => Self::default(),
            },
        };

        config.normalized().validated()
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loading config: {}", path.display());
        Self::from_toml(&content).map_err(|reason| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Lowercase extensions, strip leading dots, expand `~` in paths.
    pub fn normalized(mut self) -> Self {
        self.scan.raw_extensions = normalize_extensions(&self.scan.raw_extensions);
        self.scan.jpeg_extensions = normalize_extensions(&self.scan.jpeg_extensions);
        self.export.backup_targets = self
            .export
            .backup_targets
            .iter()
            .map(|p| expand_home(p))
            .collect();
        self.blur.cache_path = self.blur.cache_path.as_deref().map(expand_home);
        self.darktable.ledger_path = self.darktable.ledger_path.as_deref().map(expand_home);
        self
    }

    /// Check that values are usable.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let threshold = self.culling.blur_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "culling.blur_threshold must be a non-negative number, got {threshold}"
            )));
        }
        if self.blur.analysis_size < 3 {
            return Err(ConfigError::Invalid(format!(
                "blur.analysis_size must be at least 3, got {}",
                self.blur.analysis_size
            )));
        }
        if self.scan.raw_extensions.is_empty() && self.scan.jpeg_extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "scan.raw_extensions and scan.jpeg_extensions are both empty".to_string(),
            ));
        }
        if let Some(ext) = self
            .scan
            .raw_extensions
            .iter()
            .find(|e| self.scan.jpeg_extensions.contains(e))
        {
            return Err(ConfigError::Invalid(format!(
                "extension '{ext}' is listed as both RAW and JPEG"
            )));
        }
        if self.enrich.workers == Some(0) {
            return Err(ConfigError::Invalid(
                "enrich.workers must be at least 1".to_string(),
            ));
        }
        if self.darktable.enabled && self.darktable.executable.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "darktable.executable must not be empty".to_string(),
            ));
        }
        Ok(self)
    }

    /// The options the export planner consumes.
    pub fn export_config(&self) -> ExportConfig {
        ExportConfig {
            backup_targets: self.export.backup_targets.clone(),
            verify_checksum: self.export.verify_checksum,
            darktable_enabled: self.darktable.enabled,
        }
    }

    /// Worker thread count for the enrichment pool.
    pub fn worker_count(&self) -> usize {
        self.enrich
            .workers
            .unwrap_or_else(crate::core::enrich::default_workers)
    }

    /// Location of the darktable registration ledger.
    pub fn ledger_path(&self) -> PathBuf {
        self.darktable.ledger_path.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("photo-cull")
                .join("darktable.db")
        })
    }
}

/// XDG config file path
fn xdg_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("photo-cull").join("config.toml"))
}

fn normalize_extensions(extensions: &[String]) -> Vec<String> {
    let mut seen = Vec::with_capacity(extensions.len());
    for ext in extensions {
        let ext = ext.trim().trim_start_matches('.').to_lowercase();
        if !ext.is_empty() && !seen.contains(&ext) {
            seen.push(ext);
        }
    }
    seen
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
