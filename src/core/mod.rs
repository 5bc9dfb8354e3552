//! # Core Module
//!
//! The UI-agnostic culling engine.
//!
//! ## Modules
//! - `scanner` - Discovers RAW/JPEG files and pairs them into groups
//! - `group` - Photo groups, identities and culling decisions
//! - `metadata` - Extracts EXIF metadata through a chain of strategies
//! - `preview` - Decodes and downscales preview images
//! - `blur` - Scores sharpness, flags blurry shots
//! - `cache` - Validity-keyed caching of derived values
//! - `enrich` - Background worker pool for metadata and blur
//! - `session` - The culling state machine and its persistence
//! - `export` - Backup copies and darktable registration

pub mod blur;
pub mod cache;
pub mod enrich;
pub mod export;
pub mod group;
pub mod metadata;
pub mod preview;
pub mod scanner;
pub mod session;

// Re-export commonly used types
pub use blur::{is_blurry, BlurScorer};
pub use enrich::{Enrichment, EnrichmentPool};
pub use export::{ExecutionReport, ExportExecutor, ExportPlan, ExportPlanner};
pub use group::{Decision, GroupFiles, GroupId, PhotoGroup, Rating};
pub use metadata::{MetadataExtractor, PhotoMetadata};
pub use scanner::{ScanResult, WalkDirScanner};
pub use session::{CullingSession, SessionSnapshot, SessionStore};
