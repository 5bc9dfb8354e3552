//! # Enrichment Module
//!
//! Metadata extraction and blur scoring off the interactive path.
//!
//! The culling session is single-threaded; this pool runs the slow work on
//! a bounded rayon pool and hands results back over a channel. The owner
//! of the session drains results and applies them:
//!
//! ```rust,ignore
//! let pool = EnrichmentPool::builder().workers(4).build()?;
//! for group in session.groups() {
//!     pool.submit(group.files().clone());
//! }
//! for result in pool.wait_idle() {
//!     session.apply(result);
//! }
//! ```

mod pool;

pub use pool::{default_workers, EnrichmentPool, EnrichmentPoolBuilder};

use crate::core::cache::{Cached, FileStamp};
use crate::core::group::GroupId;
use crate::core::metadata::ExtractionResult;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation token for one submitted group
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn same_as(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

/// What was learned about a group
#[derive(Debug, Clone)]
pub enum EnrichmentKind {
    /// Metadata extracted from the group's files
    Metadata {
        result: ExtractionResult,
        source: PathBuf,
        stamp: FileStamp,
    },
    /// A sharpness score
    Blur(Cached<f64>),
    /// The step could not produce a value; the group stays pending
    Failed { reason: String },
    /// The task was cancelled before this step ran
    Cancelled,
}

/// A result produced by the worker pool, to be applied to the session
#[derive(Debug, Clone)]
pub struct Enrichment {
    pub group_id: GroupId,
    pub kind: EnrichmentKind,
}

impl Enrichment {
    pub fn new(group_id: GroupId, kind: EnrichmentKind) -> Self {
        Self { group_id, kind }
    }
}

/// Which steps to run for a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichRequest {
    pub metadata: bool,
    pub blur: bool,
}

impl EnrichRequest {
    pub const ALL: EnrichRequest = EnrichRequest {
        metadata: true,
        blur: true,
    };

    pub fn is_empty(&self) -> bool {
        !self.metadata && !self.blur
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
        assert!(token.same_as(&clone));
        assert!(!token.same_as(&CancellationToken::new()));
    }

    #[test]
    fn empty_request() {
        assert!(!EnrichRequest::ALL.is_empty());
        assert!(EnrichRequest {
            metadata: false,
            blur: false
        }
        .is_empty());
    }
}
