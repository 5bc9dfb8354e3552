//! # photo-cull
//!
//! A keyboard-driven photo culling engine.
//!
//! ## Core Philosophy
//! - **Never delete** - Culling only records decisions; files stay where they are
//! - **Pairs are one photo** - A RAW and its JPEG are rated and exported together
//! - **Safe to repeat** - Exports skip work that is already done
//!
//! ## Architecture
//! The library is split into a core engine (UI-agnostic) and presentation layers:
//! - `core` - Scanning, enrichment, the culling session and export
//! - `config` - TOML configuration
//! - `events` - Event-driven progress reporting (UI-ready)
//! - `error` - User-friendly error types

pub mod config;
pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use config::CullConfig;
pub use error::{CullError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point. `RUST_LOG` wins
/// over `default_directive` when set.
pub fn init_tracing(default_directive: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    // A subscriber may already be installed (tests, embedding apps).
    let _ = tracing::subscriber::set_global_default(subscriber);
}
