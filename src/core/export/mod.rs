//! # Export Module
//!
//! Turns the session's selection into side effects: backup copies and
//! darktable registration.
//!
//! ## Workflow
//! 1. **Plan** - [`ExportPlanner::plan`] derives an [`ExportPlan`] from the
//!    selected groups. Pure; nothing on disk is touched.
//! 2. **Execute** - [`ExportExecutor::execute`] checks the targets, then runs
//!    each action, skipping those whose effect is already in place.
//!
//! Re-running an export after a partial failure is the retry mechanism:
//! finished actions report `SkippedAlreadyDone`, failed ones run again.

mod darktable;
mod executor;
mod planner;
mod types;

pub use darktable::{
    CommandRegistrar, DarktableRegistrar, InMemoryLedger, RegistrationLedger, SqliteLedger,
};
pub use executor::ExportExecutor;
pub use planner::ExportPlanner;
pub use types::*;
