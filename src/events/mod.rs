//! # Events Module
//!
//! Channel-based notifications so any UI (terminal, GUI) can follow
//! scanning, background enrichment, session changes and export progress.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Session(SessionEvent::CursorMoved { group_id, .. }) = event {
//!             println!("now showing {group_id}");
//!         }
//!     }
//! });
//!
//! session.set_events(sender);
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
