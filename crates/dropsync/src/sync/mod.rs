//! Sync engine: run orchestration, progress broadcasting, event types.
//!
//! # Module Structure
//!
//! - [`types`] - events, outcomes, and errors
//! - [`hub`] - per-shop progress broadcast registry
//! - [`service`] - the run registry and caller surface
//! - `runner` - the page-walk state machine for one run
//!
//! # Example
//!
//! ```ignore
//! use dropsync::scheduler::RequestScheduler;
//! use dropsync::sync::SyncService;
//!
//! let service = SyncService::new(
//!     RequestScheduler::with_defaults(),
//!     fetcher,
//!     records,
//!     status,
//! );
//!
//! let mut subscription = service.subscribe("shop.example").await?;
//! service.start_sync("shop.example", false);
//! while let Some(event) = subscription.events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

pub mod hub;
mod runner;
mod service;
mod types;

pub use hub::{ListenerId, ProgressHub};
pub use service::{Subscription, SyncService};
pub use types::{FullSyncStatus, StartOutcome, SyncError, SyncEvent, SyncEventKind};
