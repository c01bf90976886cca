//! dropsync - resumable, rate-limited order ingestion for connected
//! storefronts.
//!
//! The library synchronizes a shop's orders from a cursor-paginated remote
//! API into a local database, surviving crashes, transient remote
//! failures, and user cancellation. One [`sync::SyncService`] per process
//! orchestrates runs for any number of shops; all runs share a single
//! [`scheduler::RequestScheduler`] because the remote rate ceiling is a
//! per-credential budget.
//!
//! # Features
//!
//! - `rest` - a reqwest-backed [`remote::PageFetcher`] for JSON order
//!   endpoints.
//! - `migrate` - database migration support; enables
//!   [`connect_and_migrate`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use dropsync::{connect_and_migrate, OrmRecordStore, OrmStatusStore};
//! use dropsync::scheduler::RequestScheduler;
//! use dropsync::sync::SyncService;
//!
//! let db = Arc::new(connect_and_migrate("sqlite://dropsync.db?mode=rwc").await?);
//! let service = SyncService::new(
//!     RequestScheduler::with_defaults(),
//!     fetcher,
//!     Arc::new(OrmRecordStore::new(Arc::clone(&db))),
//!     Arc::new(OrmStatusStore::new(db)),
//! );
//!
//! service.start_sync("shop.example", false);
//! ```

pub mod db;
pub mod entity;
pub mod remote;
pub mod scheduler;
pub mod store;
pub mod sync;

#[cfg(feature = "migrate")]
pub mod migration;

#[cfg(feature = "rest")]
pub mod rest;

pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::sync_phase::SyncPhase;
pub use remote::{OrderPage, PageFetcher, PageRequest, RemoteError, RemoteOrder};
pub use scheduler::{RequestScheduler, SchedulerConfig};
pub use store::{
    OrmRecordStore, OrmStatusStore, RecordStore, StatusPatch, StoreError, SyncStatus,
    SyncStatusStore,
};
pub use sync::{
    FullSyncStatus, ListenerId, StartOutcome, Subscription, SyncError, SyncEvent, SyncEventKind,
    SyncService,
};
