//! bylines-core library.
//!
//! Rebuilds normalized authorship records and version-history timelines
//! from an append-only change log plus the live legacy tables.
//!
//! # Conventions
//!
//! - **Errors**: `anyhow::Result` at operation boundaries; data problems in
//!   the replay path are collected, not propagated.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `error!`, `debug!`).

pub mod actor;
pub mod error;
pub mod event;
pub mod history;
pub mod model;
pub mod replay;
pub mod store;

pub use actor::{Actor, ActorResolver, NameCache, UNKNOWN_USER};
pub use error::ErrorCode;
pub use event::{ChangeEvent, EventKind, Field, OwnerRef, OwnerType, SubjectType};
pub use history::Timeline;
pub use model::{Authorship, Collection, CreatorLink, WorkVersion};
pub use replay::{BatchReport, ReconcileOutcome, Reconciler, reconcile_all};
