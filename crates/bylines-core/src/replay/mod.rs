//! Change-log replay into normalized authorships.
//!
//! [`engine::Reconciler`] reconciles one owning aggregate at a time;
//! [`batch::reconcile_all`] walks every work version and collection in the
//! store and aggregates the per-owner outcomes into a [`batch::BatchReport`].

pub mod batch;
pub mod engine;

pub use batch::{BatchReport, reconcile_all};
pub use engine::{ReconcileOutcome, Reconciler};
