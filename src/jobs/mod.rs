//! Job queue system for the signal pipeline

pub mod context;
pub mod handlers;
pub mod types;

pub use context::JobContext;
pub use types::{
    ComposeSignalJob, EvaluateOutcomesJob, FetchCandlesJob, PurgeSignalsJob, StoreSignalJob,
};
