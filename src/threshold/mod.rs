//! Adaptive confidence threshold gating signal execution

pub mod dynamic;
pub mod store;

pub use dynamic::{
    AdjustmentReport, Decision, DynamicThreshold, ExecutionContext, OutcomeSource, ThresholdConfig,
};
pub use store::{InMemoryThresholdStore, RedisThresholdStore, ThresholdStore};
