//! Signal composition pipeline

pub mod composer;
pub mod scoring;

pub use composer::{ComposerConfig, Composition, SignalComposer};
pub use scoring::ScoreWeights;
