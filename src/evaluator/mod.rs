//! Signal outcome evaluation

pub mod outcome;

pub use outcome::{evaluate, OutcomeResolution};
