//! Execution layer - scoring, priority buckets, batch selection and the
//! virtual-clock simulation.

#![warn(missing_docs)]

pub mod score;
pub mod bucket;
pub mod selector;
pub mod engine;

pub use score::{policy_from_config, NearestDeadline, ScoringPolicy, WeightedScore};
pub use bucket::PriorityBuckets;
pub use selector::{BatchSelector, Candidate};
pub use engine::{ExecutionOutcome, Scheduler, SimulationState, StepResult};
