//! Adapters Layer
//!
//! Connects scenario runners to their callers:
//!
//! - **harness**: sequencing, variant mapping, repeated runs
//! - **report**: uniform textual reports for every outcome

pub mod harness;
pub mod report;

pub use harness::Harness;
pub use report::{Outcome, RepeatSummary, ScenarioReport};
