//! Request pipeline: compose a plan from a config, execute it, restore the
//! engine baseline.

pub mod compose;
pub mod orchestrate;
pub mod plan;

pub use compose::compose;
pub use orchestrate::run;
pub use plan::{ExecutionPlan, StageKind, StageParams, REFINEMENT_STRENGTH};
