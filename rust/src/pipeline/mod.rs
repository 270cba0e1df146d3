//! Pipeline scheduler: single-issue list scheduling of an expression tree onto a
//! fixed number of sequential stages.
//!
//! The list scheduler in [`core`] picks one ready node per round; the
//! [`allocator`] places it into the [`grid`], harmonising stage-window widths
//! as it goes.

mod allocator;
mod core;
mod grid;
mod readiness;
mod state;

pub use allocator::Allocator;
pub use self::core::{PipelineSchedule, PipelineScheduler, SchedulerError, MAX_GRID_CELLS};
pub use grid::{Cell, EventKind, PipelineEvent, StageGrid, Tact};
pub use readiness::{early_start, operand_ready, seed_candidates};
pub use state::{Allocation, SessionState};
