//! Parallel-versus-sequential performance figures for a finished schedule.

use std::fmt;

use pyo3::prelude::*;

use crate::durations::DurationTable;
use crate::pipeline::SchedulerError;
use crate::tree::{ExpressionTree, NodeKind};

/// Completion times of one scheduling run and the ratios derived from them.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationStats {
    /// Tact at which the root result is observable (`root.finish + 1`).
    #[pyo3(get)]
    pub parallel_time: u64,
    /// Cost with no overlap anywhere in the tree, plus two tacts.
    #[pyo3(get)]
    pub sequential_time: u64,
    #[pyo3(get)]
    pub stages: u64,
}

impl AllocationStats {
    pub fn new(parallel_time: u64, sequential_time: u64, stages: u64) -> Self {
        Self {
            parallel_time,
            sequential_time,
            stages,
        }
    }
}

#[pymethods]
impl AllocationStats {
    /// `sequential_time / parallel_time`
    #[getter]
    pub fn speedup(&self) -> f64 {
        self.sequential_time as f64 / self.parallel_time as f64
    }

    /// `speedup / stages`
    #[getter]
    pub fn efficiency(&self) -> f64 {
        self.speedup() / self.stages as f64
    }

    fn __repr__(&self) -> String {
        format!(
            "AllocationStats(parallel_time={}, sequential_time={}, stages={}, speedup={:.4}, efficiency={:.4})",
            self.parallel_time,
            self.sequential_time,
            self.stages,
            self.speedup(),
            self.efficiency()
        )
    }

    fn __str__(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AllocationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sequential time {}", self.sequential_time)?;
        writeln!(f, "Parallel time {}", self.parallel_time)?;
        writeln!(f, "Stages {}", self.stages)?;
        writeln!(f, "Speedup {:.4}", self.speedup())?;
        write!(f, "Efficiency {:.4}", self.efficiency())
    }
}

/// Sum of `duration * stages` over every operator in the tree.
///
/// Excludes the two-tact result overhead; callers add it when reporting.
pub fn sequential_baseline(
    tree: &ExpressionTree,
    durations: &DurationTable,
    stages: u64,
) -> Result<u64, SchedulerError> {
    let mut total = 0;
    let mut stack = vec![tree.root()];
    while let Some(node) = stack.pop() {
        let Some(n) = tree.node(node) else {
            continue;
        };
        if let NodeKind::Operator { kind, left, right } = n.kind {
            total += durations.duration(kind)? * stages;
            stack.extend([right, left].into_iter().flatten());
        }
    }
    Ok(total)
}
