//! Result records handed to the presentation layer.

use pyo3::prelude::*;

use crate::pipeline::PipelineSchedule;
use crate::stats::AllocationStats;
use crate::tree::{ExpressionTree, NodeId};

/// An operator node with its pipeline interval.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledNode {
    #[pyo3(get)]
    pub node_id: NodeId,
    #[pyo3(get)]
    pub operator: String,
    #[pyo3(get)]
    pub start: u64,
    #[pyo3(get)]
    pub finish: u64,
}

#[pymethods]
impl ScheduledNode {
    fn __repr__(&self) -> String {
        format!(
            "ScheduledNode(node_id={}, operator={:?}, start={}, finish={})",
            self.node_id, self.operator, self.start, self.finish
        )
    }
}

/// Everything a caller needs to display a finished schedule.
#[pyclass]
#[derive(Clone, Debug)]
pub struct ScheduleResult {
    /// Operator nodes in issue order
    #[pyo3(get)]
    pub scheduled_nodes: Vec<ScheduledNode>,
    #[pyo3(get)]
    pub stats: AllocationStats,
    /// Rendered stage-occupancy table
    #[pyo3(get)]
    pub grid: String,
    /// Arithmetic value of the expression
    #[pyo3(get)]
    pub value: f64,
}

impl ScheduleResult {
    pub fn from_schedule(tree: &ExpressionTree, schedule: &PipelineSchedule, value: f64) -> Self {
        let scheduled_nodes = schedule
            .allocations()
            .map(|(node, alloc)| ScheduledNode {
                node_id: node,
                operator: tree
                    .operator(node)
                    .map(|k| k.symbol().to_string())
                    .unwrap_or_default(),
                start: alloc.start,
                finish: alloc.finish,
            })
            .collect();
        Self {
            scheduled_nodes,
            stats: schedule.stats.clone(),
            grid: schedule.render_grid(tree, None),
            value,
        }
    }
}

#[pymethods]
impl ScheduleResult {
    fn __repr__(&self) -> String {
        format!(
            "ScheduleResult(nodes={}, parallel_time={}, sequential_time={})",
            self.scheduled_nodes.len(),
            self.stats.parallel_time,
            self.stats.sequential_time
        )
    }
}
