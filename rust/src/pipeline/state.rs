//! Per-run scheduling session state.

use crate::tree::NodeId;

use super::core::SchedulerError;
use super::grid::{StageGrid, Tact};

/// Interval a node occupies in the pipeline, from stage-0 entry to the last
/// tact of its final stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Allocation {
    pub start: Tact,
    pub finish: Tact,
}

/// Everything a single scheduling run mutates.
///
/// Created fresh for each run and never shared, so independent runs cannot
/// interfere with each other.
#[derive(Clone, Debug)]
pub struct SessionState {
    /// Earliest tact at which the next node may enter stage 0.
    pub cursor: Tact,
    pub grid: StageGrid,
    /// Allocation per arena slot; `None` until the node is issued.
    allocations: Vec<Option<Allocation>>,
    /// Nodes in the order they were issued.
    pub order: Vec<NodeId>,
    /// Cursor value after every issue, starting with the initial value.
    pub cursor_trace: Vec<Tact>,
}

impl SessionState {
    pub fn new(node_count: usize, stages: usize, capacity: usize) -> Self {
        Self {
            cursor: 0,
            grid: StageGrid::new(stages, capacity),
            allocations: vec![None; node_count],
            order: Vec::new(),
            cursor_trace: vec![0],
        }
    }

    pub fn allocation(&self, node: NodeId) -> Option<Allocation> {
        self.allocations.get(node).copied().flatten()
    }

    pub fn is_allocated(&self, node: NodeId) -> bool {
        self.allocation(node).is_some()
    }

    /// Record a node's interval. Each node may be recorded once.
    pub fn record(&mut self, node: NodeId, allocation: Allocation) -> Result<(), SchedulerError> {
        match self.allocations.get_mut(node) {
            Some(slot) if slot.is_none() => {
                *slot = Some(allocation);
                self.order.push(node);
                Ok(())
            }
            _ => Err(SchedulerError::AlreadyAllocated(node)),
        }
    }

    /// Move the issue cursor; it never retreats.
    pub fn advance_cursor(&mut self, to: Tact) {
        self.cursor = self.cursor.max(to);
        self.cursor_trace.push(self.cursor);
    }

    pub fn into_parts(self) -> (StageGrid, Vec<Option<Allocation>>, Vec<NodeId>, Vec<Tact>) {
        (self.grid, self.allocations, self.order, self.cursor_trace)
    }
}
