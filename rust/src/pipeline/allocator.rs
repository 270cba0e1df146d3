//! Placement of a single ready node into the stage-occupancy grid.

use crate::durations::DurationTable;
use crate::tree::{ExpressionTree, NodeId};
use crate::{log_changes, log_checks, log_debug};

use super::core::SchedulerError;
use super::grid::{EventKind, Tact};
use super::readiness::early_start;
use super::state::{Allocation, SessionState};

/// Issues ready nodes into the pipeline one at a time.
pub struct Allocator<'a> {
    tree: &'a ExpressionTree,
    durations: &'a DurationTable,
    verbosity: u8,
}

impl<'a> Allocator<'a> {
    pub fn new(tree: &'a ExpressionTree, durations: &'a DurationTable, verbosity: u8) -> Self {
        Self {
            tree,
            durations,
            verbosity,
        }
    }

    /// Allocate `node`, which must be ready, and advance the issue cursor.
    ///
    /// The node occupies `duration` tacts of every stage in turn. Each stage
    /// window is `max(duration, committed)` wide, where `committed` is the
    /// window width already agreed for the start tact; the unused remainder is
    /// filler. When the node needs a wider window than was committed there,
    /// stages after the first are shifted forward to make room.
    pub fn allocate(&self, state: &mut SessionState, node: NodeId) -> Result<Allocation, SchedulerError> {
        let verbosity = self.verbosity;
        // Constants are never issued
        let kind = self.tree.operator(node).ok_or(SchedulerError::NotReady(node))?;
        let early = early_start(self.tree, state, node).ok_or(SchedulerError::NotReady(node))?;
        let duration = self.durations.duration(kind)?;

        let start = self.issue_tact(state, early);
        state.grid.record_event(start, EventKind::Entry, node);

        let committed = state.grid.committed_at(start).unwrap_or(0);
        let ceiled = duration.max(committed);
        if committed != 0 && committed < duration {
            log_checks!(
                verbosity,
                "  Widening window at tact {} from {} to {} for {}",
                start,
                committed,
                ceiled,
                self.tree.label(node)
            );
            state.grid.shift_later_stages(start, ceiled - committed)?;
        }

        let filler = ceiled - duration;
        let mut pos = start;
        for stage in 0..state.grid.stages() {
            let window = state.grid.first_free_window(stage, pos, duration)?;
            if window != pos {
                log_checks!(
                    verbosity,
                    "  Stage {} busy at tact {}, {} stalls to {}",
                    stage,
                    pos,
                    self.tree.label(node),
                    window
                );
            }
            pos = window;
            for tact in pos..pos + duration {
                state.grid.occupy(stage, tact, node)?;
            }
            state.grid.commit(pos, ceiled);
            log_debug!(
                verbosity,
                "    Stage {}: {} occupies {}..{} (window {})",
                stage,
                self.tree.label(node),
                pos,
                pos + duration - 1,
                ceiled
            );
            pos += duration;
            for tact in pos..pos + filler {
                state.grid.mark_filler(stage, tact)?;
            }
            pos += filler;
        }

        let finish = pos - filler - 1;
        state.grid.record_event(finish, EventKind::Exit, node);

        let allocation = Allocation { start, finish };
        state.record(node, allocation)?;
        state.advance_cursor(start + duration);

        log_changes!(
            verbosity,
            "  Allocated {} start={} finish={} cursor={}",
            self.tree.label(node),
            start,
            finish,
            state.cursor
        );
        Ok(allocation)
    }

    /// Walk forward from the issue cursor in committed-window steps until the
    /// operands are available. An uncommitted tact jumps straight to `early`.
    fn issue_tact(&self, state: &SessionState, early: Tact) -> Tact {
        let mut start = state.cursor;
        while start < early {
            match state.grid.committed_at(start) {
                Some(width) => start += width,
                None => start = early,
            }
            log_debug!(self.verbosity, "    Cursor walk -> {}", start);
        }
        start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::grid::Cell;
    use crate::tree::OperatorKind;

    fn make_durations() -> DurationTable {
        DurationTable::new()
            .with(OperatorKind::Add, 2)
            .unwrap()
            .with(OperatorKind::Multiply, 4)
            .unwrap()
    }

    /// (2 + 3)
    fn make_single() -> (ExpressionTree, NodeId) {
        let mut b = ExpressionTree::builder();
        let two = b.constant(2.0);
        let three = b.constant(3.0);
        let add = b.operator(OperatorKind::Add, two, three);
        (b.build(add), add)
    }

    #[test]
    fn test_diagonal_occupation() {
        let (tree, add) = make_single();
        let durations = make_durations();
        let mut state = SessionState::new(tree.len(), 2, 32);

        let alloc = Allocator::new(&tree, &durations, 0)
            .allocate(&mut state, add)
            .unwrap();

        assert_eq!(alloc, Allocation { start: 0, finish: 3 });
        assert_eq!(state.grid.occupied_tacts(0, add), vec![0, 1]);
        assert_eq!(state.grid.occupied_tacts(1, add), vec![2, 3]);
        assert_eq!(state.grid.committed_at(0), Some(2));
        assert_eq!(state.grid.committed_at(2), Some(2));
        assert_eq!(state.cursor, 2);
        assert_eq!(state.grid.events_at(0)[0].kind, EventKind::Entry);
        assert_eq!(state.grid.events_at(3)[0].kind, EventKind::Exit);
    }

    #[test]
    fn test_narrow_node_in_wide_window_leaves_filler() {
        // (1 * 2) + (3 + 4): the multiply commits 4-wide windows, the inner add
        // issued into one of them uses 2 tacts and leaves 2 as filler.
        let mut b = ExpressionTree::builder();
        let c1 = b.constant(1.0);
        let c2 = b.constant(2.0);
        let mul = b.operator(OperatorKind::Multiply, c1, c2);
        let c3 = b.constant(3.0);
        let c4 = b.constant(4.0);
        let add = b.operator(OperatorKind::Add, c3, c4);
        let root = b.operator(OperatorKind::Add, mul, add);
        let tree = b.build(root);
        let durations = make_durations();
        let mut state = SessionState::new(tree.len(), 2, 32);
        let allocator = Allocator::new(&tree, &durations, 0);

        let m = allocator.allocate(&mut state, mul).unwrap();
        assert_eq!(m, Allocation { start: 0, finish: 7 });

        let a = allocator.allocate(&mut state, add).unwrap();
        assert_eq!(a, Allocation { start: 4, finish: 9 });
        assert_eq!(state.grid.occupied_tacts(0, add), vec![4, 5]);
        assert_eq!(state.grid.cell(0, 6), Cell::Filler);
        assert_eq!(state.grid.cell(0, 7), Cell::Filler);
        assert_eq!(state.grid.occupied_tacts(1, add), vec![8, 9]);
        assert_eq!(state.cursor, 6);

        // Cursor at 6 has no committed window, so it jumps to the operands' readiness
        let r = allocator.allocate(&mut state, root).unwrap();
        assert_eq!(r, Allocation { start: 10, finish: 13 });
    }

    #[test]
    fn test_unready_node_rejected() {
        let mut b = ExpressionTree::builder();
        let c1 = b.constant(1.0);
        let c2 = b.constant(2.0);
        let add = b.operator(OperatorKind::Add, c1, c2);
        let c3 = b.constant(3.0);
        let mul = b.operator(OperatorKind::Multiply, add, c3);
        let tree = b.build(mul);
        let durations = make_durations();
        let mut state = SessionState::new(tree.len(), 2, 32);

        let result = Allocator::new(&tree, &durations, 0).allocate(&mut state, mul);
        assert!(matches!(result, Err(SchedulerError::NotReady(n)) if n == mul));
        assert_eq!(state.cursor, 0);
    }

    #[test]
    fn test_constant_node_rejected() {
        let (tree, add) = make_single();
        let durations = make_durations();
        let mut state = SessionState::new(tree.len(), 2, 32);
        let allocator = Allocator::new(&tree, &durations, 0);
        let (left, _) = tree.children(add).unwrap();

        let result = allocator.allocate(&mut state, left);
        assert!(matches!(result, Err(SchedulerError::NotReady(n)) if n == left));
        assert_eq!(state.cursor, 0);
        assert!(state.order.is_empty());
    }

    #[test]
    fn test_grid_too_small() {
        let (tree, add) = make_single();
        let durations = make_durations();
        let mut state = SessionState::new(tree.len(), 2, 3);

        let result = Allocator::new(&tree, &durations, 0).allocate(&mut state, add);
        assert!(matches!(
            result,
            Err(SchedulerError::GridExhausted { capacity: 3, .. })
        ));
    }
}
