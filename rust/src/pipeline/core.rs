//! List scheduler driving allocation of an expression tree onto the pipeline.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::durations::DurationTable;
use crate::sorting::{sort_candidates, CandidateKey};
use crate::stats::{sequential_baseline, AllocationStats};
use crate::tree::{ExpressionTree, NodeId, TreeError};
use crate::{log_changes, log_checks};

use super::allocator::Allocator;
use super::grid::{Cell, StageGrid, Tact};
use super::readiness::{early_start, is_ready, seed_candidates};
use super::state::{Allocation, SessionState};

/// Upper bound on `stages * capacity` for one run's grid.
pub const MAX_GRID_CELLS: u64 = 1 << 22;

/// Errors that can occur during scheduling.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Malformed expression tree: {0}")]
    MalformedTree(#[from] TreeError),
    #[error("Unknown operator kind: {0}")]
    UnknownOperatorKind(String),
    #[error("Stage grid exhausted: capacity {capacity} tacts, needed {required}")]
    GridExhausted { capacity: Tact, required: Tact },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Expression contains no operators to schedule")]
    EmptyExpression,
    #[error("Node {0} allocated more than once")]
    AlreadyAllocated(NodeId),
    #[error("Scheduling stopped after {allocated} of {expected} operators")]
    Incomplete { allocated: usize, expected: usize },
    #[error("Node {0} is not an operator with both operands allocated")]
    NotReady(NodeId),
    #[error("Stage {stage} tact {tact} already holds node {occupant}, cannot place node {node}")]
    CellConflict {
        stage: usize,
        tact: Tact,
        occupant: NodeId,
        node: NodeId,
    },
}

/// Outcome of a completed scheduling run.
#[derive(Clone, Debug)]
pub struct PipelineSchedule {
    pub grid: StageGrid,
    allocations: Vec<Option<Allocation>>,
    /// Operator nodes in issue order; the root is last.
    pub order: Vec<NodeId>,
    /// Issue cursor after every allocation, starting from 0.
    pub cursor_trace: Vec<Tact>,
    pub stats: AllocationStats,
}

impl PipelineSchedule {
    pub fn allocation(&self, node: NodeId) -> Option<Allocation> {
        self.allocations.get(node).copied().flatten()
    }

    /// `(node, allocation)` pairs in issue order.
    pub fn allocations(&self) -> impl Iterator<Item = (NodeId, Allocation)> + '_ {
        self.order
            .iter()
            .filter_map(|&node| self.allocation(node).map(|a| (node, a)))
    }

    /// Text table of the first `rows` tacts: the event column (`R` entry,
    /// `W` exit, `#` nothing) followed by one column per stage.
    pub fn render_grid(&self, tree: &ExpressionTree, rows: Option<Tact>) -> String {
        let rows = rows.unwrap_or_else(|| self.grid.used_tacts());
        let mut out = format!("{:<5}{:<5}", "", "M");
        for stage in 0..self.grid.stages() {
            out.push_str(&format!("{:<7}", format!("T{}", stage + 1)));
        }
        out.push('\n');

        for tact in 0..rows {
            let marker = match self.grid.events_at(tact).last() {
                Some(event) => event.kind.marker(),
                None => "#",
            };
            out.push_str(&format!("{:<5}{:<7}", tact + 1, marker));
            for stage in 0..self.grid.stages() {
                let label = match self.grid.cell(stage, tact) {
                    Cell::Occupied(node) => tree.label(node),
                    Cell::Empty | Cell::Filler => "#".to_string(),
                };
                out.push_str(&format!("{:<7}", label));
            }
            out.push('\n');
        }
        out
    }
}

/// Single-issue list scheduler.
///
/// Each round sorts the current candidates by [`CandidateKey`], issues only
/// the first one, and carries the rest forward together with any parent the
/// issue made ready.
pub struct PipelineScheduler<'a> {
    tree: &'a ExpressionTree,
    durations: &'a DurationTable,
    stages: u64,
    capacity: u64,
    verbosity: u8,
}

impl<'a> PipelineScheduler<'a> {
    pub fn new(
        tree: &'a ExpressionTree,
        durations: &'a DurationTable,
        stages: u64,
        capacity: u64,
    ) -> Self {
        Self {
            tree,
            durations,
            stages,
            capacity,
            verbosity: 0,
        }
    }

    /// Build a scheduler using the stage count, capacity and verbosity of `config`.
    pub fn from_config(
        tree: &'a ExpressionTree,
        durations: &'a DurationTable,
        config: &PipelineConfig,
    ) -> Self {
        Self::new(tree, durations, config.stages, config.max_tacts).with_verbosity(config.verbosity)
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Stage count and tact capacity as grid dimensions.
    ///
    /// The grid stores every (stage, tact) cell up front, so the product must
    /// fit in memory and stay at or below [`MAX_GRID_CELLS`].
    fn grid_dimensions(&self) -> Result<(usize, usize), SchedulerError> {
        let too_large = || {
            SchedulerError::InvalidConfig(format!(
                "grid of {} stages x {} tacts exceeds {} cells",
                self.stages, self.capacity, MAX_GRID_CELLS
            ))
        };
        let cells = self.stages.checked_mul(self.capacity).ok_or_else(too_large)?;
        if cells > MAX_GRID_CELLS {
            return Err(too_large());
        }
        let stages = usize::try_from(self.stages).map_err(|_| too_large())?;
        let capacity = usize::try_from(self.capacity).map_err(|_| too_large())?;
        Ok((stages, capacity))
    }

    /// Check every precondition before touching any scheduling state.
    fn validate(&self) -> Result<(), SchedulerError> {
        if self.stages == 0 {
            return Err(SchedulerError::InvalidConfig(
                "stage count must be at least 1".to_string(),
            ));
        }
        if self.capacity == 0 {
            return Err(SchedulerError::InvalidConfig(
                "grid capacity must be at least 1 tact".to_string(),
            ));
        }
        self.grid_dimensions()?;
        self.tree.validate()?;
        if self.tree.is_constant(self.tree.root()) {
            return Err(SchedulerError::EmptyExpression);
        }
        for node in self.tree.operator_ids() {
            if let Some(kind) = self.tree.operator(node) {
                self.durations.duration(kind)?;
            }
        }
        Ok(())
    }

    /// Run the scheduler to completion.
    pub fn run(&self) -> Result<PipelineSchedule, SchedulerError> {
        self.validate()?;
        let verbosity = self.verbosity;

        let (stages, capacity) = self.grid_dimensions()?;
        let mut state = SessionState::new(self.tree.len(), stages, capacity);
        let allocator = Allocator::new(self.tree, self.durations, verbosity);

        let mut discovery: FxHashMap<NodeId, u64> = FxHashMap::default();
        let mut next_discovery = 0u64;
        let mut candidates = seed_candidates(self.tree);
        for &node in &candidates {
            discovery.insert(node, next_discovery);
            next_discovery += 1;
        }

        let mut round = 0usize;
        while !candidates.is_empty() {
            round += 1;
            let ordered = self.order_candidates(&state, &candidates, &discovery)?;
            log_checks!(
                verbosity,
                "Round {}: candidates {:?}",
                round,
                ordered.iter().map(|&n| self.tree.label(n)).collect::<Vec<_>>()
            );

            let (&selected, deferred) = match ordered.split_first() {
                Some(split) => split,
                None => break,
            };
            allocator.allocate(&mut state, selected)?;

            let mut next: Vec<NodeId> = deferred.to_vec();
            if let Some(parent) = self.tree.parent(selected) {
                if is_ready(self.tree, &state, parent) && !next.contains(&parent) {
                    discovery.entry(parent).or_insert_with(|| {
                        let seq = next_discovery;
                        next_discovery += 1;
                        seq
                    });
                    next.push(parent);
                }
            }
            candidates = next;
        }

        let expected = self.tree.operator_count();
        if state.order.len() != expected || state.order.last() != Some(&self.tree.root()) {
            return Err(SchedulerError::Incomplete {
                allocated: state.order.len(),
                expected,
            });
        }

        let root_finish = state
            .allocation(self.tree.root())
            .map(|a| a.finish)
            .ok_or(SchedulerError::NotReady(self.tree.root()))?;
        let stats = AllocationStats::new(
            root_finish + 1,
            sequential_baseline(self.tree, self.durations, self.stages)? + 2,
            self.stages,
        );
        log_changes!(verbosity, "Done: {}", stats);

        let (grid, allocations, order, cursor_trace) = state.into_parts();
        Ok(PipelineSchedule {
            grid,
            allocations,
            order,
            cursor_trace,
            stats,
        })
    }

    fn order_candidates(
        &self,
        state: &SessionState,
        candidates: &[NodeId],
        discovery: &FxHashMap<NodeId, u64>,
    ) -> Result<Vec<NodeId>, SchedulerError> {
        let mut keys = Vec::with_capacity(candidates.len());
        for &node in candidates {
            let kind = self
                .tree
                .operator(node)
                .ok_or(SchedulerError::NotReady(node))?;
            keys.push(CandidateKey {
                early_start: early_start(self.tree, state, node)
                    .ok_or(SchedulerError::NotReady(node))?,
                duration: self.durations.duration(kind)?,
                discovery: discovery.get(&node).copied().unwrap_or(u64::MAX),
                node,
            });
        }
        Ok(sort_candidates(keys))
    }
}
