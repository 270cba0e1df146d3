//! Stage-occupancy grid with per-tact committed window widths.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::tree::NodeId;

use super::core::SchedulerError;

/// One tact of scheduling time.
pub type Tact = u64;

/// Contents of a single (stage, tact) cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    /// Reserved by a window wider than the node occupying it.
    Filler,
    Occupied(NodeId),
}

/// Marker written to the event log when a node enters or leaves the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Entry,
    Exit,
}

impl EventKind {
    pub fn marker(self) -> &'static str {
        match self {
            Self::Entry => "R",
            Self::Exit => "W",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineEvent {
    pub kind: EventKind,
    pub node: NodeId,
}

/// Stages x Tacts occupancy table.
///
/// Cells are stored stage-major in a flat vector of fixed capacity. Any access
/// past the capacity is reported as `GridExhausted` rather than wrapped or
/// silently dropped.
///
/// Invariant: a cell holds at most one node; `occupy` refuses to overwrite a
/// cell occupied by a different node.
#[derive(Clone, Debug)]
pub struct StageGrid {
    stages: usize,
    capacity: usize,
    cells: Vec<Cell>,
    /// Window width last committed for a tact where some stage window began.
    committed: FxHashMap<Tact, Tact>,
    events: BTreeMap<Tact, Vec<PipelineEvent>>,
}

impl StageGrid {
    pub fn new(stages: usize, capacity: usize) -> Self {
        Self {
            stages,
            capacity,
            cells: vec![Cell::Empty; stages * capacity],
            committed: FxHashMap::default(),
            events: BTreeMap::new(),
        }
    }

    pub fn stages(&self) -> usize {
        self.stages
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cell at (stage, tact); anything out of range reads as empty.
    pub fn cell(&self, stage: usize, tact: Tact) -> Cell {
        match self.index(stage, tact) {
            Some(idx) => self.cells[idx],
            None => Cell::Empty,
        }
    }

    /// Committed window width recorded at `tact`, if any.
    pub fn committed_at(&self, tact: Tact) -> Option<Tact> {
        self.committed.get(&tact).copied()
    }

    pub fn commit(&mut self, tact: Tact, width: Tact) {
        self.committed.insert(tact, width);
    }

    pub fn record_event(&mut self, tact: Tact, kind: EventKind, node: NodeId) {
        self.events
            .entry(tact)
            .or_default()
            .push(PipelineEvent { kind, node });
    }

    pub fn events_at(&self, tact: Tact) -> &[PipelineEvent] {
        self.events.get(&tact).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Event log in tact order.
    pub fn events(&self) -> impl Iterator<Item = (Tact, &PipelineEvent)> {
        self.events
            .iter()
            .flat_map(|(tact, events)| events.iter().map(move |e| (*tact, e)))
    }

    /// Place `node` in (stage, tact). Filler may be overwritten; another node may not.
    pub fn occupy(&mut self, stage: usize, tact: Tact, node: NodeId) -> Result<(), SchedulerError> {
        let idx = self.checked_index(stage, tact)?;
        match self.cells[idx] {
            Cell::Occupied(other) if other != node => Err(SchedulerError::CellConflict {
                stage,
                tact,
                occupant: other,
                node,
            }),
            _ => {
                self.cells[idx] = Cell::Occupied(node);
                Ok(())
            }
        }
    }

    /// Reserve (stage, tact) as filler if nothing else is there.
    pub fn mark_filler(&mut self, stage: usize, tact: Tact) -> Result<(), SchedulerError> {
        let idx = self.checked_index(stage, tact)?;
        if self.cells[idx] == Cell::Empty {
            self.cells[idx] = Cell::Filler;
        }
        Ok(())
    }

    /// First tact `>= from` where `len` consecutive cells of `stage` hold no node.
    pub fn first_free_window(
        &self,
        stage: usize,
        from: Tact,
        len: Tact,
    ) -> Result<Tact, SchedulerError> {
        let mut pos = from;
        'search: loop {
            self.ensure_fits(pos + len)?;
            for tact in pos..pos + len {
                if let Cell::Occupied(_) = self.cell(stage, tact) {
                    pos = tact + 1;
                    continue 'search;
                }
            }
            return Ok(pos);
        }
    }

    /// Move every non-empty cell of stages `1..` at or after `from` forward by
    /// `delta` tacts, clearing the cells left behind. Stage 0 is untouched.
    pub fn shift_later_stages(&mut self, from: Tact, delta: Tact) -> Result<(), SchedulerError> {
        if delta == 0 {
            return Ok(());
        }
        for stage in 1..self.stages {
            let Some(last) = self.last_non_empty(stage) else {
                continue;
            };
            if last < from {
                continue;
            }
            self.ensure_fits(last + delta + 1)?;
            // Walk backwards so a moved cell never lands on one not yet moved.
            for tact in (from..=last).rev() {
                let src = self.checked_index(stage, tact)?;
                let dst = self.checked_index(stage, tact + delta)?;
                self.cells[dst] = self.cells[src];
                self.cells[src] = Cell::Empty;
            }
        }
        Ok(())
    }

    /// Tacts at which `node` occupies `stage`, in ascending order.
    pub fn occupied_tacts(&self, stage: usize, node: NodeId) -> Vec<Tact> {
        (0..self.capacity as Tact)
            .filter(|&tact| self.cell(stage, tact) == Cell::Occupied(node))
            .collect()
    }

    /// One past the last tact holding anything in any stage or the event log.
    pub fn used_tacts(&self) -> Tact {
        let cells = (0..self.stages)
            .filter_map(|stage| self.last_non_empty(stage))
            .max()
            .map_or(0, |t| t + 1);
        let events = self.events.keys().next_back().map_or(0, |t| t + 1);
        cells.max(events)
    }

    fn last_non_empty(&self, stage: usize) -> Option<Tact> {
        let row = &self.cells[stage * self.capacity..(stage + 1) * self.capacity];
        row.iter()
            .rposition(|c| *c != Cell::Empty)
            .map(|pos| pos as Tact)
    }

    fn ensure_fits(&self, end: Tact) -> Result<(), SchedulerError> {
        if end > self.capacity as Tact {
            return Err(SchedulerError::GridExhausted {
                capacity: self.capacity as Tact,
                required: end,
            });
        }
        Ok(())
    }

    fn index(&self, stage: usize, tact: Tact) -> Option<usize> {
        if stage >= self.stages || tact >= self.capacity as Tact {
            return None;
        }
        Some(stage * self.capacity + tact as usize)
    }

    fn checked_index(&self, stage: usize, tact: Tact) -> Result<usize, SchedulerError> {
        self.index(stage, tact).ok_or(SchedulerError::GridExhausted {
            capacity: self.capacity as Tact,
            required: tact + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occupy_and_read_back() {
        let mut grid = StageGrid::new(2, 16);
        grid.occupy(0, 3, 7).unwrap();
        grid.mark_filler(1, 4).unwrap();

        assert_eq!(grid.cell(0, 3), Cell::Occupied(7));
        assert_eq!(grid.cell(1, 4), Cell::Filler);
        assert_eq!(grid.cell(1, 3), Cell::Empty);
        assert_eq!(grid.cell(5, 3), Cell::Empty);
        assert_eq!(grid.used_tacts(), 5);
    }

    #[test]
    fn test_occupy_refuses_other_node() {
        let mut grid = StageGrid::new(1, 8);
        grid.occupy(0, 2, 1).unwrap();
        let result = grid.occupy(0, 2, 2);
        assert!(matches!(result, Err(SchedulerError::CellConflict { occupant: 1, .. })));
    }

    #[test]
    fn test_filler_is_overwritable() {
        let mut grid = StageGrid::new(1, 8);
        grid.mark_filler(0, 2).unwrap();
        grid.occupy(0, 2, 4).unwrap();
        grid.mark_filler(0, 2).unwrap();
        assert_eq!(grid.cell(0, 2), Cell::Occupied(4));
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut grid = StageGrid::new(2, 4);
        let result = grid.occupy(1, 4, 0);
        assert!(matches!(
            result,
            Err(SchedulerError::GridExhausted {
                capacity: 4,
                required: 5
            })
        ));
    }

    #[test]
    fn test_first_free_window_skips_occupied() {
        let mut grid = StageGrid::new(1, 16);
        grid.occupy(0, 2, 1).unwrap();
        grid.occupy(0, 3, 1).unwrap();
        grid.mark_filler(0, 6).unwrap();

        assert_eq!(grid.first_free_window(0, 0, 2).unwrap(), 0);
        assert_eq!(grid.first_free_window(0, 1, 2).unwrap(), 4);
        assert_eq!(grid.first_free_window(0, 5, 2).unwrap(), 5);
        assert!(grid.first_free_window(0, 15, 2).is_err());
    }

    #[test]
    fn test_shift_later_stages_leaves_stage_zero() {
        let mut grid = StageGrid::new(3, 32);
        for tact in [4, 5] {
            grid.occupy(0, tact, 1).unwrap();
            grid.occupy(1, tact, 1).unwrap();
            grid.occupy(2, tact, 1).unwrap();
        }
        grid.occupy(1, 2, 0).unwrap();

        grid.shift_later_stages(4, 3).unwrap();

        assert_eq!(grid.occupied_tacts(0, 1), vec![4, 5]);
        assert_eq!(grid.occupied_tacts(1, 1), vec![7, 8]);
        assert_eq!(grid.occupied_tacts(2, 1), vec![7, 8]);
        // Cells before the conflict tact stay put
        assert_eq!(grid.occupied_tacts(1, 0), vec![2]);
        assert_eq!(grid.cell(1, 4), Cell::Empty);
    }

    #[test]
    fn test_shift_past_capacity_fails() {
        let mut grid = StageGrid::new(2, 8);
        grid.occupy(1, 6, 0).unwrap();
        let result = grid.shift_later_stages(0, 4);
        assert!(matches!(result, Err(SchedulerError::GridExhausted { .. })));
        // Nothing moved
        assert_eq!(grid.cell(1, 6), Cell::Occupied(0));
    }

    #[test]
    fn test_event_log_keeps_shared_tacts() {
        let mut grid = StageGrid::new(1, 8);
        grid.record_event(3, EventKind::Exit, 0);
        grid.record_event(3, EventKind::Entry, 1);
        grid.record_event(0, EventKind::Entry, 0);

        assert_eq!(grid.events_at(3).len(), 2);
        let tacts: Vec<Tact> = grid.events().map(|(t, _)| t).collect();
        assert_eq!(tacts, vec![0, 3, 3]);
        assert!(grid.events_at(5).is_empty());
    }
}
