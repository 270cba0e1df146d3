//! Per-operator stage durations.

use crate::pipeline::SchedulerError;
use crate::tree::OperatorKind;

/// Tacts each operator spends in one pipeline stage.
///
/// A missing entry is an error at lookup time; there is no default duration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DurationTable {
    add: Option<u64>,
    subtract: Option<u64>,
    multiply: Option<u64>,
    divide: Option<u64>,
}

impl DurationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the duration for `kind`, rejecting zero.
    pub fn with(mut self, kind: OperatorKind, tacts: u64) -> Result<Self, SchedulerError> {
        self.set(kind, tacts)?;
        Ok(self)
    }

    pub fn set(&mut self, kind: OperatorKind, tacts: u64) -> Result<(), SchedulerError> {
        if tacts == 0 {
            return Err(SchedulerError::InvalidConfig(format!(
                "duration for operator '{}' must be positive",
                kind
            )));
        }
        *self.slot(kind) = Some(tacts);
        Ok(())
    }

    pub fn get(&self, kind: OperatorKind) -> Option<u64> {
        match kind {
            OperatorKind::Add => self.add,
            OperatorKind::Subtract => self.subtract,
            OperatorKind::Multiply => self.multiply,
            OperatorKind::Divide => self.divide,
        }
    }

    /// Duration of `kind`, or `UnknownOperatorKind` if the table has no entry.
    pub fn duration(&self, kind: OperatorKind) -> Result<u64, SchedulerError> {
        self.get(kind)
            .ok_or_else(|| SchedulerError::UnknownOperatorKind(kind.symbol().to_string()))
    }

    fn slot(&mut self, kind: OperatorKind) -> &mut Option<u64> {
        match kind {
            OperatorKind::Add => &mut self.add,
            OperatorKind::Subtract => &mut self.subtract,
            OperatorKind::Multiply => &mut self.multiply,
            OperatorKind::Divide => &mut self.divide,
        }
    }
}
