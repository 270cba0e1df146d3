//! Configuration types for the pipeline scheduler.

use pyo3::prelude::*;
use std::collections::HashMap;

use crate::durations::DurationTable;
use crate::pipeline::SchedulerError;
use crate::tree::OperatorKind;

/// Pipeline shape, operator durations and logging level for one scheduling run.
#[pyclass]
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Number of sequential stages every operator passes through
    #[pyo3(get, set)]
    pub stages: u64,
    /// Tact capacity of the stage-occupancy grid
    #[pyo3(get, set)]
    pub max_tacts: u64,
    /// Tacts per stage keyed by operator symbol ("+", "-", "*", "/")
    #[pyo3(get, set)]
    pub durations: HashMap<String, u64>,
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug
    #[pyo3(get, set)]
    pub verbosity: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stages: 2,
            max_tacts: 1000,
            durations: HashMap::from([
                ("+".to_string(), 2),
                ("-".to_string(), 2),
                ("*".to_string(), 4),
                ("/".to_string(), 8),
            ]),
            verbosity: 0,
        }
    }
}

impl PipelineConfig {
    /// Convert the symbol-keyed durations into a [`DurationTable`].
    pub fn duration_table(&self) -> Result<DurationTable, SchedulerError> {
        let mut table = DurationTable::new();
        for (symbol, &tacts) in &self.durations {
            let kind: OperatorKind = symbol
                .parse()
                .map_err(SchedulerError::UnknownOperatorKind)?;
            table.set(kind, tacts)?;
        }
        Ok(table)
    }
}

#[pymethods]
impl PipelineConfig {
    #[new]
    #[pyo3(signature = (stages=None, max_tacts=None, durations=None, verbosity=None))]
    fn new(
        stages: Option<u64>,
        max_tacts: Option<u64>,
        durations: Option<HashMap<String, u64>>,
        verbosity: Option<u8>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            stages: stages.unwrap_or(defaults.stages),
            max_tacts: max_tacts.unwrap_or(defaults.max_tacts),
            durations: durations.unwrap_or(defaults.durations),
            verbosity: verbosity.unwrap_or(defaults.verbosity),
        }
    }

    fn __repr__(&self) -> String {
        let mut durations: Vec<_> = self.durations.iter().collect();
        durations.sort();
        format!(
            "PipelineConfig(stages={}, max_tacts={}, durations={:?})",
            self.stages, self.max_tacts, durations
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let table = PipelineConfig::default().duration_table().unwrap();
        assert_eq!(table.get(OperatorKind::Add), Some(2));
        assert_eq!(table.get(OperatorKind::Subtract), Some(2));
        assert_eq!(table.get(OperatorKind::Multiply), Some(4));
        assert_eq!(table.get(OperatorKind::Divide), Some(8));
    }

    #[test]
    fn test_unknown_symbol() {
        let config = PipelineConfig {
            durations: HashMap::from([("^".to_string(), 3)]),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.duration_table(),
            Err(SchedulerError::UnknownOperatorKind(s)) if s == "^"
        ));
    }

    #[test]
    fn test_partial_table_leaves_gaps() {
        let config = PipelineConfig {
            durations: HashMap::from([("*".to_string(), 4)]),
            ..PipelineConfig::default()
        };
        let table = config.duration_table().unwrap();
        assert_eq!(table.get(OperatorKind::Multiply), Some(4));
        assert_eq!(table.get(OperatorKind::Add), None);
    }
}
