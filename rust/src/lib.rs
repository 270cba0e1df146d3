//! Rust implementation of the expression pipeline scheduler.
//!
//! Schedules the operators of an arithmetic expression tree onto a fixed-width
//! pipeline of sequential stages and reports parallel completion time against
//! a fully sequential baseline.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyTuple;

mod config;
pub mod durations;
pub mod logging;
mod models;
pub mod pipeline;
pub mod sorting;
pub mod stats;
pub mod tree;

pub use config::PipelineConfig;
pub use durations::DurationTable;
pub use models::{ScheduleResult, ScheduledNode};
pub use pipeline::{Allocation, PipelineSchedule, PipelineScheduler, SchedulerError};
pub use stats::AllocationStats;
pub use tree::{ExpressionTree, NodeId, OperatorKind, TreeBuilder, TreeError};

/// Schedule `tree` with the stage count, capacity, durations and verbosity of `config`.
pub fn schedule(
    tree: &ExpressionTree,
    config: &PipelineConfig,
) -> Result<PipelineSchedule, SchedulerError> {
    let durations = config.duration_table()?;
    PipelineScheduler::from_config(tree, &durations, config).run()
}

fn to_py_err(err: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(err.to_string())
}

enum PyFrame<'py> {
    Visit(Bound<'py, PyAny>),
    Build(OperatorKind),
}

/// Add a Python expression (number, `None`, or `(symbol, left, right)`) to the builder.
///
/// Operands are added before their operator, left subtree first.
fn add_py_expr(builder: &mut TreeBuilder, expr: &Bound<'_, PyAny>) -> PyResult<Option<NodeId>> {
    let mut frames = vec![PyFrame::Visit(expr.clone())];
    let mut built: Vec<Option<NodeId>> = Vec::new();

    while let Some(frame) = frames.pop() {
        match frame {
            PyFrame::Visit(expr) => {
                if expr.is_none() {
                    built.push(None);
                    continue;
                }
                if let Ok(tuple) = expr.downcast::<PyTuple>() {
                    if tuple.len() != 3 {
                        return Err(PyValueError::new_err(format!(
                            "operator node must be (symbol, left, right), got {} items",
                            tuple.len()
                        )));
                    }
                    let symbol: String = tuple.get_item(0)?.extract()?;
                    let kind: OperatorKind = symbol
                        .parse()
                        .map_err(|s| to_py_err(SchedulerError::UnknownOperatorKind(s)))?;
                    frames.push(PyFrame::Build(kind));
                    frames.push(PyFrame::Visit(tuple.get_item(2)?));
                    frames.push(PyFrame::Visit(tuple.get_item(1)?));
                    continue;
                }
                let value: f64 = expr.extract()?;
                built.push(Some(builder.constant(value)));
            }
            PyFrame::Build(kind) => {
                let right = built.pop().flatten();
                let left = built.pop().flatten();
                built.push(Some(builder.partial_operator(kind, left, right)));
            }
        }
    }
    Ok(built.pop().flatten())
}

/// Finish `builder` at `root`; an absent root means there is nothing to schedule.
fn tree_from_root(
    builder: TreeBuilder,
    root: Option<NodeId>,
) -> Result<ExpressionTree, SchedulerError> {
    root.map(|root| builder.build(root)).ok_or(SchedulerError::EmptyExpression)
}

/// Schedule an expression onto the pipeline.
///
/// # Arguments
/// * `expr` - A number, or a nested `(symbol, left, right)` tuple
/// * `config` - Pipeline configuration (stages, capacity, durations)
///
/// # Returns
/// * ScheduleResult with per-node intervals, stats and the rendered grid
///
/// # Raises
/// * ValueError for malformed trees, unknown operators, or an exhausted grid
#[pyfunction]
#[pyo3(signature = (expr, config=None))]
fn schedule_expression(
    expr: &Bound<'_, PyAny>,
    config: Option<PipelineConfig>,
) -> PyResult<ScheduleResult> {
    let config = config.unwrap_or_default();
    let mut builder = ExpressionTree::builder();
    let root = add_py_expr(&mut builder, expr)?;
    let tree = tree_from_root(builder, root).map_err(to_py_err)?;

    let result = schedule(&tree, &config).map_err(to_py_err)?;
    let value = tree.evaluate().map_err(to_py_err)?;
    Ok(ScheduleResult::from_schedule(&tree, &result, value))
}

/// The exprpipe.rust Python module.
#[pymodule]
fn rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Result types
    m.add_class::<AllocationStats>()?;
    m.add_class::<ScheduledNode>()?;
    m.add_class::<ScheduleResult>()?;

    // Config types
    m.add_class::<PipelineConfig>()?;

    // Algorithms
    m.add_function(wrap_pyfunction!(schedule_expression, m)?)?;

    Ok(())
}
