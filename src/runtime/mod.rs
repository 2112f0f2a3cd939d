mod engine;
mod parallel;
mod profiler;
mod sequential;
mod state;
mod validation;

use std::sync::Arc;

use anyhow::Result;

use crate::graph::{ExecutionGraph, MemLocation};
use crate::object::Object;

pub use parallel::ParallelInterpreter;
pub use profiler::{profiler, InstructionStats, NativeProfiler};
pub use sequential::SequentialInterpreter;

/// Evaluates a compiled program against caller-supplied arguments.
///
/// `run` is synchronous: it returns once every instruction has fired and
/// the output tuple is built. A single interpreter must not be run from
/// two threads at once; `&mut self` makes the borrow checker enforce that.
pub trait Interpreter: Send {
    fn run(&mut self, args: &[Object]) -> Result<Object>;
}

/// Validate the program and pick an interpreter flavour for `num_threads`.
///
/// `num_threads <= 1` yields the sequential interpreter; anything larger
/// yields the parallel interpreter with its dependency DAG and worker pool
/// built up front. The graph is shared read-only and must outlive nothing:
/// the `Arc` keeps it alive for as long as any interpreter holds it.
pub fn create_interpreter(
    graph: Arc<ExecutionGraph>,
    output_locs: Vec<MemLocation>,
    num_threads: usize,
) -> Result<Box<dyn Interpreter>> {
    validation::validate_graph(&graph, &output_locs)?;
    if num_threads <= 1 {
        Ok(Box::new(SequentialInterpreter::new(graph, output_locs)))
    } else {
        Ok(Box::new(ParallelInterpreter::new(
            graph,
            output_locs,
            num_threads,
        )?))
    }
}
