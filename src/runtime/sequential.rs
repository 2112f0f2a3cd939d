use std::sync::Arc;

use anyhow::Result;

use crate::error::ExecError;
use crate::graph::{ExecutionGraph, MemLocation};
use crate::object::{build_tuple, Object};
use crate::runtime::engine::fire_timed;
use crate::runtime::state::{ExecContext, SlotFrame};
use crate::runtime::Interpreter;

/// Executes the program in order on the caller thread.
pub struct SequentialInterpreter {
    graph: Arc<ExecutionGraph>,
    output_locs: Vec<MemLocation>,
    frame: SlotFrame,
}

impl SequentialInterpreter {
    pub(crate) fn new(graph: Arc<ExecutionGraph>, output_locs: Vec<MemLocation>) -> Self {
        let frame = SlotFrame::new(graph.n_locs());
        Self {
            graph,
            output_locs,
            frame,
        }
    }
}

impl Interpreter for SequentialInterpreter {
    fn run(&mut self, args: &[Object]) -> Result<Object> {
        if args.len() != self.graph.n_args() {
            return Err(ExecError::ArgArity {
                expected: self.graph.n_args(),
                got: args.len(),
            }
            .into());
        }
        crate::trace!("run.seq start n_instrs={}", self.graph.n_instrs());
        let ctx = ExecContext {
            frame: &self.frame,
            args,
            worker: 0,
        };
        for instr in self.graph.instrs() {
            fire_timed(instr, &ctx).map_err(|err| {
                crate::error!("run.seq failed at {}: {}", instr.repr(), err);
                err
            })?;
        }
        let outputs = self
            .output_locs
            .iter()
            .map(|loc| self.frame.get(*loc))
            .collect::<Result<Vec<_>>>()?;
        crate::trace!("run.seq done");
        Ok(build_tuple(outputs))
    }
}
