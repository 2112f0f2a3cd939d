//! Pooled interpreter exploiting instruction-level parallelism.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::ExecError;
use crate::graph::{ExecutionGraph, Instruction, MemLocation};
use crate::object::{build_tuple, Object};
use crate::runtime::engine::fire_timed;
use crate::runtime::state::{ExecContext, SlotFrame};
use crate::runtime::Interpreter;

/// Successor lists and predecessor counts, one node per instruction.
#[derive(Debug)]
struct DepDag {
    succs: Vec<Vec<usize>>,
    n_preds: Vec<usize>,
}

/// Instruction `j` depends on an earlier `i` on any cell-level conflict:
/// flow (`i` writes what `j` reads), output (same write slot), or anti
/// (`j` overwrites what `i` reads).
fn conflicts(earlier: &Instruction, later: &Instruction) -> bool {
    let w_earlier = earlier.writeloc().index();
    let w_later = later.writeloc().index();
    if later.readlocs().iter().any(|loc| loc.index() == w_earlier) {
        return true;
    }
    if w_earlier == w_later {
        return true;
    }
    earlier.readlocs().iter().any(|loc| loc.index() == w_later)
}

fn build_dag(graph: &ExecutionGraph) -> DepDag {
    let instrs = graph.instrs();
    let n = instrs.len();
    let mut succs = vec![Vec::new(); n];
    let mut n_preds = vec![0usize; n];
    for j in 0..n {
        for i in 0..j {
            if conflicts(&instrs[i], &instrs[j]) {
                succs[i].push(j);
                n_preds[j] += 1;
            }
        }
    }
    DepDag { succs, n_preds }
}

fn push_ready(succs: &[usize], pending: &mut [usize], ready: &mut VecDeque<usize>) {
    for &succ in succs {
        pending[succ] -= 1;
        if pending[succ] == 0 {
            ready.push_back(succ);
        }
    }
}

/// Executes the program on a fixed worker pool, dispatching instructions
/// as their dependencies resolve.
///
/// Observable slot contents and outputs match the sequential interpreter:
/// execution is a topological order of a DAG that covers every cell-level
/// read/write conflict. The dependency DAG is computed once, at creation.
pub struct ParallelInterpreter {
    graph: Arc<ExecutionGraph>,
    output_locs: Vec<MemLocation>,
    frame: SlotFrame,
    dag: DepDag,
    pool: ThreadPool,
    num_threads: usize,
}

impl ParallelInterpreter {
    pub(crate) fn new(
        graph: Arc<ExecutionGraph>,
        output_locs: Vec<MemLocation>,
        num_threads: usize,
    ) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|err| anyhow!("failed to build worker pool: {}", err))?;
        let dag = build_dag(&graph);
        let frame = SlotFrame::new(graph.n_locs());
        Ok(Self {
            graph,
            output_locs,
            frame,
            dag,
            pool,
            num_threads,
        })
    }
}

impl Interpreter for ParallelInterpreter {
    fn run(&mut self, args: &[Object]) -> Result<Object> {
        if args.len() != self.graph.n_args() {
            return Err(ExecError::ArgArity {
                expected: self.graph.n_args(),
                got: args.len(),
            }
            .into());
        }
        let instrs = self.graph.instrs();
        let n = instrs.len();
        crate::trace!(
            "run.par start n_instrs={} workers={}",
            n,
            self.num_threads
        );

        let frame = &self.frame;
        let dag = &self.dag;
        // The dispatcher (this thread) is one past the pool's worker ids.
        let dispatcher = self.num_threads;

        let mut pending = dag.n_preds.clone();
        let mut ready: VecDeque<usize> = (0..n).filter(|&i| pending[i] == 0).collect();
        let (tx, rx) = mpsc::channel::<(usize, Result<()>)>();
        let mut fired = 0usize;
        let mut in_flight = 0usize;
        let mut failed: Option<anyhow::Error> = None;

        self.pool.in_place_scope(|scope| {
            loop {
                // Dispatch everything whose predecessors have resolved.
                while failed.is_none() {
                    let Some(i) = ready.pop_front() else { break };
                    let instr = &instrs[i];
                    if instr.quick() {
                        // Handoff would cost more than the work itself.
                        let ctx = ExecContext {
                            frame,
                            args,
                            worker: dispatcher,
                        };
                        match fire_timed(instr, &ctx) {
                            Ok(()) => {
                                fired += 1;
                                push_ready(&dag.succs[i], &mut pending, &mut ready);
                            }
                            Err(err) => failed = Some(err),
                        }
                    } else {
                        in_flight += 1;
                        let tx = tx.clone();
                        scope.spawn(move |_| {
                            let worker = rayon::current_thread_index().unwrap_or(0);
                            crate::trace!(
                                "fire worker={} kind={} instr={}",
                                worker,
                                instr.kind().name(),
                                instr.repr()
                            );
                            let ctx = ExecContext {
                                frame,
                                args,
                                worker,
                            };
                            let result = fire_timed(instr, &ctx);
                            let _ = tx.send((i, result));
                        });
                    }
                }
                if fired == n {
                    break;
                }
                if in_flight == 0 {
                    if failed.is_none() {
                        failed = Some(
                            ExecError::MalformedProgram(
                                "scheduler stalled with unfired instructions".into(),
                            )
                            .into(),
                        );
                    }
                    break;
                }
                let (i, result) = rx.recv().expect("worker channel closed");
                in_flight -= 1;
                match result {
                    Ok(()) => {
                        fired += 1;
                        push_ready(&dag.succs[i], &mut pending, &mut ready);
                    }
                    Err(err) => {
                        if failed.is_none() {
                            crate::warning!(
                                "instruction {} failed; draining in-flight work",
                                instrs[i].repr()
                            );
                            failed = Some(err);
                        }
                    }
                }
            }
        });

        if let Some(err) = failed {
            crate::error!("run.par failed: {}", err);
            return Err(err);
        }
        let outputs = self
            .output_locs
            .iter()
            .map(|loc| self.frame.get(*loc))
            .collect::<Result<Vec<_>>>()?;
        crate::trace!("run.par done");
        Ok(build_tuple(outputs))
    }
}
