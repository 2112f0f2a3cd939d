//! Construction-time checks over a compiled program.
//!
//! Everything that can be rejected before the first run is rejected here:
//! slot ranges, argument-slot discipline, and program-order read/write
//! coverage. Runtime checks (`UninitializedRead`, `TypeMismatch`,
//! `KernelFailure`) stay in the fire path because they depend on live
//! object state.

use anyhow::Result;

use crate::error::ExecError;
use crate::graph::{ExecutionGraph, InstrKind, MemLocation};

pub(crate) fn validate_graph(graph: &ExecutionGraph, output_locs: &[MemLocation]) -> Result<()> {
    let n_locs = graph.n_locs();
    let n_args = graph.n_args();
    if n_args > n_locs {
        return Err(ExecError::MalformedProgram(format!(
            "{} argument slots exceed the {}-slot frame",
            n_args, n_locs
        ))
        .into());
    }

    let mut written = vec![false; n_locs];
    let mut arg_loaded = vec![false; n_args];

    for instr in graph.instrs() {
        check_slot(instr.repr(), instr.writeloc(), n_locs)?;
        for loc in instr.readlocs() {
            check_slot(instr.repr(), *loc, n_locs)?;
            if !written[loc.index()] {
                return Err(ExecError::MalformedProgram(format!(
                    "{} reads slot {} before any instruction writes it",
                    instr.repr(),
                    loc.index()
                ))
                .into());
            }
        }

        let write_index = instr.writeloc().index();
        match instr.kind() {
            InstrKind::LoadArgument { ind } => {
                if *ind >= n_args {
                    return Err(ExecError::MalformedProgram(format!(
                        "{} loads argument {} but the graph declares {} arguments",
                        instr.repr(),
                        ind,
                        n_args
                    ))
                    .into());
                }
                if write_index >= n_args {
                    return Err(ExecError::MalformedProgram(format!(
                        "{} writes slot {}, outside the argument region [0, {})",
                        instr.repr(),
                        write_index,
                        n_args
                    ))
                    .into());
                }
                if arg_loaded[write_index] {
                    return Err(ExecError::MalformedProgram(format!(
                        "argument slot {} is loaded more than once",
                        write_index
                    ))
                    .into());
                }
                arg_loaded[write_index] = true;
            }
            _ => {
                if write_index < n_args {
                    return Err(ExecError::MalformedProgram(format!(
                        "{} writes argument slot {}; only LoadArgument may",
                        instr.repr(),
                        write_index
                    ))
                    .into());
                }
            }
        }
        written[write_index] = true;
    }

    for (slot, loaded) in arg_loaded.iter().enumerate() {
        if !loaded {
            return Err(ExecError::MalformedProgram(format!(
                "argument slot {} is never loaded",
                slot
            ))
            .into());
        }
    }

    for loc in output_locs {
        check_slot("output", *loc, n_locs)?;
        if !written[loc.index()] {
            return Err(ExecError::MalformedProgram(format!(
                "output slot {} is never written",
                loc.index()
            ))
            .into());
        }
    }

    Ok(())
}

fn check_slot(instr: &str, loc: MemLocation, n_locs: usize) -> Result<()> {
    if loc.index() >= n_locs {
        return Err(ExecError::SlotOutOfRange {
            instr: instr.to_string(),
            index: loc.index(),
            n_locs,
        }
        .into());
    }
    Ok(())
}
