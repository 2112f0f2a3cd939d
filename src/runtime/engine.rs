//! Instruction fire dispatch.

use std::time::Instant;

use anyhow::Result;

use crate::error::ExecError;
use crate::graph::{InstrKind, Instruction};
use crate::object::{alloc_tensor, build_tuple, Object};
use crate::runtime::profiler::profiler;
use crate::runtime::state::ExecContext;

/// Fire one instruction against the slot frame, timing it when the
/// profiler is on.
pub(crate) fn fire_timed(instr: &Instruction, ctx: &ExecContext<'_>) -> Result<()> {
    let _claim = ctx.frame.claim(instr, ctx.worker);
    let prof = profiler();
    if !prof.is_on() {
        return fire(instr, ctx);
    }
    let start = Instant::now();
    fire(instr, ctx)?;
    prof.update(instr, start.elapsed().as_secs_f64());
    Ok(())
}

fn fire(instr: &Instruction, ctx: &ExecContext<'_>) -> Result<()> {
    match instr.kind() {
        InstrKind::LoadArgument { ind } => {
            ctx.set(instr.writeloc(), ctx.getarg(*ind));
        }
        InstrKind::Alloc { dtype } => {
            let mut shape = Vec::with_capacity(instr.readlocs().len());
            for loc in instr.readlocs() {
                shape.push(ctx.get(*loc)?.scalar_as_size()?);
            }
            let writeloc = instr.writeloc();
            ctx.set(writeloc, alloc_tensor(*dtype, &shape, writeloc.device()));
        }
        InstrKind::BuildTup => {
            let items = instr
                .readlocs()
                .iter()
                .map(|loc| ctx.get(*loc))
                .collect::<Result<Vec<_>>>()?;
            ctx.set(instr.writeloc(), build_tuple(items));
        }
        InstrKind::ReturnByRef { callable } => {
            let reads = gather_reads(instr, ctx)?;
            let writeloc = instr.writeloc();
            // The output buffer must exist already; its producer is an
            // earlier Alloc, not this instruction.
            let write = ctx.get(writeloc).map_err(|_| {
                ExecError::TypeMismatch(format!(
                    "{}: output slot {} holds no pre-allocated buffer",
                    instr.repr(),
                    writeloc.index()
                ))
            })?;
            if !write.is_tensor() {
                return Err(ExecError::TypeMismatch(format!(
                    "{}: output slot {} does not hold a tensor",
                    instr.repr(),
                    writeloc.index()
                ))
                .into());
            }
            callable.call(&reads, &write).map_err(|err| {
                ExecError::KernelFailure {
                    instr: instr.repr().to_string(),
                    message: err.to_string(),
                }
            })?;
        }
        InstrKind::ReturnByVal { callable } => {
            let reads = gather_reads(instr, ctx)?;
            let out = callable.call(&reads).map_err(|err| ExecError::KernelFailure {
                instr: instr.repr().to_string(),
                message: err.to_string(),
            })?;
            ctx.set(instr.writeloc(), out);
        }
    }
    Ok(())
}

// Built fresh per invocation; kernels must not retain the slice.
fn gather_reads(instr: &Instruction, ctx: &ExecContext<'_>) -> Result<Vec<Object>> {
    instr.readlocs().iter().map(|loc| ctx.get(*loc)).collect()
}
