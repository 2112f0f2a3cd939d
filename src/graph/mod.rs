mod instr;
mod loc;

pub use instr::{ByRefCallable, ByRefFun, ByValCallable, ByValFun, InstrKind, Instruction, KernelData};
pub use loc::MemLocation;

/// Immutable linear program of instructions over a slotted frame.
///
/// Built once by the upstream compiler, then shared read-only (via `Arc`)
/// across any number of interpreters. Owns its instructions.
#[derive(Debug)]
pub struct ExecutionGraph {
    instrs: Vec<Instruction>,
    n_args: usize,
    n_locs: usize,
}

impl ExecutionGraph {
    pub fn new(instrs: Vec<Instruction>, n_args: usize, n_locs: usize) -> Self {
        Self {
            instrs,
            n_args,
            n_locs,
        }
    }

    pub fn instrs(&self) -> &[Instruction] {
        &self.instrs
    }

    /// Number of argument slots reserved at the front of the frame.
    pub fn n_args(&self) -> usize {
        self.n_args
    }

    /// Total slot count of the frame.
    pub fn n_locs(&self) -> usize {
        self.n_locs
    }

    pub fn n_instrs(&self) -> usize {
        self.instrs.len()
    }
}
