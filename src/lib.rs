mod error;
mod graph;
pub mod logging;
mod object;
mod runtime;

pub use error::ExecError;
pub use graph::{
    ByRefCallable, ByRefFun, ByValCallable, ByValFun, ExecutionGraph, InstrKind, Instruction,
    KernelData, MemLocation,
};
pub use object::{alloc_tensor, build_tuple, DType, Device, ElemData, Object, Tensor};
pub use runtime::{
    create_interpreter, profiler, InstructionStats, Interpreter, NativeProfiler,
    ParallelInterpreter, SequentialInterpreter,
};
