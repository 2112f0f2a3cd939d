//! Error types for graph execution.

use thiserror::Error;

/// Fatal execution errors.
///
/// Every variant aborts the current run; there is no recovery path. Errors
/// travel through `anyhow::Result`, so callers can `downcast_ref::<ExecError>`
/// to branch on the variant. Construction-time problems surface from
/// `create_interpreter`; the rest terminate `run` and leave slot state as-is
/// for diagnosis.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Caller's argument count does not match the graph's declared arity.
    #[error("argument tuple has {got} elements, graph expects {expected}")]
    ArgArity { expected: usize, got: usize },

    /// An instruction or output location references a slot outside `[0, n_locs)`.
    #[error("{instr}: slot {index} outside the {n_locs}-slot frame")]
    SlotOutOfRange {
        instr: String,
        index: usize,
        n_locs: usize,
    },

    /// A read-slot held nothing when its consumer fired.
    #[error("slot {0} read before any write")]
    UninitializedRead(usize),

    /// An object did not have the shape or dtype the instruction requires.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A host kernel reported failure.
    #[error("kernel failure in {instr}: {message}")]
    KernelFailure { instr: String, message: String },

    /// The instruction sequence violates program-order constraints.
    #[error("malformed program: {0}")]
    MalformedProgram(String),
}
