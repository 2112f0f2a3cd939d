//! Instruction variants and the host-kernel binding conventions.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use crate::graph::MemLocation;
use crate::object::{DType, Object};

/// Opaque host payload bound to a callable at creation time.
pub type KernelData = Arc<dyn Any + Send + Sync>;

/// Kernel that mutates a pre-allocated output buffer in place.
pub type ByRefFun = fn(&KernelData, &[Object], &Object) -> Result<()>;

/// Kernel that produces and returns a fresh output object.
pub type ByValFun = fn(&KernelData, &[Object]) -> Result<Object>;

/// By-reference kernel binding: function pointer plus opaque payload.
#[derive(Clone)]
pub struct ByRefCallable {
    fptr: ByRefFun,
    data: KernelData,
}

impl ByRefCallable {
    pub fn new(fptr: ByRefFun, data: KernelData) -> Self {
        Self { fptr, data }
    }

    /// Invoke the kernel. The `reads` slice is only valid for this call.
    pub fn call(&self, reads: &[Object], write: &Object) -> Result<()> {
        (self.fptr)(&self.data, reads, write)
    }
}

impl fmt::Debug for ByRefCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByRefCallable({:p})", self.fptr as *const ())
    }
}

/// By-value kernel binding: function pointer plus opaque payload.
#[derive(Clone)]
pub struct ByValCallable {
    fptr: ByValFun,
    data: KernelData,
}

impl ByValCallable {
    pub fn new(fptr: ByValFun, data: KernelData) -> Self {
        Self { fptr, data }
    }

    /// Invoke the kernel. The `reads` slice is only valid for this call.
    pub fn call(&self, reads: &[Object]) -> Result<Object> {
        (self.fptr)(&self.data, reads)
    }
}

impl fmt::Debug for ByValCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByValCallable({:p})", self.fptr as *const ())
    }
}

/// Per-kind instruction payload.
#[derive(Debug, Clone)]
pub enum InstrKind {
    /// Copy the `ind`-th run argument into the write slot.
    LoadArgument { ind: usize },
    /// Allocate a tensor whose shape is read from scalar slots.
    Alloc { dtype: DType },
    /// Gather the read slots into a tuple.
    BuildTup,
    /// Run a kernel that writes through a pre-allocated output buffer.
    ReturnByRef { callable: ByRefCallable },
    /// Run a kernel that produces its own output object.
    ReturnByVal { callable: ByValCallable },
}

impl InstrKind {
    /// Short tag used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            InstrKind::LoadArgument { .. } => "LoadArgument",
            InstrKind::Alloc { .. } => "Alloc",
            InstrKind::BuildTup => "BuildTup",
            InstrKind::ReturnByRef { .. } => "ReturnByRef",
            InstrKind::ReturnByVal { .. } => "ReturnByVal",
        }
    }
}

/// One step of a compiled program.
///
/// Carries the fields shared by every kind (display string, stable identity
/// hash of the upstream source construct, scheduling hint, slot lists) plus
/// the kind-specific payload.
#[derive(Debug, Clone)]
pub struct Instruction {
    repr: String,
    source_hash: i64,
    quick: bool,
    readlocs: Vec<MemLocation>,
    writeloc: MemLocation,
    kind: InstrKind,
}

impl Instruction {
    pub fn load_argument(
        repr: impl Into<String>,
        source_hash: i64,
        ind: usize,
        writeloc: MemLocation,
    ) -> Self {
        Self {
            repr: repr.into(),
            source_hash,
            quick: true,
            readlocs: Vec::new(),
            writeloc,
            kind: InstrKind::LoadArgument { ind },
        }
    }

    pub fn alloc(
        repr: impl Into<String>,
        source_hash: i64,
        dtype: DType,
        readlocs: Vec<MemLocation>,
        writeloc: MemLocation,
    ) -> Self {
        Self {
            repr: repr.into(),
            source_hash,
            quick: true,
            readlocs,
            writeloc,
            kind: InstrKind::Alloc { dtype },
        }
    }

    pub fn build_tup(
        repr: impl Into<String>,
        source_hash: i64,
        readlocs: Vec<MemLocation>,
        writeloc: MemLocation,
    ) -> Self {
        Self {
            repr: repr.into(),
            source_hash,
            quick: true,
            readlocs,
            writeloc,
            kind: InstrKind::BuildTup,
        }
    }

    pub fn return_by_ref(
        repr: impl Into<String>,
        source_hash: i64,
        readlocs: Vec<MemLocation>,
        writeloc: MemLocation,
        callable: ByRefCallable,
        quick: bool,
    ) -> Self {
        Self {
            repr: repr.into(),
            source_hash,
            quick,
            readlocs,
            writeloc,
            kind: InstrKind::ReturnByRef { callable },
        }
    }

    pub fn return_by_val(
        repr: impl Into<String>,
        source_hash: i64,
        readlocs: Vec<MemLocation>,
        writeloc: MemLocation,
        callable: ByValCallable,
        quick: bool,
    ) -> Self {
        Self {
            repr: repr.into(),
            source_hash,
            quick,
            readlocs,
            writeloc,
            kind: InstrKind::ReturnByVal { callable },
        }
    }

    /// Human-readable representation for logs and profiling.
    pub fn repr(&self) -> &str {
        &self.repr
    }

    /// Stable hash identifying the upstream source construct.
    pub fn source_hash(&self) -> i64 {
        self.source_hash
    }

    /// Whether the dispatcher should fire this inline rather than hand it off.
    pub fn quick(&self) -> bool {
        self.quick
    }

    pub fn readlocs(&self) -> &[MemLocation] {
        &self.readlocs
    }

    pub fn writeloc(&self) -> MemLocation {
        self.writeloc
    }

    pub fn kind(&self) -> &InstrKind {
        &self.kind
    }
}
