//! Slot storage shared by the interpreters and the per-run execution context.

#[cfg(not(debug_assertions))]
use std::marker::PhantomData;
#[cfg(debug_assertions)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;

use crate::error::ExecError;
use crate::graph::{Instruction, MemLocation};
use crate::object::Object;

#[cfg(debug_assertions)]
const NO_WORKER: usize = usize::MAX;

// Which workers are currently inside a fire touching this slot. Claims
// span the whole instruction, not just a lock window, so two conflicting
// fires the dependency DAG failed to order overlap here.
#[cfg(debug_assertions)]
#[derive(Debug)]
struct SlotAccess {
    writer: AtomicUsize,
    readers: AtomicUsize,
}

#[cfg(debug_assertions)]
impl Default for SlotAccess {
    fn default() -> Self {
        Self {
            writer: AtomicUsize::new(NO_WORKER),
            readers: AtomicUsize::new(0),
        }
    }
}

/// Fixed-size array of object slots, all initially empty.
///
/// Each cell sits behind its own mutex: the lock gives `set` release
/// semantics and `get` acquire semantics, which is all the parallel
/// interpreter needs because its dependency DAG already keeps conflicting
/// instructions apart. Slots are retained across runs so constants survive
/// re-execution; overwriting a cell releases the previous occupant.
///
/// Debug builds additionally register every in-flight instruction's slot
/// accesses (see [`SlotFrame::claim`]) and assert that no two workers hold
/// conflicting claims, turning a missed dependency edge into a panic
/// instead of a silent ordering bug.
#[derive(Debug)]
pub(crate) struct SlotFrame {
    slots: Vec<Mutex<Option<Object>>>,
    #[cfg(debug_assertions)]
    access: Vec<SlotAccess>,
}

impl SlotFrame {
    pub fn new(n_locs: usize) -> Self {
        let mut slots = Vec::with_capacity(n_locs);
        slots.resize_with(n_locs, Mutex::default);
        Self {
            slots,
            #[cfg(debug_assertions)]
            access: (0..n_locs).map(|_| SlotAccess::default()).collect(),
        }
    }

    /// Acquire the object at `loc`, or fail if the cell is still empty.
    pub fn get(&self, loc: MemLocation) -> Result<Object> {
        self.slots[loc.index()]
            .lock()
            .expect("slot mutex poisoned")
            .clone()
            .ok_or_else(|| ExecError::UninitializedRead(loc.index()).into())
    }

    /// Store `obj` at `loc`, releasing whatever the cell held before.
    pub fn set(&self, loc: MemLocation, obj: Object) {
        let mut slot = self.slots[loc.index()].lock().expect("slot mutex poisoned");
        *slot = Some(obj);
    }

    /// Register `worker` as firing `instr`; the returned guard holds the
    /// claim until the fire completes.
    ///
    /// Panics when the claim conflicts with one already outstanding: a
    /// second writer on the instruction's write slot, a reader overlapping
    /// another worker's write, or readers still present when a write claim
    /// is released. An instruction may read its own write slot.
    #[cfg(debug_assertions)]
    #[must_use]
    pub fn claim<'a>(&'a self, instr: &'a Instruction, worker: usize) -> SlotClaim<'a> {
        let write_index = instr.writeloc().index();
        let prev = self.access[write_index].writer.swap(worker, Ordering::SeqCst);
        assert_eq!(
            prev, NO_WORKER,
            "workers {prev} and {worker} both write slot {write_index}; a dependency edge is missing"
        );
        for loc in instr.readlocs() {
            let access = &self.access[loc.index()];
            access.readers.fetch_add(1, Ordering::SeqCst);
            let writer = access.writer.load(Ordering::SeqCst);
            assert!(
                writer == NO_WORKER || writer == worker,
                "worker {worker} reads slot {} while worker {writer} writes it; a dependency edge is missing",
                loc.index()
            );
        }
        SlotClaim {
            frame: self,
            instr,
            worker,
        }
    }

    #[cfg(not(debug_assertions))]
    #[must_use]
    pub fn claim<'a>(&'a self, _instr: &'a Instruction, _worker: usize) -> SlotClaim<'a> {
        SlotClaim {
            _frame: PhantomData,
        }
    }
}

/// Debug guard over the slots an in-flight instruction touches.
#[cfg(debug_assertions)]
pub(crate) struct SlotClaim<'a> {
    frame: &'a SlotFrame,
    instr: &'a Instruction,
    worker: usize,
}

/// Debug guard over the slots an in-flight instruction touches.
#[cfg(not(debug_assertions))]
pub(crate) struct SlotClaim<'a> {
    _frame: PhantomData<&'a SlotFrame>,
}

#[cfg(debug_assertions)]
impl Drop for SlotClaim<'_> {
    fn drop(&mut self) {
        let write_index = self.instr.writeloc().index();
        // Readers registered after our writer swap but before their own
        // writer check would slip past the claim-time asserts; anything
        // still outstanding now, beyond this instruction's own reads of
        // its write slot, is a concurrent reader the DAG missed.
        let self_reads = self
            .instr
            .readlocs()
            .iter()
            .filter(|loc| loc.index() == write_index)
            .count();
        let observed = self.frame.access[write_index]
            .readers
            .load(Ordering::SeqCst);
        assert_eq!(
            observed, self_reads,
            "slot {write_index} still has outstanding readers at write completion; a dependency edge is missing"
        );
        for loc in self.instr.readlocs() {
            self.frame.access[loc.index()]
                .readers
                .fetch_sub(1, Ordering::SeqCst);
        }
        let prev = self.frame.access[write_index]
            .writer
            .swap(NO_WORKER, Ordering::SeqCst);
        debug_assert_eq!(prev, self.worker, "write claim on slot {write_index} clobbered");
    }
}

/// What an instruction sees while firing: the slot frame, the argument
/// binding for the current run, and the id of the executing worker.
#[derive(Clone, Copy)]
pub(crate) struct ExecContext<'a> {
    pub frame: &'a SlotFrame,
    pub args: &'a [Object],
    pub worker: usize,
}

impl<'a> ExecContext<'a> {
    pub fn get(&self, loc: MemLocation) -> Result<Object> {
        self.frame.get(loc)
    }

    pub fn set(&self, loc: MemLocation, obj: Object) {
        self.frame.set(loc, obj);
    }

    /// Acquire the `ind`-th run argument. Bounds are guaranteed by the
    /// arity check at run start and index validation at construction.
    pub fn getarg(&self, ind: usize) -> Object {
        self.args[ind].clone()
    }
}
