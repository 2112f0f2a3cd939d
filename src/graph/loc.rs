use serde::Serialize;

use crate::object::Device;

/// Names one cell of the interpreter's slot frame.
///
/// Indices are dense: a graph with `n_locs` slots uses `[0, n_locs)`, with
/// the first `n_args` indices reserved for arguments. The device tag tells
/// allocation instructions where the cell's buffer lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MemLocation {
    index: usize,
    device: Device,
}

impl MemLocation {
    pub fn new(index: usize, device: Device) -> Self {
        Self { index, device }
    }

    /// Shorthand for a CPU-resident slot.
    pub fn cpu(index: usize) -> Self {
        Self::new(index, Device::Cpu)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn device(&self) -> Device {
        self.device
    }
}
