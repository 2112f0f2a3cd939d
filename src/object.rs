//! Refcounted tensor/tuple handles and their device/dtype descriptors.
//!
//! The execution core treats objects as opaque handles: cloning a handle
//! acquires a reference, dropping releases it. In-place kernels write through
//! the tensor's interior mutex, so a handle stored in several slots or tuples
//! observes the mutation.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::error::ExecError;

/// Placement tag carried on memory locations and tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Device {
    Cpu,
    Gpu,
}

/// Element type of a dense tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DType {
    I32,
    I64,
    F32,
    F64,
}

/// Flat element storage, one vector per dtype.
#[derive(Debug, Clone, PartialEq)]
pub enum ElemData {
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl ElemData {
    fn zeroed(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::I32 => ElemData::I32(vec![0; len]),
            DType::I64 => ElemData::I64(vec![0; len]),
            DType::F32 => ElemData::F32(vec![0.0; len]),
            DType::F64 => ElemData::F64(vec![0.0; len]),
        }
    }

    /// Element type of this storage.
    pub fn dtype(&self) -> DType {
        match self {
            ElemData::I32(_) => DType::I32,
            ElemData::I64(_) => DType::I64,
            ElemData::F32(_) => DType::F32,
            ElemData::F64(_) => DType::F64,
        }
    }

    /// Number of stored elements.
    pub fn len(&self) -> usize {
        match self {
            ElemData::I32(v) => v.len(),
            ElemData::I64(v) => v.len(),
            ElemData::F32(v) => v.len(),
            ElemData::F64(v) => v.len(),
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            ElemData::F32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32_mut(&mut self) -> Option<&mut [f32]> {
        match self {
            ElemData::F32(v) => Some(v),
            _ => None,
        }
    }
}

/// Dense n-dimensional array with owned flat storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub dtype: DType,
    pub shape: Vec<usize>,
    pub device: Device,
    pub data: ElemData,
}

impl Tensor {
    /// Build a tensor from flat storage; the data length must match the shape.
    pub fn new(shape: Vec<usize>, device: Device, data: ElemData) -> Result<Self> {
        let numel: usize = shape.iter().product();
        if data.len() != numel {
            return Err(ExecError::TypeMismatch(format!(
                "tensor data has {} elements, shape {:?} needs {}",
                data.len(),
                shape,
                numel
            ))
            .into());
        }
        Ok(Self {
            dtype: data.dtype(),
            shape,
            device,
            data,
        })
    }

    /// Logical element count.
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

#[derive(Debug)]
enum Payload {
    Tensor(Mutex<Tensor>),
    Tuple(Vec<Object>),
}

/// Opaque refcounted handle to a tensor or a tuple of objects.
///
/// `clone` acquires a reference and `drop` releases it; slot stores and loads
/// go through these two operations only.
#[derive(Debug, Clone)]
pub struct Object {
    payload: Arc<Payload>,
}

impl Object {
    /// Wrap a tensor in a fresh handle.
    pub fn from_tensor(tensor: Tensor) -> Self {
        Self {
            payload: Arc::new(Payload::Tensor(Mutex::new(tensor))),
        }
    }

    /// Whether this handle refers to a tuple.
    pub fn is_tuple(&self) -> bool {
        matches!(*self.payload, Payload::Tuple(_))
    }

    /// Whether this handle refers to a tensor.
    pub fn is_tensor(&self) -> bool {
        matches!(*self.payload, Payload::Tensor(_))
    }

    /// Borrow the tuple elements, if this is a tuple.
    pub fn as_tuple(&self) -> Option<&[Object]> {
        match &*self.payload {
            Payload::Tuple(items) => Some(items),
            Payload::Tensor(_) => None,
        }
    }

    /// Tuple element count, if this is a tuple.
    pub fn tuple_len(&self) -> Option<usize> {
        self.as_tuple().map(|items| items.len())
    }

    /// Acquire the `i`-th tuple element, if this is a tuple.
    pub fn tuple_get(&self, i: usize) -> Option<Object> {
        self.as_tuple().and_then(|items| items.get(i)).cloned()
    }

    /// Lock the tensor for reading or in-place mutation.
    pub fn lock_tensor(&self) -> Result<MutexGuard<'_, Tensor>> {
        match &*self.payload {
            Payload::Tensor(cell) => cell.lock().map_err(|_| anyhow!("tensor mutex poisoned")),
            Payload::Tuple(_) => {
                Err(ExecError::TypeMismatch("expected a tensor, found a tuple".into()).into())
            }
        }
    }

    /// Read a one-element integer tensor as a non-negative size.
    pub fn scalar_as_size(&self) -> Result<usize> {
        let tensor = self.lock_tensor()?;
        if tensor.numel() != 1 {
            return Err(ExecError::TypeMismatch(format!(
                "expected a scalar, found shape {:?}",
                tensor.shape
            ))
            .into());
        }
        let value = match &tensor.data {
            ElemData::I32(v) => i64::from(v[0]),
            ElemData::I64(v) => v[0],
            ElemData::F32(_) | ElemData::F64(_) => {
                return Err(ExecError::TypeMismatch(format!(
                    "shape component must be an integer scalar, found {:?}",
                    tensor.dtype
                ))
                .into())
            }
        };
        usize::try_from(value).map_err(|_| {
            ExecError::TypeMismatch(format!("shape component is negative: {}", value)).into()
        })
    }

    /// Current strong reference count of the underlying handle.
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.payload)
    }

    /// Whether two handles refer to the same underlying object.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }
}

/// Allocate a zero-initialized tensor with the given shape, dtype, and placement.
pub fn alloc_tensor(dtype: DType, shape: &[usize], device: Device) -> Object {
    let numel: usize = shape.iter().product();
    Object::from_tensor(Tensor {
        dtype,
        shape: shape.to_vec(),
        device,
        data: ElemData::zeroed(dtype, numel),
    })
}

/// Build a tuple handle from already-acquired elements.
pub fn build_tuple(items: Vec<Object>) -> Object {
    Object {
        payload: Arc::new(Payload::Tuple(items)),
    }
}
