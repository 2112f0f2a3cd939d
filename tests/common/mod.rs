//! Shared fixtures: object builders, host kernels, and program builders.

#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{anyhow, Result};
use graphvm::{
    ByRefCallable, ByValCallable, DType, Device, ElemData, ExecutionGraph, Instruction, KernelData,
    MemLocation, Object, Tensor,
};

pub fn no_data() -> KernelData {
    Arc::new(())
}

/// One-element i64 tensor, the shape-component currency of Alloc.
pub fn scalar_i64(value: i64) -> Object {
    let tensor = Tensor::new(vec![1], Device::Cpu, ElemData::I64(vec![value]))
        .expect("scalar tensor shape");
    Object::from_tensor(tensor)
}

pub fn tensor_f32(shape: &[usize], data: Vec<f32>) -> Object {
    let tensor =
        Tensor::new(shape.to_vec(), Device::Cpu, ElemData::F32(data)).expect("tensor shape");
    Object::from_tensor(tensor)
}

/// Copy out the f32 storage of a tensor handle.
pub fn f32_data(obj: &Object) -> Vec<f32> {
    obj.lock_tensor()
        .expect("tensor handle")
        .data
        .as_f32()
        .expect("f32 tensor")
        .to_vec()
}

pub fn tensor_shape(obj: &Object) -> Vec<usize> {
    obj.lock_tensor().expect("tensor handle").shape.clone()
}

// ---------------------------------------------------------------------------
// Host kernels. Inputs must not alias the output buffer.
// ---------------------------------------------------------------------------

/// Elementwise f32 add into a pre-allocated output buffer.
pub fn add_f32(_data: &KernelData, reads: &[Object], write: &Object) -> Result<()> {
    let lhs = reads[0].lock_tensor()?;
    let rhs = reads[1].lock_tensor()?;
    let mut out = write.lock_tensor()?;
    let lhs_data = lhs.data.as_f32().ok_or_else(|| anyhow!("add_f32 expects f32 inputs"))?;
    let rhs_data = rhs.data.as_f32().ok_or_else(|| anyhow!("add_f32 expects f32 inputs"))?;
    if lhs_data.len() != rhs_data.len() {
        return Err(anyhow!("add_f32 input lengths differ"));
    }
    let out_data = out
        .data
        .as_f32_mut()
        .ok_or_else(|| anyhow!("add_f32 expects an f32 output buffer"))?;
    if out_data.len() != lhs_data.len() {
        return Err(anyhow!("add_f32 output length differs from inputs"));
    }
    for (dst, (a, b)) in out_data.iter_mut().zip(lhs_data.iter().zip(rhs_data.iter())) {
        *dst = a + b;
    }
    Ok(())
}

/// Produce the leading dimension of the first read as an i64 scalar.
pub fn size0_i64(_data: &KernelData, reads: &[Object]) -> Result<Object> {
    let tensor = reads[0].lock_tensor()?;
    let dim = *tensor.shape.first().unwrap_or(&1);
    Ok(scalar_i64(dim as i64))
}

/// Concatenate 1-d f32 tensors into a freshly produced tensor.
pub fn concat_f32(_data: &KernelData, reads: &[Object]) -> Result<Object> {
    let mut out = Vec::new();
    for read in reads {
        let tensor = read.lock_tensor()?;
        let data = tensor
            .data
            .as_f32()
            .ok_or_else(|| anyhow!("concat_f32 expects f32 inputs"))?;
        out.extend_from_slice(data);
    }
    let len = out.len();
    Ok(Object::from_tensor(Tensor::new(
        vec![len],
        Device::Cpu,
        ElemData::F32(out),
    )?))
}

/// Like `concat_f32` but refuses to produce an empty result.
pub fn nonempty_concat_f32(data: &KernelData, reads: &[Object]) -> Result<Object> {
    let out = concat_f32(data, reads)?;
    if out.lock_tensor()?.numel() == 0 {
        return Err(anyhow!("refusing to concatenate into an empty tensor"));
    }
    Ok(out)
}

/// Scale the first read by the f32 factor bound as kernel data.
pub fn scale_f32(data: &KernelData, reads: &[Object]) -> Result<Object> {
    let factor = *data
        .downcast_ref::<f32>()
        .ok_or_else(|| anyhow!("scale_f32 payload must be f32"))?;
    let tensor = reads[0].lock_tensor()?;
    let src = tensor
        .data
        .as_f32()
        .ok_or_else(|| anyhow!("scale_f32 expects f32 input"))?;
    let scaled: Vec<f32> = src.iter().map(|v| v * factor).collect();
    Ok(Object::from_tensor(Tensor::new(
        tensor.shape.clone(),
        Device::Cpu,
        ElemData::F32(scaled),
    )?))
}

/// Elementwise sum of every read, scaled by the f32 payload.
pub fn sum_scale_f32(data: &KernelData, reads: &[Object]) -> Result<Object> {
    let factor = *data
        .downcast_ref::<f32>()
        .ok_or_else(|| anyhow!("sum_scale_f32 payload must be f32"))?;
    let first = reads[0].lock_tensor()?;
    let mut acc = first
        .data
        .as_f32()
        .ok_or_else(|| anyhow!("sum_scale_f32 expects f32 inputs"))?
        .to_vec();
    let shape = first.shape.clone();
    drop(first);
    for read in &reads[1..] {
        let tensor = read.lock_tensor()?;
        let data = tensor
            .data
            .as_f32()
            .ok_or_else(|| anyhow!("sum_scale_f32 expects f32 inputs"))?;
        if data.len() != acc.len() {
            return Err(anyhow!("sum_scale_f32 input lengths differ"));
        }
        for (dst, v) in acc.iter_mut().zip(data.iter()) {
            *dst += v;
        }
    }
    for v in acc.iter_mut() {
        *v *= factor;
    }
    Ok(Object::from_tensor(Tensor::new(
        shape,
        Device::Cpu,
        ElemData::F32(acc),
    )?))
}

// ---------------------------------------------------------------------------
// Program builders
// ---------------------------------------------------------------------------

/// Identity program: load one argument and wrap it in a tuple.
pub fn identity_graph() -> (Arc<ExecutionGraph>, Vec<MemLocation>) {
    let instrs = vec![
        Instruction::load_argument("load x", 1, 0, MemLocation::cpu(0)),
        Instruction::build_tup("pack result", 2, vec![MemLocation::cpu(0)], MemLocation::cpu(1)),
    ];
    (
        Arc::new(ExecutionGraph::new(instrs, 1, 2)),
        vec![MemLocation::cpu(0)],
    )
}

/// In-place add program: load two tensors, measure the first, allocate the
/// sum buffer, add by reference, pack the result.
///
/// Slots: 0 lhs, 1 rhs, 2 length scalar, 3 sum buffer, 4 result tuple.
pub fn add_graph() -> (Arc<ExecutionGraph>, Vec<MemLocation>) {
    let instrs = vec![
        Instruction::load_argument("load x", 10, 0, MemLocation::cpu(0)),
        Instruction::load_argument("load y", 11, 1, MemLocation::cpu(1)),
        Instruction::return_by_val(
            "size of x",
            12,
            vec![MemLocation::cpu(0)],
            MemLocation::cpu(2),
            ByValCallable::new(size0_i64, no_data()),
            true,
        ),
        Instruction::alloc(
            "alloc sum",
            13,
            DType::F32,
            vec![MemLocation::cpu(2)],
            MemLocation::cpu(3),
        ),
        Instruction::return_by_ref(
            "add x y",
            14,
            vec![MemLocation::cpu(0), MemLocation::cpu(1)],
            MemLocation::cpu(3),
            ByRefCallable::new(add_f32, no_data()),
            false,
        ),
        Instruction::build_tup("pack result", 15, vec![MemLocation::cpu(3)], MemLocation::cpu(4)),
    ];
    (
        Arc::new(ExecutionGraph::new(instrs, 2, 5)),
        vec![MemLocation::cpu(3)],
    )
}

/// Concatenation program whose output shape is only known at run time.
pub fn concat_graph() -> (Arc<ExecutionGraph>, Vec<MemLocation>) {
    let instrs = vec![
        Instruction::load_argument("load x", 20, 0, MemLocation::cpu(0)),
        Instruction::load_argument("load y", 21, 1, MemLocation::cpu(1)),
        Instruction::return_by_val(
            "concat x y",
            22,
            vec![MemLocation::cpu(0), MemLocation::cpu(1)],
            MemLocation::cpu(2),
            ByValCallable::new(concat_f32, no_data()),
            false,
        ),
        Instruction::build_tup("pack result", 23, vec![MemLocation::cpu(2)], MemLocation::cpu(3)),
    ];
    (
        Arc::new(ExecutionGraph::new(instrs, 2, 4)),
        vec![MemLocation::cpu(2)],
    )
}
