//! Reference kernels.
//!
//! Every kernel works in the dequantized domain: elements are read as
//! `f32`, combined, and requantized into the output tensor. Kernels write
//! every output element on every call and keep no state between calls.

pub mod conv;
pub mod dense;
pub mod elementwise;
pub mod shape;

use crate::ops::Node;
use crate::tensor::{TensorMut, TensorRef};
use smallvec::SmallVec;

/// Failure inside a kernel, mapped to `InvokeError` by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    NonFinite,
    Invalid(&'static str),
}

/// Everything a kernel may touch while evaluating one node.
pub struct KernelContext<'a> {
    pub node: &'a Node,
    pub inputs: SmallVec<[TensorRef<'a>; 3]>,
    pub output: TensorMut<'a>,
    pub scratch: &'a mut [u8],
}

impl<'a> KernelContext<'a> {
    #[inline]
    pub fn input(&self, i: usize) -> Result<TensorRef<'a>, KernelError> {
        self.inputs
            .get(i)
            .copied()
            .ok_or(KernelError::Invalid("missing input tensor"))
    }
}

#[inline]
pub(crate) fn finite(v: f32) -> Result<f32, KernelError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(KernelError::NonFinite)
    }
}

pub(crate) fn expect_inputs(inputs: usize, expected: usize) -> Result<(), String> {
    if inputs == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} inputs, got {inputs}"))
    }
}

/// Checks for a rank-4 tensor with batch 1 and returns `[h, w, c]`.
pub(crate) fn nhwc(shape: &[usize], what: &str) -> Result<[usize; 3], String> {
    match *shape {
        [1, h, w, c] => Ok([h, w, c]),
        _ => Err(format!("{what} must be [1, H, W, C], got {shape:?}")),
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::ops::{Node, OpCode, OpParams};
    use crate::tensor::TensorInfo;

    pub fn node(op: OpCode, inputs: usize, params: OpParams) -> Node {
        Node {
            op,
            inputs: (0..inputs).collect(),
            output: inputs,
            params,
        }
    }

    /// Encode `values` into the storage layout of `info`.
    pub fn encode(info: &TensorInfo, values: &[f32]) -> Vec<u8> {
        let mut data = vec![0u8; info.byte_len()];
        for (i, &v) in values.iter().enumerate() {
            crate::tensor::store(info, &mut data, i, v);
        }
        data
    }

    /// Run `eval` on float tensors and return the dequantized output.
    pub fn run<D: AsRef<[u8]>>(
        node: &Node,
        inputs: &[(&TensorInfo, D)],
        output: &TensorInfo,
        scratch_len: usize,
        eval: crate::ops::EvalFn,
    ) -> Result<Vec<f32>, KernelError> {
        let mut out = vec![0u8; output.byte_len()];
        let mut scratch = vec![0u8; scratch_len];
        {
            let mut ctx = KernelContext {
                node,
                inputs: inputs
                    .iter()
                    .map(|(info, data)| TensorRef::new(info, data.as_ref()))
                    .collect(),
                output: TensorMut::new(output, &mut out),
                scratch: &mut scratch,
            };
            eval(&mut ctx)?;
        }
        Ok((0..output.element_count())
            .map(|i| crate::tensor::load(output, &out, i))
            .collect())
    }
}
