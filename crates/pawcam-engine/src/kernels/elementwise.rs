//! Elementwise operators.

use super::{expect_inputs, finite, KernelContext, KernelError};
use crate::ops::{Node, OpCode, Registration};
use crate::tensor::TensorInfo;

pub const ADD: Registration = Registration {
    op: OpCode::Add,
    prepare: prepare_add,
    eval: eval_add,
};

pub const RELU6: Registration = Registration {
    op: OpCode::Relu6,
    prepare: prepare_unary,
    eval: eval_relu6,
};

pub const LOGISTIC: Registration = Registration {
    op: OpCode::Logistic,
    prepare: prepare_unary,
    eval: eval_logistic,
};

fn prepare_add(_node: &Node, inputs: &[&TensorInfo], output: &TensorInfo) -> Result<usize, String> {
    expect_inputs(inputs.len(), 2)?;
    if inputs[0].shape != inputs[1].shape || inputs[0].shape != output.shape {
        return Err(format!(
            "operands {:?} + {:?} -> {:?} must share one shape",
            inputs[0].shape, inputs[1].shape, output.shape
        ));
    }
    Ok(0)
}

fn prepare_unary(_node: &Node, inputs: &[&TensorInfo], output: &TensorInfo) -> Result<usize, String> {
    expect_inputs(inputs.len(), 1)?;
    if inputs[0].element_count() != output.element_count() {
        return Err(format!(
            "input has {} elements, output {}",
            inputs[0].element_count(),
            output.element_count()
        ));
    }
    Ok(0)
}

fn eval_add(ctx: &mut KernelContext<'_>) -> Result<(), KernelError> {
    let (a, b) = (ctx.input(0)?, ctx.input(1)?);
    for i in 0..ctx.output.len() {
        ctx.output.set(i, finite(a.get(i) + b.get(i))?);
    }
    Ok(())
}

fn map_unary(ctx: &mut KernelContext<'_>, f: impl Fn(f32) -> f32) -> Result<(), KernelError> {
    let input = ctx.input(0)?;
    for i in 0..ctx.output.len() {
        ctx.output.set(i, finite(f(input.get(i)))?);
    }
    Ok(())
}

fn eval_relu6(ctx: &mut KernelContext<'_>) -> Result<(), KernelError> {
    map_unary(ctx, |x| x.clamp(0.0, 6.0))
}

fn eval_logistic(ctx: &mut KernelContext<'_>) -> Result<(), KernelError> {
    map_unary(ctx, |x| 1.0 / (1.0 + (-x).exp()))
}
