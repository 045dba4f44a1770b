//! Fully connected layer.

use super::{expect_inputs, finite, KernelContext, KernelError};
use crate::ops::{Node, OpCode, Registration};
use crate::tensor::TensorInfo;

pub const FULLY_CONNECTED: Registration = Registration {
    op: OpCode::FullyConnected,
    prepare: prepare_fully_connected,
    eval: eval_fully_connected,
};

/// `(units, depth)` from weights shaped `[units, depth]`.
fn weight_dims(weights: &TensorInfo) -> Option<(usize, usize)> {
    match *weights.shape.as_slice() {
        [units, depth] => Some((units, depth)),
        _ => None,
    }
}

fn prepare_fully_connected(
    _node: &Node,
    inputs: &[&TensorInfo],
    output: &TensorInfo,
) -> Result<usize, String> {
    expect_inputs(inputs.len(), 3)?;
    let (units, depth) = weight_dims(inputs[1])
        .ok_or_else(|| format!("weights must be [units, depth], got {:?}", inputs[1].shape))?;
    if inputs[0].element_count() != depth {
        return Err(format!(
            "input has {} elements, weights expect {depth}",
            inputs[0].element_count()
        ));
    }
    if inputs[2].element_count() != units || output.element_count() != units {
        return Err(format!(
            "bias {:?} and output {:?} must hold {units} elements",
            inputs[2].shape, output.shape
        ));
    }
    Ok(0)
}

fn eval_fully_connected(ctx: &mut KernelContext<'_>) -> Result<(), KernelError> {
    let (input, weights, bias) = (ctx.input(0)?, ctx.input(1)?, ctx.input(2)?);
    let (units, depth) =
        weight_dims(weights.info()).ok_or(KernelError::Invalid("weights rank"))?;

    for u in 0..units {
        let mut acc = bias.get(u);
        let row = u * depth;
        for d in 0..depth {
            acc += input.get(d) * weights.get(row + d);
        }
        ctx.output.set(u, finite(acc)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::test_util::{encode, node, run};
    use crate::ops::OpParams;

    #[test]
    fn test_dot_plus_bias() {
        let input = TensorInfo::float(&[1, 3]);
        let weights = TensorInfo::float(&[2, 3]);
        let bias = TensorInfo::float(&[2]);
        let output = TensorInfo::float(&[1, 2]);

        let x = encode(&input, &[1.0, 2.0, 3.0]);
        let w = encode(&weights, &[1.0, 0.0, -1.0, 0.5, 0.5, 0.5]);
        let b = encode(&bias, &[10.0, 0.0]);

        let n = node(OpCode::FullyConnected, 3, OpParams::None);
        assert_eq!(
            prepare_fully_connected(&n, &[&input, &weights, &bias], &output),
            Ok(0)
        );
        let out = run(
            &n,
            &[(&input, &x), (&weights, &w), (&bias, &b)],
            &output,
            0,
            eval_fully_connected,
        )
        .unwrap();
        assert_eq!(out, vec![8.0, 3.0]);
    }

    #[test]
    fn test_depth_mismatch() {
        let input = TensorInfo::float(&[1, 4]);
        let weights = TensorInfo::float(&[2, 3]);
        let bias = TensorInfo::float(&[2]);
        let output = TensorInfo::float(&[1, 2]);
        let n = node(OpCode::FullyConnected, 3, OpParams::None);
        assert!(prepare_fully_connected(&n, &[&input, &weights, &bias], &output).is_err());
    }
}
