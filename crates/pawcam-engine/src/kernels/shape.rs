//! Spatial padding and spatial mean.

use super::{expect_inputs, finite, nhwc, KernelContext, KernelError};
use crate::ops::{Node, OpCode, OpParams, PadParams, Registration};
use crate::tensor::TensorInfo;

pub const PAD: Registration = Registration {
    op: OpCode::Pad,
    prepare: prepare_pad,
    eval: eval_pad,
};

pub const MEAN: Registration = Registration {
    op: OpCode::Mean,
    prepare: prepare_mean,
    eval: eval_mean,
};

fn pad_params(node: &Node) -> Result<PadParams, String> {
    match node.params {
        OpParams::Pad(p) => Ok(p),
        other => Err(format!("expected pad parameters, got {other:?}")),
    }
}

fn prepare_pad(node: &Node, inputs: &[&TensorInfo], output: &TensorInfo) -> Result<usize, String> {
    expect_inputs(inputs.len(), 1)?;
    let p = pad_params(node)?;
    let [h, w, c] = nhwc(&inputs[0].shape, "input")?;
    let expected = [
        1,
        h + p.top as usize + p.bottom as usize,
        w + p.left as usize + p.right as usize,
        c,
    ];
    if output.shape.as_slice() != expected {
        return Err(format!(
            "output shape {:?} should be {expected:?}",
            output.shape
        ));
    }
    Ok(0)
}

fn eval_pad(ctx: &mut KernelContext<'_>) -> Result<(), KernelError> {
    let input = ctx.input(0)?;
    let p = pad_params(ctx.node).map_err(|_| KernelError::Invalid("missing pad parameters"))?;
    let [in_h, in_w, c] =
        nhwc(&input.info().shape, "input").map_err(|_| KernelError::Invalid("input rank"))?;
    let [out_h, out_w, _] = nhwc(&ctx.output.info().shape, "output")
        .map_err(|_| KernelError::Invalid("output rank"))?;
    let (top, left) = (p.top as usize, p.left as usize);

    for oy in 0..out_h {
        let iy = oy.checked_sub(top).filter(|&y| y < in_h);
        for ox in 0..out_w {
            let ix = ox.checked_sub(left).filter(|&x| x < in_w);
            let out_base = (oy * out_w + ox) * c;
            match (iy, ix) {
                (Some(iy), Some(ix)) => {
                    let in_base = (iy * in_w + ix) * c;
                    for ch in 0..c {
                        ctx.output.set(out_base + ch, input.get(in_base + ch));
                    }
                }
                _ => {
                    for ch in 0..c {
                        ctx.output.set(out_base + ch, 0.0);
                    }
                }
            }
        }
    }
    Ok(())
}

fn prepare_mean(_node: &Node, inputs: &[&TensorInfo], output: &TensorInfo) -> Result<usize, String> {
    expect_inputs(inputs.len(), 1)?;
    let [_, _, c] = nhwc(&inputs[0].shape, "input")?;
    if output.element_count() != c {
        return Err(format!(
            "output has {} elements, expected one per channel ({c})",
            output.element_count()
        ));
    }
    // One f32 accumulator per channel.
    Ok(c * 4)
}

fn eval_mean(ctx: &mut KernelContext<'_>) -> Result<(), KernelError> {
    let input = ctx.input(0)?;
    let [h, w, c] =
        nhwc(&input.info().shape, "input").map_err(|_| KernelError::Invalid("input rank"))?;
    let acc = ctx
        .scratch
        .get_mut(..c * 4)
        .ok_or(KernelError::Invalid("scratch smaller than channel count"))?;
    acc.fill(0);

    for px in 0..h * w {
        for ch in 0..c {
            let slot = &mut acc[ch * 4..ch * 4 + 4];
            let sum = f32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]])
                + input.get(px * c + ch);
            slot.copy_from_slice(&sum.to_le_bytes());
        }
    }

    let count = (h * w).max(1) as f32;
    for ch in 0..c {
        let slot = &acc[ch * 4..ch * 4 + 4];
        let sum = f32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]);
        ctx.output.set(ch, finite(sum / count)?);
    }
    Ok(())
}
