//! 2D convolution and depthwise convolution (NHWC, batch 1).

use super::{expect_inputs, finite, nhwc, KernelContext, KernelError};
use crate::ops::{Activation, ConvParams, Node, OpCode, OpParams, Padding, Registration};
use crate::tensor::TensorInfo;

pub const CONV_2D: Registration = Registration {
    op: OpCode::Conv2D,
    prepare: prepare_conv,
    eval: eval_conv,
};

pub const DEPTHWISE_CONV_2D: Registration = Registration {
    op: OpCode::DepthwiseConv2D,
    prepare: prepare_depthwise,
    eval: eval_depthwise,
};

/// Output extent and leading padding along one spatial axis.
pub(crate) fn output_extent(input: usize, kernel: usize, stride: usize, padding: Padding) -> (usize, usize) {
    match padding {
        Padding::Valid => {
            if input < kernel {
                (0, 0)
            } else {
                ((input - kernel) / stride + 1, 0)
            }
        }
        Padding::Same => {
            let out = input.div_ceil(stride);
            let total = ((out.saturating_sub(1)) * stride + kernel).saturating_sub(input);
            (out, total / 2)
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ConvGeometry {
    in_h: usize,
    in_w: usize,
    in_c: usize,
    k_h: usize,
    k_w: usize,
    out_h: usize,
    out_w: usize,
    out_c: usize,
    stride_h: usize,
    stride_w: usize,
    pad_top: usize,
    pad_left: usize,
    activation: Activation,
}

fn conv_params(node: &Node) -> Result<ConvParams, String> {
    match node.params {
        OpParams::Conv(p) => Ok(p),
        other => Err(format!("expected convolution parameters, got {other:?}")),
    }
}

fn geometry(
    node: &Node,
    inputs: &[&TensorInfo],
    output: &TensorInfo,
    depthwise: bool,
) -> Result<ConvGeometry, String> {
    expect_inputs(inputs.len(), 3)?;
    let params = conv_params(node)?;
    let [in_h, in_w, in_c] = nhwc(&inputs[0].shape, "input")?;

    let (k_h, k_w, out_c) = match (depthwise, inputs[1].shape.as_slice()) {
        (false, &[oc, kh, kw, ic]) if ic == in_c => (kh, kw, oc),
        (true, &[1, kh, kw, c]) if c == in_c => (kh, kw, c),
        (_, shape) => {
            return Err(format!(
                "filter shape {shape:?} does not fit input channels {in_c}"
            ))
        }
    };
    if inputs[2].element_count() != out_c {
        return Err(format!(
            "bias has {} elements, expected {out_c}",
            inputs[2].element_count()
        ));
    }

    let stride_h = params.stride_h as usize;
    let stride_w = params.stride_w as usize;
    let (out_h, pad_top) = output_extent(in_h, k_h, stride_h, params.padding);
    let (out_w, pad_left) = output_extent(in_w, k_w, stride_w, params.padding);

    if output.shape.as_slice() != [1, out_h, out_w, out_c] {
        return Err(format!(
            "output shape {:?} should be [1, {out_h}, {out_w}, {out_c}]",
            output.shape
        ));
    }

    Ok(ConvGeometry {
        in_h,
        in_w,
        in_c,
        k_h,
        k_w,
        out_h,
        out_w,
        out_c,
        stride_h,
        stride_w,
        pad_top,
        pad_left,
        activation: params.activation,
    })
}

#[inline]
fn activate(v: f32, activation: Activation) -> f32 {
    match activation {
        Activation::None => v,
        Activation::Relu6 => v.clamp(0.0, 6.0),
    }
}

/// Input row/column for an output position and kernel tap, if in bounds.
#[inline]
fn source(out: usize, stride: usize, tap: usize, pad: usize, extent: usize) -> Option<usize> {
    (out * stride + tap)
        .checked_sub(pad)
        .filter(|&i| i < extent)
}

fn prepare_conv(node: &Node, inputs: &[&TensorInfo], output: &TensorInfo) -> Result<usize, String> {
    geometry(node, inputs, output, false).map(|_| 0)
}

fn prepare_depthwise(
    node: &Node,
    inputs: &[&TensorInfo],
    output: &TensorInfo,
) -> Result<usize, String> {
    geometry(node, inputs, output, true).map(|_| 0)
}

fn context_geometry(ctx: &KernelContext<'_>, depthwise: bool) -> Result<ConvGeometry, KernelError> {
    let infos = [
        ctx.input(0)?.info(),
        ctx.input(1)?.info(),
        ctx.input(2)?.info(),
    ];
    geometry(ctx.node, &infos, ctx.output.info(), depthwise)
        .map_err(|_| KernelError::Invalid("convolution shapes changed after prepare"))
}

fn eval_conv(ctx: &mut KernelContext<'_>) -> Result<(), KernelError> {
    let g = context_geometry(ctx, false)?;
    let (input, filter, bias) = (ctx.input(0)?, ctx.input(1)?, ctx.input(2)?);

    for oy in 0..g.out_h {
        for ox in 0..g.out_w {
            for oc in 0..g.out_c {
                let mut acc = bias.get(oc);
                for ky in 0..g.k_h {
                    let Some(iy) = source(oy, g.stride_h, ky, g.pad_top, g.in_h) else {
                        continue;
                    };
                    for kx in 0..g.k_w {
                        let Some(ix) = source(ox, g.stride_w, kx, g.pad_left, g.in_w) else {
                            continue;
                        };
                        let in_base = (iy * g.in_w + ix) * g.in_c;
                        let w_base = ((oc * g.k_h + ky) * g.k_w + kx) * g.in_c;
                        for ic in 0..g.in_c {
                            acc += input.get(in_base + ic) * filter.get(w_base + ic);
                        }
                    }
                }
                let out_idx = (oy * g.out_w + ox) * g.out_c + oc;
                ctx.output.set(out_idx, finite(activate(acc, g.activation))?);
            }
        }
    }
    Ok(())
}

fn eval_depthwise(ctx: &mut KernelContext<'_>) -> Result<(), KernelError> {
    let g = context_geometry(ctx, true)?;
    let (input, filter, bias) = (ctx.input(0)?, ctx.input(1)?, ctx.input(2)?);

    for oy in 0..g.out_h {
        for ox in 0..g.out_w {
            for ch in 0..g.out_c {
                let mut acc = bias.get(ch);
                for ky in 0..g.k_h {
                    let Some(iy) = source(oy, g.stride_h, ky, g.pad_top, g.in_h) else {
                        continue;
                    };
                    for kx in 0..g.k_w {
                        let Some(ix) = source(ox, g.stride_w, kx, g.pad_left, g.in_w) else {
                            continue;
                        };
                        acc += input.get((iy * g.in_w + ix) * g.in_c + ch)
                            * filter.get((ky * g.k_w + kx) * g.out_c + ch);
                    }
                }
                let out_idx = (oy * g.out_w + ox) * g.out_c + ch;
                ctx.output.set(out_idx, finite(activate(acc, g.activation))?);
            }
        }
    }
    Ok(())
}
