//! Built-in single-class classifier.
//!
//! A small MobileNetV2-style stem with deterministic pseudo-random weights.
//! It exercises every kernel in [`OpResolver::classifier`] and gives the
//! host binary a model to run when no artifact is supplied.
//!
//! [`OpResolver::classifier`]: crate::ops::OpResolver::classifier

use crate::builder::ModelBuilder;
use crate::error::BuildError;
use crate::kernels::conv::output_extent;
use crate::model::Model;
use crate::ops::{Activation, ConvParams, OpCode, OpParams, PadParams, Padding};
use crate::tensor::{ElementType, Quantization, TensorInfo};

const STEM_CHANNELS: usize = 8;
const WEIGHT_SEED: u32 = 0x2545_f491;

/// Input quantization matching [`InputNormalization::SIGNED_UNIT`].
///
/// [`InputNormalization::SIGNED_UNIT`]: crate::tensor::InputNormalization::SIGNED_UNIT
pub const INPUT_QUANT: Quantization = Quantization::new(1.0 / 128.0, 0);

/// Sigmoid score in `[0, 1)`.
pub const OUTPUT_QUANT: Quantization = Quantization::new(1.0 / 256.0, -128);

struct XorShift(u32);

impl XorShift {
    fn next_i8(&mut self) -> f32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        ((x % 255) as i32 - 127) as f32
    }

    fn weights(&mut self, count: usize, scale: f32) -> Vec<f32> {
        (0..count).map(|_| self.next_i8() * scale).collect()
    }
}

fn int8(shape: &[usize], scale: f32, zero_point: i32) -> TensorInfo {
    TensorInfo::new(shape, ElementType::Int8, Quantization::new(scale, zero_point))
}

/// Classifier for RGB888 frames of `width` x `height`. Both must be non-zero.
pub fn classifier_model(width: usize, height: usize) -> Result<Model, BuildError> {
    let mut rng = XorShift(WEIGHT_SEED);
    let mut b = ModelBuilder::new();
    let c = STEM_CHANNELS;

    let input = b.add_tensor(TensorInfo::new(
        &[1, height, width, 3],
        ElementType::Int8,
        INPUT_QUANT,
    ));
    let padded = b.add_tensor(TensorInfo::new(
        &[1, height + 2, width + 2, 3],
        ElementType::Int8,
        INPUT_QUANT,
    ));
    b.add_node(
        OpCode::Pad,
        &[input],
        padded,
        OpParams::Pad(PadParams {
            top: 1,
            bottom: 1,
            left: 1,
            right: 1,
        }),
    );

    let (out_h, _) = output_extent(height + 2, 3, 2, Padding::Valid);
    let (out_w, _) = output_extent(width + 2, 3, 2, Padding::Valid);
    let relu_range = 6.0 / 255.0;

    let stem_filter =
        b.add_constant_values(int8(&[c, 3, 3, 3], 0.02, 0), &rng.weights(c * 27, 0.02));
    let stem_bias = b.add_constant_f32(&[c], &rng.weights(c, 0.01));
    let stem = b.add_tensor(int8(&[1, out_h, out_w, c], relu_range, -128));
    b.add_node(
        OpCode::Conv2D,
        &[padded, stem_filter, stem_bias],
        stem,
        OpParams::Conv(ConvParams {
            stride_h: 2,
            stride_w: 2,
            padding: Padding::Valid,
            activation: Activation::Relu6,
        }),
    );

    let dw_filter =
        b.add_constant_values(int8(&[1, 3, 3, c], 0.03, 0), &rng.weights(c * 9, 0.03));
    let dw_bias = b.add_constant_f32(&[c], &rng.weights(c, 0.01));
    let dw = b.add_tensor(int8(&[1, out_h, out_w, c], 0.05, 0));
    b.add_node(
        OpCode::DepthwiseConv2D,
        &[stem, dw_filter, dw_bias],
        dw,
        OpParams::Conv(ConvParams {
            stride_h: 1,
            stride_w: 1,
            padding: Padding::Same,
            activation: Activation::None,
        }),
    );

    let dw_relu = b.add_tensor(int8(&[1, out_h, out_w, c], relu_range, -128));
    b.add_node(OpCode::Relu6, &[dw], dw_relu, OpParams::None);

    let residual = b.add_tensor(int8(&[1, out_h, out_w, c], 12.0 / 255.0, -128));
    b.add_node(OpCode::Add, &[stem, dw_relu], residual, OpParams::None);

    let pooled = b.add_tensor(int8(&[1, c], 12.0 / 255.0, -128));
    b.add_node(OpCode::Mean, &[residual], pooled, OpParams::None);

    let fc_weights = b.add_constant_values(int8(&[1, c], 0.01, 0), &rng.weights(c, 0.01));
    let fc_bias = b.add_constant_f32(&[1], &[0.0]);
    let logit = b.add_tensor(int8(&[1, 1], 0.1, 0));
    b.add_node(
        OpCode::FullyConnected,
        &[pooled, fc_weights, fc_bias],
        logit,
        OpParams::None,
    );

    let score = b.add_tensor(TensorInfo::new(&[1, 1], ElementType::Int8, OUTPUT_QUANT));
    b.add_node(OpCode::Logistic, &[logit], score, OpParams::None);

    b.set_input(input);
    b.set_output(score);
    b.build_model()
}
