//! Tensor metadata and element access.
//!
//! Tensors are stored as raw little-endian bytes. Quantized tensors use the
//! affine mapping `real = scale * (q - zero_point)`.

use crate::error::InvokeError;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Tensor shape, at most four dimensions (NHWC).
pub type Shape = SmallVec<[usize; 4]>;

/// Element encoding of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    UInt8,
    Int8,
    Float32,
}

impl ElementType {
    /// Size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::UInt8 | Self::Int8 => 1,
            Self::Float32 => 4,
        }
    }

    pub(crate) const fn code(self) -> u8 {
        match self {
            Self::UInt8 => 0,
            Self::Int8 => 1,
            Self::Float32 => 2,
        }
    }

    pub(crate) const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::UInt8),
            1 => Some(Self::Int8),
            2 => Some(Self::Float32),
            _ => None,
        }
    }

    pub const fn is_quantized(self) -> bool {
        !matches!(self, Self::Float32)
    }
}

/// Affine quantization parameters. Ignored for `Float32`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantization {
    pub scale: f32,
    pub zero_point: i32,
}

impl Quantization {
    pub const NONE: Self = Self {
        scale: 1.0,
        zero_point: 0,
    };

    pub const fn new(scale: f32, zero_point: i32) -> Self {
        Self { scale, zero_point }
    }
}

impl Default for Quantization {
    fn default() -> Self {
        Self::NONE
    }
}

/// Shape, element type and quantization of a tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorInfo {
    pub shape: Shape,
    pub dtype: ElementType,
    pub quant: Quantization,
}

impl TensorInfo {
    pub fn new(shape: &[usize], dtype: ElementType, quant: Quantization) -> Self {
        Self {
            shape: SmallVec::from_slice(shape),
            dtype,
            quant,
        }
    }

    pub fn float(shape: &[usize]) -> Self {
        Self::new(shape, ElementType::Float32, Quantization::NONE)
    }

    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn byte_len(&self) -> usize {
        self.element_count() * self.dtype.size()
    }

    /// Dimension `i`, or 1 when the tensor has fewer dimensions.
    #[inline]
    pub fn dim(&self, i: usize) -> usize {
        self.shape.get(i).copied().unwrap_or(1)
    }
}

#[inline]
pub(crate) fn load(info: &TensorInfo, data: &[u8], i: usize) -> f32 {
    match info.dtype {
        ElementType::UInt8 => info.quant.scale * (data[i] as i32 - info.quant.zero_point) as f32,
        ElementType::Int8 => {
            info.quant.scale * ((data[i] as i8) as i32 - info.quant.zero_point) as f32
        }
        ElementType::Float32 => {
            let b = i * 4;
            f32::from_le_bytes([data[b], data[b + 1], data[b + 2], data[b + 3]])
        }
    }
}

#[inline]
pub(crate) fn store(info: &TensorInfo, data: &mut [u8], i: usize, value: f32) {
    match info.dtype {
        ElementType::UInt8 => {
            let q = (value / info.quant.scale).round() as i32 + info.quant.zero_point;
            data[i] = q.clamp(0, 255) as u8;
        }
        ElementType::Int8 => {
            let q = (value / info.quant.scale).round() as i32 + info.quant.zero_point;
            data[i] = q.clamp(-128, 127) as i8 as u8;
        }
        ElementType::Float32 => {
            let b = i * 4;
            data[b..b + 4].copy_from_slice(&value.to_le_bytes());
        }
    }
}

/// Read-only view of an engine tensor.
#[derive(Clone, Copy)]
pub struct TensorRef<'a> {
    info: &'a TensorInfo,
    data: &'a [u8],
}

impl<'a> TensorRef<'a> {
    pub(crate) fn new(info: &'a TensorInfo, data: &'a [u8]) -> Self {
        Self { info, data }
    }

    pub fn info(&self) -> &'a TensorInfo {
        self.info
    }

    pub fn len(&self) -> usize {
        self.info.element_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw stored bytes.
    pub fn bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Dequantized element `i`.
    #[inline]
    pub fn get(&self, i: usize) -> f32 {
        load(self.info, self.data, i)
    }

    /// Raw int8 element `i`. Only meaningful for `Int8` tensors.
    #[inline]
    pub fn get_i8(&self, i: usize) -> i8 {
        self.data[i] as i8
    }
}

/// Writable view of an engine tensor. The shape and storage are fixed.
pub struct TensorMut<'a> {
    info: &'a TensorInfo,
    data: &'a mut [u8],
}

impl<'a> TensorMut<'a> {
    pub(crate) fn new(info: &'a TensorInfo, data: &'a mut [u8]) -> Self {
        Self { info, data }
    }

    pub fn info(&self) -> &TensorInfo {
        self.info
    }

    pub fn len(&self) -> usize {
        self.info.element_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.data
    }

    #[inline]
    pub fn get(&self, i: usize) -> f32 {
        load(self.info, self.data, i)
    }

    /// Quantize and store element `i`.
    #[inline]
    pub fn set(&mut self, i: usize, value: f32) {
        store(self.info, self.data, i, value)
    }

    /// Set every element to the real value `value`.
    pub fn fill(&mut self, value: f32) {
        for i in 0..self.len() {
            self.set(i, value);
        }
    }

    /// Load interleaved 8-bit RGB pixels, normalizing each byte first.
    pub fn fill_from_rgb888(
        &mut self,
        pixels: &[u8],
        norm: InputNormalization,
    ) -> Result<(), InvokeError> {
        if pixels.len() != self.len() {
            return Err(InvokeError::InputSizeMismatch {
                expected: self.len(),
                actual: pixels.len(),
            });
        }
        for (i, &v) in pixels.iter().enumerate() {
            self.set(i, norm.apply(v));
        }
        Ok(())
    }
}

/// Maps a raw 8-bit pixel to the model's input range: `(v - mean) / std`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputNormalization {
    pub mean: f32,
    pub std: f32,
}

impl InputNormalization {
    /// `[0, 255]` to `[-1, 127/128]`. Exact in binary, so quantizing with
    /// scale `1/128` never lands on a rounding tie.
    pub const SIGNED_UNIT: Self = Self {
        mean: 128.0,
        std: 128.0,
    };

    /// Pixels passed through unchanged.
    pub const IDENTITY: Self = Self {
        mean: 0.0,
        std: 1.0,
    };

    #[inline]
    pub fn apply(&self, v: u8) -> f32 {
        (v as f32 - self.mean) / self.std
    }
}

impl Default for InputNormalization {
    fn default() -> Self {
        Self::SIGNED_UNIT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int8_roundtrip_within_half_step() {
        let info = TensorInfo::new(&[4], ElementType::Int8, Quantization::new(0.5, -3));
        let mut data = [0u8; 4];
        store(&info, &mut data, 0, 1.2);
        assert!((load(&info, &data, 0) - 1.0).abs() < 0.26);
    }

    #[test]
    fn test_int8_saturates() {
        let info = TensorInfo::new(&[2], ElementType::Int8, Quantization::new(0.1, 0));
        let mut data = [0u8; 2];
        store(&info, &mut data, 0, 1000.0);
        store(&info, &mut data, 1, -1000.0);
        assert_eq!(data[0] as i8, 127);
        assert_eq!(data[1] as i8, -128);
    }

    #[test]
    fn test_float32_storage() {
        let info = TensorInfo::float(&[2]);
        let mut data = [0u8; 8];
        store(&info, &mut data, 1, -2.5);
        assert_eq!(load(&info, &data, 1), -2.5);
        assert_eq!(load(&info, &data, 0), 0.0);
    }

    #[test]
    fn test_fill_from_rgb_normalizes() {
        let info = TensorInfo::new(&[1, 1, 1, 3], ElementType::Int8, Quantization::new(1.0 / 128.0, 0));
        let mut data = [0u8; 3];
        let mut tensor = TensorMut::new(&info, &mut data);
        tensor
            .fill_from_rgb888(&[0, 128, 255], InputNormalization::SIGNED_UNIT)
            .unwrap();
        assert_eq!(data[0] as i8, -128);
        assert_eq!(data[1] as i8, 0);
        assert_eq!(data[2] as i8, 127);
    }

    #[test]
    fn test_signed_unit_quantizes_every_pixel_exactly() {
        let info = TensorInfo::new(&[256], ElementType::Int8, Quantization::new(1.0 / 128.0, 0));
        let pixels: Vec<u8> = (0..=255).collect();
        let mut data = [0u8; 256];
        let mut tensor = TensorMut::new(&info, &mut data);
        tensor
            .fill_from_rgb888(&pixels, InputNormalization::SIGNED_UNIT)
            .unwrap();
        for (v, &q) in data.iter().enumerate() {
            assert_eq!(q as i8 as i32, v as i32 - 128);
        }
    }

    #[test]
    fn test_fill_from_rgb_checks_length() {
        let info = TensorInfo::new(&[1, 2, 2, 3], ElementType::UInt8, Quantization::NONE);
        let mut data = [0u8; 12];
        let mut tensor = TensorMut::new(&info, &mut data);
        let err = tensor
            .fill_from_rgb888(&[0; 11], InputNormalization::IDENTITY)
            .unwrap_err();
        assert_eq!(
            err,
            InvokeError::InputSizeMismatch {
                expected: 12,
                actual: 11
            }
        );
    }

    #[test]
    fn test_dim_defaults_to_one() {
        let info = TensorInfo::float(&[1, 8]);
        assert_eq!(info.dim(1), 8);
        assert_eq!(info.dim(3), 1);
    }
}
