//! Writer for the model artifact format.

use crate::error::BuildError;
use crate::model::{Model, FLAG_CONSTANT, HEADER_LEN, MODEL_MAGIC, SUPPORTED_SCHEMA_VERSION};
use crate::ops::{Node, OpCode, OpParams};
use crate::tensor::{self, TensorInfo};

struct TensorEntry {
    info: TensorInfo,
    data: Option<Vec<u8>>,
}

/// Assembles a graph and serializes it. No validation happens here; the
/// engine validates artifacts when it loads them.
pub struct ModelBuilder {
    version: u32,
    tensors: Vec<TensorEntry>,
    nodes: Vec<Node>,
    input: usize,
    output: usize,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self {
            version: SUPPORTED_SCHEMA_VERSION,
            tensors: Vec::new(),
            nodes: Vec::new(),
            input: 0,
            output: 0,
        }
    }

    /// Stamp a different schema version into the header.
    pub fn with_schema_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Add an activation tensor and return its index.
    pub fn add_tensor(&mut self, info: TensorInfo) -> usize {
        self.tensors.push(TensorEntry { info, data: None });
        self.tensors.len() - 1
    }

    /// Add a constant tensor with raw stored bytes.
    pub fn add_constant(&mut self, info: TensorInfo, data: Vec<u8>) -> usize {
        self.tensors.push(TensorEntry {
            info,
            data: Some(data),
        });
        self.tensors.len() - 1
    }

    pub fn add_constant_f32(&mut self, shape: &[usize], values: &[f32]) -> usize {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.add_constant(TensorInfo::float(shape), data)
    }

    /// Add a constant, quantizing real `values` into `info`'s element type.
    pub fn add_constant_values(&mut self, info: TensorInfo, values: &[f32]) -> usize {
        let mut data = vec![0u8; info.byte_len()];
        for (i, &v) in values.iter().enumerate().take(info.element_count()) {
            tensor::store(&info, &mut data, i, v);
        }
        self.add_constant(info, data)
    }

    pub fn add_node(&mut self, op: OpCode, inputs: &[usize], output: usize, params: OpParams) {
        self.nodes.push(Node {
            op,
            inputs: inputs.iter().copied().collect(),
            output,
            params,
        });
    }

    pub fn set_input(&mut self, tensor: usize) {
        self.input = tensor;
    }

    pub fn set_output(&mut self, tensor: usize) {
        self.output = tensor;
    }

    fn tables_len(&self) -> usize {
        let tensors: usize = self
            .tensors
            .iter()
            .map(|t| 20 + 4 * t.info.shape.len())
            .sum();
        let nodes: usize = self
            .nodes
            .iter()
            .map(|n| 8 + 4 * n.inputs.len() + n.params.encode().len())
            .sum();
        HEADER_LEN + tensors + nodes
    }

    /// Serialize the graph. Fails if a count, index, dimension or offset
    /// does not fit its field in the format.
    pub fn build(&self) -> Result<Vec<u8>, BuildError> {
        let mut out = Vec::with_capacity(self.tables_len());
        out.extend_from_slice(&MODEL_MAGIC);
        put_u32(&mut out, self.version);
        put_u32(&mut out, field_u32("tensor count", self.tensors.len())?);
        put_u32(&mut out, field_u32("node count", self.nodes.len())?);
        put_u32(&mut out, field_u32("input index", self.input)?);
        put_u32(&mut out, field_u32("output index", self.output)?);

        let mut data_offset = self.tables_len();
        for t in &self.tensors {
            out.push(t.info.dtype.code());
            out.push(field_u8("tensor rank", t.info.shape.len())?);
            out.push(if t.data.is_some() { FLAG_CONSTANT } else { 0 });
            out.push(0);
            for &dim in &t.info.shape {
                put_u32(&mut out, field_u32("dimension", dim)?);
            }
            out.extend_from_slice(&t.info.quant.scale.to_le_bytes());
            out.extend_from_slice(&t.info.quant.zero_point.to_le_bytes());
            let len = t.data.as_ref().map_or(0, Vec::len);
            let offset = if t.data.is_some() { data_offset } else { 0 };
            put_u32(&mut out, field_u32("data offset", offset)?);
            put_u32(&mut out, field_u32("data length", len)?);
            data_offset += len;
        }

        for n in &self.nodes {
            let params = n.params.encode();
            out.push(n.op.code());
            out.push(field_u8("node input count", n.inputs.len())?);
            out.push(field_u8("params length", params.len())?);
            out.push(0);
            for &i in &n.inputs {
                put_u32(&mut out, field_u32("node input", i)?);
            }
            put_u32(&mut out, field_u32("node output", n.output)?);
            out.extend_from_slice(&params);
        }

        for data in self.tensors.iter().filter_map(|t| t.data.as_ref()) {
            out.extend_from_slice(data);
        }
        Ok(out)
    }

    pub fn build_model(&self) -> Result<Model, BuildError> {
        self.build().map(Model::from_vec)
    }
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn field_u32(field: &'static str, value: usize) -> Result<u32, BuildError> {
    u32::try_from(value).map_err(|_| BuildError::FieldOverflow { field, value })
}

fn field_u8(field: &'static str, value: usize) -> Result<u8, BuildError> {
    u8::try_from(value).map_err(|_| BuildError::FieldOverflow { field, value })
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{ElementType, Quantization};

    #[test]
    fn test_header_fields() {
        let mut b = ModelBuilder::new().with_schema_version(7);
        let x = b.add_tensor(TensorInfo::float(&[2]));
        let y = b.add_tensor(TensorInfo::float(&[2]));
        b.add_node(OpCode::Logistic, &[x], y, OpParams::None);
        b.set_input(x);
        b.set_output(y);
        let bytes = b.build().unwrap();

        assert_eq!(&bytes[..4], b"PAWM");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 7);
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(bytes[12..16].try_into().unwrap()), 1);
        assert_eq!(u32::from_le_bytes(bytes[20..24].try_into().unwrap()), 1);
        assert_eq!(bytes.len(), b.tables_len());
    }

    #[test]
    fn test_constant_values_are_quantized() {
        let mut b = ModelBuilder::new();
        let info = TensorInfo::new(&[3], ElementType::Int8, Quantization::new(0.5, 1));
        b.add_constant_values(info, &[0.0, 1.0, -1.0]);
        let bytes = b.build().unwrap();
        let payload = &bytes[bytes.len() - 3..];
        assert_eq!(payload, &[1u8, 3, (-1i8) as u8]);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_oversized_dimension_is_rejected() {
        let mut b = ModelBuilder::new();
        let x = b.add_tensor(TensorInfo::float(&[1 << 32]));
        b.set_input(x);
        b.set_output(x);
        assert_eq!(
            b.build_model().unwrap_err(),
            BuildError::FieldOverflow {
                field: "dimension",
                value: 1 << 32
            }
        );
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_out_of_range_index_is_rejected() {
        let mut b = ModelBuilder::new();
        b.add_tensor(TensorInfo::float(&[1]));
        b.set_input(usize::MAX);
        assert!(matches!(
            b.build(),
            Err(BuildError::FieldOverflow {
                field: "input index",
                ..
            })
        ));
    }
}
