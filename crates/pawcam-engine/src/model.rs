//! Model artifact parsing.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! header   magic "PAWM" | schema u32 | tensors u32 | nodes u32 | input u32 | output u32
//! tensor   dtype u8 | rank u8 | flags u8 | reserved u8 | dims rank*u32
//!          | scale f32 | zero_point i32 | data_offset u32 | data_len u32
//! node     opcode u8 | n_inputs u8 | param_len u8 | reserved u8
//!          | inputs n*u32 | output u32 | params param_len*u8
//! data     constant tensor payloads, addressed from the start of the file
//! ```

use crate::error::{InitError, InitResult};
use crate::ops::{Node, OpCode, OpParams};
use crate::tensor::{ElementType, Quantization, TensorInfo};
use smallvec::SmallVec;
use std::borrow::Cow;
use std::fmt;
use std::ops::Range;
use std::path::Path;

pub const MODEL_MAGIC: [u8; 4] = *b"PAWM";

/// Schema version this engine was built against.
pub const SUPPORTED_SCHEMA_VERSION: u32 = 3;

pub(crate) const HEADER_LEN: usize = 24;
pub(crate) const FLAG_CONSTANT: u8 = 0b1;
pub(crate) const MAX_RANK: usize = 4;
pub(crate) const MAX_NODE_INPUTS: usize = 3;

/// A model artifact, kept alive for the engine's lifetime because constant
/// tensors point into it.
#[derive(Clone)]
pub struct Model {
    bytes: Cow<'static, [u8]>,
}

impl Model {
    pub fn from_static(bytes: &'static [u8]) -> Self {
        Self {
            bytes: Cow::Borrowed(bytes),
        }
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Cow::Owned(bytes),
        }
    }

    /// Read an artifact from disk. Contents are validated at initialization.
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        std::fs::read(path).map(Self::from_vec)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Schema version from the header. Only the magic and version are read.
    pub fn schema_version(&self) -> InitResult<u32> {
        let mut reader = ByteReader::new(&self.bytes);
        if reader.take(4)? != MODEL_MAGIC {
            return Err(malformed("bad magic"));
        }
        reader.u32()
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model").field("len", &self.len()).finish()
    }
}

/// Parsed tensor record.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TensorDef {
    pub info: TensorInfo,
    /// Byte range of the payload inside the artifact, for constants.
    pub constant: Option<Range<usize>>,
}

/// Parsed graph, validated for index bounds and data flow.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ModelGraph {
    pub tensors: Vec<TensorDef>,
    pub nodes: Vec<Node>,
    pub input: usize,
    pub output: usize,
}

fn malformed(reason: impl Into<String>) -> InitError {
    InitError::MalformedModel(reason.into())
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> InitResult<&'a [u8]> {
        let bytes: &'a [u8] = self.bytes;
        let slice = self
            .pos
            .checked_add(n)
            .and_then(|end| bytes.get(self.pos..end))
            .ok_or_else(|| malformed(format!("truncated at byte {}", self.pos)))?;
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> InitResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> InitResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> InitResult<u32> {
        self.array().map(u32::from_le_bytes)
    }

    fn index(&mut self) -> InitResult<usize> {
        self.u32().map(|v| v as usize)
    }

    fn i32(&mut self) -> InitResult<i32> {
        self.array().map(i32::from_le_bytes)
    }

    fn f32(&mut self) -> InitResult<f32> {
        self.array().map(f32::from_le_bytes)
    }
}

/// Parse the tensor and node tables. The schema version is not checked here.
pub(crate) fn parse(bytes: &[u8]) -> InitResult<ModelGraph> {
    let mut r = ByteReader::new(bytes);
    if r.take(4)? != MODEL_MAGIC {
        return Err(malformed("bad magic"));
    }
    let _version = r.u32()?;
    let tensor_count = r.index()?;
    let node_count = r.index()?;
    let input = r.index()?;
    let output = r.index()?;

    if tensor_count == 0 || node_count == 0 {
        return Err(malformed("model has no tensors or no nodes"));
    }
    if input >= tensor_count || output >= tensor_count {
        return Err(malformed(format!(
            "input {input} or output {output} out of range ({tensor_count} tensors)"
        )));
    }

    let mut tensors = Vec::with_capacity(tensor_count.min(bytes.len() / 20));
    for t in 0..tensor_count {
        tensors.push(parse_tensor(&mut r, bytes.len(), t)?);
    }

    let mut nodes = Vec::with_capacity(node_count.min(bytes.len() / 8));
    for n in 0..node_count {
        nodes.push(parse_node(&mut r, tensor_count, n)?);
    }

    let graph = ModelGraph {
        tensors,
        nodes,
        input,
        output,
    };
    check_data_flow(&graph)?;
    Ok(graph)
}

fn parse_tensor(r: &mut ByteReader<'_>, file_len: usize, t: usize) -> InitResult<TensorDef> {
    let dtype = r.u8()?;
    let dtype = ElementType::from_code(dtype)
        .ok_or_else(|| malformed(format!("tensor {t}: unknown element type {dtype}")))?;
    let rank = r.u8()? as usize;
    let flags = r.u8()?;
    let _reserved = r.u8()?;
    if rank == 0 || rank > MAX_RANK {
        return Err(malformed(format!("tensor {t}: rank {rank} not in 1..={MAX_RANK}")));
    }

    let mut shape: SmallVec<[usize; 4]> = SmallVec::new();
    for _ in 0..rank {
        let dim = r.index()?;
        if dim == 0 {
            return Err(malformed(format!("tensor {t}: zero-sized dimension")));
        }
        shape.push(dim);
    }

    let scale = r.f32()?;
    let zero_point = r.i32()?;
    let data_offset = r.index()?;
    let data_len = r.index()?;

    let quant = if dtype.is_quantized() {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(malformed(format!("tensor {t}: invalid scale {scale}")));
        }
        Quantization::new(scale, zero_point)
    } else {
        Quantization::NONE
    };

    let info = TensorInfo {
        shape,
        dtype,
        quant,
    };
    let byte_len = info
        .shape
        .iter()
        .try_fold(dtype.size(), |acc, &d| acc.checked_mul(d));
    if byte_len.is_none() {
        return Err(malformed(format!("tensor {t}: size overflows")));
    }

    let constant = if flags & FLAG_CONSTANT != 0 {
        if data_len != info.byte_len() {
            return Err(malformed(format!(
                "tensor {t}: payload is {data_len} bytes, shape needs {}",
                info.byte_len()
            )));
        }
        let end = data_offset
            .checked_add(data_len)
            .filter(|&end| end <= file_len)
            .ok_or_else(|| malformed(format!("tensor {t}: payload outside the file")))?;
        Some(data_offset..end)
    } else {
        None
    };

    Ok(TensorDef { info, constant })
}

fn parse_node(r: &mut ByteReader<'_>, tensor_count: usize, n: usize) -> InitResult<Node> {
    let code = r.u8()?;
    let op = OpCode::from_code(code)
        .ok_or_else(|| malformed(format!("node {n}: unknown opcode {code}")))?;
    let n_inputs = r.u8()? as usize;
    let param_len = r.u8()? as usize;
    let _reserved = r.u8()?;
    if n_inputs > MAX_NODE_INPUTS {
        return Err(malformed(format!("node {n}: {n_inputs} inputs")));
    }

    let mut inputs: SmallVec<[usize; 3]> = SmallVec::new();
    for _ in 0..n_inputs {
        inputs.push(r.index()?);
    }
    let output = r.index()?;
    if let Some(bad) = inputs.iter().chain(Some(&output)).find(|&&i| i >= tensor_count) {
        return Err(malformed(format!("node {n}: tensor index {bad} out of range")));
    }

    let params = OpParams::decode(op, r.take(param_len)?)
        .ok_or_else(|| malformed(format!("node {n}: bad parameters for {op:?}")))?;

    Ok(Node {
        op,
        inputs,
        output,
        params,
    })
}

/// Every tensor a node reads must already hold data when the node runs, and
/// every activation is written exactly once.
fn check_data_flow(graph: &ModelGraph) -> InitResult<()> {
    let mut ready: Vec<bool> = graph
        .tensors
        .iter()
        .map(|t| t.constant.is_some())
        .collect();

    if ready[graph.input] || ready[graph.output] {
        return Err(malformed("graph input and output must not be constant"));
    }
    ready[graph.input] = true;

    for (n, node) in graph.nodes.iter().enumerate() {
        if let Some(&i) = node.inputs.iter().find(|&&i| !ready[i]) {
            return Err(malformed(format!("node {n} reads tensor {i} before it is written")));
        }
        if ready[node.output] {
            return Err(malformed(format!(
                "node {n} writes tensor {} which already holds data",
                node.output
            )));
        }
        ready[node.output] = true;
    }

    if !ready[graph.output] {
        return Err(malformed("graph output is never written"));
    }
    Ok(())
}
