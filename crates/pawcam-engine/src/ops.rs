//! Operators, node parameters and the kernel resolver.
//!
//! The resolver is a fixed-size whitelist: only kernels that are
//! registered get linked into the interpreter's dispatch table. A model
//! that uses anything else is rejected at initialization.

use crate::error::ResolverError;
use crate::kernels;
use crate::kernels::KernelContext;
use crate::tensor::TensorInfo;
use smallvec::SmallVec;

/// Operators known to the model format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Conv2D,
    DepthwiseConv2D,
    Pad,
    Add,
    Mean,
    FullyConnected,
    Relu6,
    Logistic,
}

impl OpCode {
    pub(crate) const fn code(self) -> u8 {
        match self {
            Self::Conv2D => 0,
            Self::DepthwiseConv2D => 1,
            Self::Pad => 2,
            Self::Add => 3,
            Self::Mean => 4,
            Self::FullyConnected => 5,
            Self::Relu6 => 6,
            Self::Logistic => 7,
        }
    }

    pub(crate) const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Conv2D,
            1 => Self::DepthwiseConv2D,
            2 => Self::Pad,
            3 => Self::Add,
            4 => Self::Mean,
            5 => Self::FullyConnected,
            6 => Self::Relu6,
            7 => Self::Logistic,
            _ => return None,
        })
    }
}

/// Spatial padding scheme for convolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    Valid,
    Same,
}

/// Activation fused into a convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    None,
    Relu6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvParams {
    pub stride_h: u8,
    pub stride_w: u8,
    pub padding: Padding,
    pub activation: Activation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadParams {
    pub top: u8,
    pub bottom: u8,
    pub left: u8,
    pub right: u8,
}

/// Per-node operator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpParams {
    None,
    Conv(ConvParams),
    Pad(PadParams),
}

impl OpParams {
    pub(crate) fn encode(&self) -> SmallVec<[u8; 4]> {
        match *self {
            Self::None => SmallVec::new(),
            Self::Conv(p) => SmallVec::from_slice(&[
                p.stride_h,
                p.stride_w,
                match p.padding {
                    Padding::Valid => 0,
                    Padding::Same => 1,
                },
                match p.activation {
                    Activation::None => 0,
                    Activation::Relu6 => 1,
                },
            ]),
            Self::Pad(p) => SmallVec::from_slice(&[p.top, p.bottom, p.left, p.right]),
        }
    }

    pub(crate) fn decode(op: OpCode, bytes: &[u8]) -> Option<Self> {
        match op {
            OpCode::Conv2D | OpCode::DepthwiseConv2D => {
                let &[stride_h, stride_w, padding, activation] = bytes else {
                    return None;
                };
                if stride_h == 0 || stride_w == 0 {
                    return None;
                }
                Some(Self::Conv(ConvParams {
                    stride_h,
                    stride_w,
                    padding: match padding {
                        0 => Padding::Valid,
                        1 => Padding::Same,
                        _ => return None,
                    },
                    activation: match activation {
                        0 => Activation::None,
                        1 => Activation::Relu6,
                        _ => return None,
                    },
                }))
            }
            OpCode::Pad => {
                let &[top, bottom, left, right] = bytes else {
                    return None;
                };
                Some(Self::Pad(PadParams {
                    top,
                    bottom,
                    left,
                    right,
                }))
            }
            _ => bytes.is_empty().then_some(Self::None),
        }
    }
}

/// One operator application in the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub op: OpCode,
    pub inputs: SmallVec<[usize; 3]>,
    pub output: usize,
    pub params: OpParams,
}

/// Validates a node's tensors and returns the scratch bytes it needs.
pub type PrepareFn = fn(&Node, &[&TensorInfo], &TensorInfo) -> Result<usize, String>;

/// Runs a node.
pub type EvalFn = fn(&mut KernelContext<'_>) -> Result<(), kernels::KernelError>;

/// A kernel implementation for one operator.
#[derive(Clone, Copy)]
pub struct Registration {
    pub op: OpCode,
    pub prepare: PrepareFn,
    pub eval: EvalFn,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration").field("op", &self.op).finish()
    }
}

/// Kernels needed by the MobileNetV2-style classifier graph.
pub const CLASSIFIER_OPS: usize = 8;

/// Fixed-capacity table of registered kernels.
pub struct OpResolver<const N: usize = CLASSIFIER_OPS> {
    entries: [Option<Registration>; N],
    len: usize,
}

impl<const N: usize> OpResolver<N> {
    pub fn new() -> Self {
        Self {
            entries: [None; N],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Register a kernel.
    pub fn add(&mut self, registration: Registration) -> Result<(), ResolverError> {
        if self.find(registration.op).is_some() {
            return Err(ResolverError::Duplicate(registration.op));
        }
        if self.len == N {
            return Err(ResolverError::Full { capacity: N });
        }
        self.entries[self.len] = Some(registration);
        self.len += 1;
        Ok(())
    }

    pub fn find(&self, op: OpCode) -> Option<&Registration> {
        self.entries[..self.len]
            .iter()
            .flatten()
            .find(|r| r.op == op)
    }

    pub fn add_conv_2d(&mut self) -> Result<(), ResolverError> {
        self.add(kernels::conv::CONV_2D)
    }

    pub fn add_depthwise_conv_2d(&mut self) -> Result<(), ResolverError> {
        self.add(kernels::conv::DEPTHWISE_CONV_2D)
    }

    pub fn add_pad(&mut self) -> Result<(), ResolverError> {
        self.add(kernels::shape::PAD)
    }

    pub fn add_add(&mut self) -> Result<(), ResolverError> {
        self.add(kernels::elementwise::ADD)
    }

    pub fn add_mean(&mut self) -> Result<(), ResolverError> {
        self.add(kernels::shape::MEAN)
    }

    pub fn add_fully_connected(&mut self) -> Result<(), ResolverError> {
        self.add(kernels::dense::FULLY_CONNECTED)
    }

    pub fn add_relu6(&mut self) -> Result<(), ResolverError> {
        self.add(kernels::elementwise::RELU6)
    }

    pub fn add_logistic(&mut self) -> Result<(), ResolverError> {
        self.add(kernels::elementwise::LOGISTIC)
    }
}

impl OpResolver<CLASSIFIER_OPS> {
    /// Resolver with exactly the kernels the classifier graph uses.
    pub fn classifier() -> Result<Self, ResolverError> {
        let mut resolver = Self::new();
        resolver.add_conv_2d()?;
        resolver.add_relu6()?;
        resolver.add_depthwise_conv_2d()?;
        resolver.add_pad()?;
        resolver.add_add()?;
        resolver.add_mean()?;
        resolver.add_fully_connected()?;
        resolver.add_logistic()?;
        Ok(resolver)
    }
}

impl<const N: usize> Default for OpResolver<N> {
    fn default() -> Self {
        Self::new()
    }
}
