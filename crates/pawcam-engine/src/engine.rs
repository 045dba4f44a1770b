//! Graph interpreter bound to one arena.

use crate::arena::{align_up, Arena, ArenaRegion};
use crate::error::{InitError, InitResult, InvokeError};
use crate::kernels::{KernelContext, KernelError};
use crate::model::{self, Model, SUPPORTED_SCHEMA_VERSION};
use crate::ops::{EvalFn, Node, OpResolver};
use crate::tensor::{TensorInfo, TensorMut, TensorRef};
use smallvec::SmallVec;
use std::fmt;
use std::ops::Range;
use tracing::{debug, info, trace};

#[derive(Debug, Clone)]
enum Storage {
    Constant(Range<usize>),
    Arena(ArenaRegion),
}

#[derive(Debug)]
struct EngineTensor {
    info: TensorInfo,
    storage: Storage,
}

struct ResolvedNode {
    node: Node,
    eval: EvalFn,
    output: ArenaRegion,
}

impl fmt::Debug for ResolvedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedNode")
            .field("node", &self.node)
            .field("output", &self.output)
            .finish()
    }
}

/// An initialized model. Tensor storage lives in the arena passed to
/// [`Engine::initialize`]; every later call must pass that same arena.
#[derive(Debug)]
pub struct Engine {
    model: Model,
    tensors: Vec<EngineTensor>,
    nodes: Vec<ResolvedNode>,
    input: usize,
    output: usize,
    input_region: ArenaRegion,
    output_region: ArenaRegion,
    scratch: ArenaRegion,
    arena_id: u64,
    arena_used: usize,
}

impl Engine {
    /// Validate `model`, link its operators through `resolver` and claim
    /// its working set from `arena`.
    ///
    /// A schema version mismatch is detected before anything is parsed or
    /// claimed. The arena is only touched once the whole working set is
    /// known to fit.
    pub fn initialize<const N: usize>(
        model: Model,
        resolver: &OpResolver<N>,
        arena: &mut Arena,
    ) -> InitResult<Self> {
        let version = model.schema_version()?;
        if version != SUPPORTED_SCHEMA_VERSION {
            return Err(InitError::VersionMismatch {
                model: version,
                supported: SUPPORTED_SCHEMA_VERSION,
            });
        }

        let graph = model::parse(model.bytes())?;

        let mut scratch_len = 0usize;
        let mut evals = Vec::with_capacity(graph.nodes.len());
        for (idx, node) in graph.nodes.iter().enumerate() {
            let registration = resolver
                .find(node.op)
                .ok_or(InitError::UnregisteredOp(node.op))?;
            let inputs: SmallVec<[&TensorInfo; 3]> = node
                .inputs
                .iter()
                .map(|&i| &graph.tensors[i].info)
                .collect();
            let scratch = (registration.prepare)(node, &inputs, &graph.tensors[node.output].info)
                .map_err(|reason| InitError::InvalidNode {
                    node: idx,
                    op: node.op,
                    reason,
                })?;
            scratch_len = scratch_len.max(scratch);
            evals.push(registration.eval);
        }

        // Saturates so an oversized graph reports exhaustion instead of wrapping.
        let required = graph
            .tensors
            .iter()
            .filter(|t| t.constant.is_none())
            .map(|t| t.info.byte_len())
            .chain(std::iter::once(scratch_len))
            .try_fold(0usize, |total, len| align_up(len)?.checked_add(total))
            .unwrap_or(usize::MAX);
        if required > arena.remaining() {
            return Err(InitError::ArenaExhausted {
                required,
                available: arena.remaining(),
            });
        }

        let start = arena.used();
        let mut tensors = Vec::with_capacity(graph.tensors.len());
        for def in graph.tensors {
            let storage = match def.constant {
                Some(range) => Storage::Constant(range),
                None => Storage::Arena(arena.claim(def.info.byte_len())?),
            };
            tensors.push(EngineTensor {
                info: def.info,
                storage,
            });
        }
        // Claimed last so it sits after every tensor region.
        let scratch = arena.claim(scratch_len)?;

        let region = |i: usize| match tensors[i].storage {
            Storage::Arena(r) => Ok(r),
            Storage::Constant(_) => Err(InitError::MalformedModel(format!(
                "tensor {i} is written but constant"
            ))),
        };
        let input_region = region(graph.input)?;
        let output_region = region(graph.output)?;
        let nodes = graph
            .nodes
            .into_iter()
            .zip(evals)
            .map(|(node, eval)| -> InitResult<ResolvedNode> {
                Ok(ResolvedNode {
                    output: region(node.output)?,
                    node,
                    eval,
                })
            })
            .collect::<InitResult<Vec<_>>>()?;

        let arena_used = arena.used() - start;
        info!(
            used = arena_used,
            capacity = arena.capacity(),
            tensors = tensors.len(),
            nodes = nodes.len(),
            "Used arena: {} bytes",
            arena_used
        );
        debug!(
            input = ?tensors[graph.input].info.shape,
            output = ?tensors[graph.output].info.shape,
            "Engine tensors bound"
        );

        Ok(Self {
            model,
            tensors,
            nodes,
            input: graph.input,
            output: graph.output,
            input_region,
            output_region,
            scratch,
            arena_id: arena.id(),
            arena_used,
        })
    }

    fn check_arena(&self, arena: &Arena) -> Result<(), InvokeError> {
        if arena.id() == self.arena_id {
            Ok(())
        } else {
            Err(InvokeError::ArenaMismatch)
        }
    }

    /// Run every node once, in order.
    pub fn invoke(&self, arena: &mut Arena) -> Result<(), InvokeError> {
        self.check_arena(arena)?;
        let constants = self.model.bytes();

        for (idx, resolved) in self.nodes.iter().enumerate() {
            let node = &resolved.node;
            let part = arena.partition(resolved.output, self.scratch);
            let mut inputs: SmallVec<[TensorRef<'_>; 3]> = SmallVec::new();
            for &i in &node.inputs {
                let tensor = &self.tensors[i];
                let data = match &tensor.storage {
                    Storage::Constant(range) => &constants[range.clone()],
                    Storage::Arena(region) => {
                        part.input(*region).ok_or(InvokeError::Kernel {
                            node: idx,
                            op: node.op,
                            reason: "input overlaps the output region",
                        })?
                    }
                };
                inputs.push(TensorRef::new(&tensor.info, data));
            }

            let mut ctx = KernelContext {
                node,
                inputs,
                output: TensorMut::new(&self.tensors[node.output].info, part.output),
                scratch: part.scratch,
            };
            (resolved.eval)(&mut ctx).map_err(|e| match e {
                KernelError::NonFinite => InvokeError::NonFinite {
                    node: idx,
                    op: node.op,
                },
                KernelError::Invalid(reason) => InvokeError::Kernel {
                    node: idx,
                    op: node.op,
                    reason,
                },
            })?;
            trace!(node = idx, op = ?node.op, "Node evaluated");
        }
        Ok(())
    }

    pub fn input_info(&self) -> &TensorInfo {
        &self.tensors[self.input].info
    }

    pub fn output_info(&self) -> &TensorInfo {
        &self.tensors[self.output].info
    }

    /// Writable view of the input tensor.
    pub fn input_mut<'a>(&'a self, arena: &'a mut Arena) -> Result<TensorMut<'a>, InvokeError> {
        self.check_arena(arena)?;
        Ok(TensorMut::new(
            self.input_info(),
            arena.region_mut(self.input_region),
        ))
    }

    /// Read-only view of the output tensor.
    pub fn output<'a>(&'a self, arena: &'a Arena) -> Result<TensorRef<'a>, InvokeError> {
        self.check_arena(arena)?;
        Ok(TensorRef::new(
            self.output_info(),
            arena.region(self.output_region),
        ))
    }

    /// Bytes this engine claimed, alignment padding included.
    pub fn arena_used_bytes(&self) -> usize {
        self.arena_used
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
