//! Graph query surface consumed by the rule library
//!
//! Rules never own graph data. They look nodes and tensors up through
//! [`GraphQuery`] using opaque [`NodeId`] / [`TensorId`] handles, and read bundle
//! membership through [`BundleView`].

pub mod arena;

use crate::access_pattern::AccessPattern;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

pub use arena::{Bundle, ComputeGraph, NodeSpec};

/// Dense node handle. Ordering is by the inner index.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Dense tensor handle. Ordering is by the inner index.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TensorId(u32);

impl TensorId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Index of the bundle a node committed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BundleId(pub u32);

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bundle#{}", self.0)
    }
}

/// Execution engine class of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    /// Matrix-multiply engine
    Mme,
    /// Vector/tensor processing core
    Tpc,
    Dma,
    /// Aliasing op with no engine of its own (reshape, slice views, ...)
    Logical,
}

/// Operator class of a node, as far as bundling cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Gemm,
    BatchGemm,
    MaskedBatchGemm,
    Convolution,
    Dedw,
    Dedx,
    TransposedDedx,
    Serialize,
    Deserialize,
    Other,
}

impl OpKind {
    pub fn is_gemm(&self) -> bool {
        matches!(self, OpKind::Gemm)
    }

    pub fn is_batch_gemm(&self) -> bool {
        matches!(self, OpKind::BatchGemm | OpKind::MaskedBatchGemm)
    }

    /// Forward or backward convolution
    pub fn is_convolution(&self) -> bool {
        matches!(
            self,
            OpKind::Convolution | OpKind::Dedw | OpKind::Dedx | OpKind::TransposedDedx
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorKind {
    Data,
    Shape,
    Aux { scratchpad: bool },
}

/// Static description of a tensor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorInfo {
    pub name: String,
    /// Per-dimension sizes in elements; the rank is `sizes.len()`
    pub sizes: Vec<u64>,
    pub kind: TensorKind,
    #[serde(default)]
    pub dynamic_shape: bool,
}

impl TensorInfo {
    pub fn data(name: impl Into<String>, sizes: Vec<u64>) -> Self {
        Self {
            name: name.into(),
            sizes,
            kind: TensorKind::Data,
            dynamic_shape: false,
        }
    }

    pub fn rank(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_shape(&self) -> bool {
        matches!(self.kind, TensorKind::Shape)
    }

    /// Anything that carries real data (i.e. not a shape tensor)
    pub fn is_data(&self) -> bool {
        !self.is_shape()
    }

    /// Aux tensors that are not scratch-pads may be freely shared between nodes
    pub fn is_non_scratchpad_aux(&self) -> bool {
        matches!(self.kind, TensorKind::Aux { scratchpad: false })
    }

    pub fn dense_size_in_elements(&self) -> u64 {
        self.sizes.iter().product()
    }
}

/// Static description of a node
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub name: String,
    pub op: OpKind,
    pub engine: Engine,
    pub inputs: Vec<TensorId>,
    pub outputs: Vec<TensorId>,
    pub access_pattern: Option<AccessPattern>,
    pub binding_input_reuse: bool,
}

/// Read-only query surface of the compiler graph.
///
/// Implementations must answer for every id they handed out; an unknown id is a
/// caller bug and may panic.
pub trait GraphQuery {
    fn node(&self, node: NodeId) -> &NodeInfo;

    fn tensor(&self, tensor: TensorId) -> &TensorInfo;

    fn producer_of(&self, tensor: TensorId) -> Option<NodeId>;

    fn consumers_of(&self, tensor: TensorId) -> &[NodeId];

    /// True iff there is a non-empty path `a -> ... -> b`
    fn is_ancestor(&self, a: NodeId, b: NodeId) -> bool;

    /// Bundle the node committed to, if any
    fn bundle_of(&self, node: NodeId) -> Option<BundleId>;

    fn inputs(&self, node: NodeId) -> &[TensorId] {
        &self.node(node).inputs
    }

    fn outputs(&self, node: NodeId) -> &[TensorId] {
        &self.node(node).outputs
    }

    fn access_pattern(&self, node: NodeId) -> Option<&AccessPattern> {
        self.node(node).access_pattern.as_ref()
    }

    fn runs_on_mme(&self, node: NodeId) -> bool {
        self.node(node).engine == Engine::Mme
    }

    fn runs_on_tpc(&self, node: NodeId) -> bool {
        self.node(node).engine == Engine::Tpc
    }

    fn runs_on_dma(&self, node: NodeId) -> bool {
        self.node(node).engine == Engine::Dma
    }

    fn is_logical_operation(&self, node: NodeId) -> bool {
        self.node(node).engine == Engine::Logical
    }

    fn is_bundled(&self, node: NodeId) -> bool {
        self.bundle_of(node).is_some()
    }
}

/// Membership view of a forming bundle
pub trait BundleView {
    fn nodes(&self) -> &HashSet<NodeId>;

    fn contains(&self, node: NodeId) -> bool {
        self.nodes().contains(&node)
    }

    fn len(&self) -> usize {
        self.nodes().len()
    }

    fn is_empty(&self) -> bool {
        self.nodes().is_empty()
    }
}

impl BundleView for HashSet<NodeId> {
    fn nodes(&self) -> &HashSet<NodeId> {
        self
    }
}

/// Inputs followed by outputs of `node`
pub(crate) fn operands<'g>(
    graph: &'g dyn GraphQuery,
    node: NodeId,
) -> impl Iterator<Item = TensorId> + 'g {
    graph
        .inputs(node)
        .iter()
        .chain(graph.outputs(node).iter())
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_kind_classes() {
        assert!(OpKind::Gemm.is_gemm());
        assert!(!OpKind::BatchGemm.is_gemm());
        assert!(OpKind::MaskedBatchGemm.is_batch_gemm());
        assert!(OpKind::TransposedDedx.is_convolution());
        assert!(!OpKind::Other.is_convolution());
    }

    #[test]
    fn test_tensor_info_kinds() {
        let mut t = TensorInfo::data("x", vec![2, 3, 4]);
        assert_eq!(t.rank(), 3);
        assert_eq!(t.dense_size_in_elements(), 24);
        assert!(t.is_data());

        t.kind = TensorKind::Aux { scratchpad: false };
        assert!(t.is_non_scratchpad_aux());
        t.kind = TensorKind::Aux { scratchpad: true };
        assert!(!t.is_non_scratchpad_aux());
        t.kind = TensorKind::Shape;
        assert!(!t.is_data());
    }

    #[test]
    fn test_hash_set_is_a_bundle_view() {
        let set: HashSet<NodeId> = [NodeId::new(1), NodeId::new(4)].into_iter().collect();
        assert_eq!(BundleView::len(&set), 2);
        assert!(BundleView::contains(&set, NodeId::new(4)));
        assert!(!BundleView::contains(&set, NodeId::new(2)));
    }
}
