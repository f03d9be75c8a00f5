//! Arena-backed compute graph
//!
//! Nodes and tensors live in dense vectors addressed by [`NodeId`] /
//! [`TensorId`]. Producer and consumer relations are explicit adjacency tables
//! indexed by tensor, so the graph holds no back-pointers and no reference
//! cycles.
//!
//! This is the graph the bundler tests and benches run against. Any other
//! graph representation can plug into the rules by implementing
//! [`GraphQuery`].

use super::{BundleId, BundleView, Engine, GraphQuery, NodeId, NodeInfo, OpKind, TensorId, TensorInfo};
use crate::access_pattern::AccessPattern;
use anyhow::Result;
use std::collections::{HashSet, VecDeque};

/// Builder-style description of a node to add to a [`ComputeGraph`]
#[derive(Debug, Clone)]
pub struct NodeSpec {
    name: String,
    op: OpKind,
    engine: Engine,
    inputs: Vec<TensorId>,
    outputs: Vec<TensorId>,
    access_pattern: Option<AccessPattern>,
    binding_input_reuse: bool,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>, op: OpKind, engine: Engine) -> Self {
        Self {
            name: name.into(),
            op,
            engine,
            inputs: Vec::new(),
            outputs: Vec::new(),
            access_pattern: None,
            binding_input_reuse: false,
        }
    }

    pub fn mme(name: impl Into<String>, op: OpKind) -> Self {
        Self::new(name, op, Engine::Mme)
    }

    pub fn tpc(name: impl Into<String>) -> Self {
        Self::new(name, OpKind::Other, Engine::Tpc)
    }

    pub fn dma(name: impl Into<String>) -> Self {
        Self::new(name, OpKind::Other, Engine::Dma)
    }

    pub fn logical(name: impl Into<String>) -> Self {
        Self::new(name, OpKind::Other, Engine::Logical)
    }

    pub fn inputs(mut self, inputs: impl IntoIterator<Item = TensorId>) -> Self {
        self.inputs = inputs.into_iter().collect();
        self
    }

    pub fn outputs(mut self, outputs: impl IntoIterator<Item = TensorId>) -> Self {
        self.outputs = outputs.into_iter().collect();
        self
    }

    pub fn access_pattern(mut self, access_pattern: AccessPattern) -> Self {
        self.access_pattern = Some(access_pattern);
        self
    }

    pub fn binding_input_reuse(mut self, reuse: bool) -> Self {
        self.binding_input_reuse = reuse;
        self
    }
}

/// Dataflow graph with arena storage and explicit adjacency tables
#[derive(Debug, Clone, Default)]
pub struct ComputeGraph {
    nodes: Vec<NodeInfo>,
    tensors: Vec<TensorInfo>,
    /// tensor index -> producing node
    producers: Vec<Option<NodeId>>,
    /// tensor index -> consuming nodes, in insertion order
    consumers: Vec<Vec<NodeId>>,
    /// node index -> committed bundle
    bundles: Vec<Option<BundleId>>,
}

impl ComputeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tensor(&mut self, info: TensorInfo) -> TensorId {
        let id = TensorId::new(self.tensors.len() as u32);
        self.tensors.push(info);
        self.producers.push(None);
        self.consumers.push(Vec::new());
        id
    }

    /// Shorthand for a plain data tensor
    pub fn add_data_tensor(&mut self, name: impl Into<String>, sizes: Vec<u64>) -> TensorId {
        self.add_tensor(TensorInfo::data(name, sizes))
    }

    /// Add a node and wire it into the producer/consumer tables.
    ///
    /// Fails if an operand id is unknown, a tensor is both input and output, an
    /// output already has a producer, or the new edges would close a cycle.
    pub fn add_node(&mut self, spec: NodeSpec) -> Result<NodeId> {
        for t in spec.inputs.iter().chain(spec.outputs.iter()) {
            if t.index() >= self.tensors.len() {
                anyhow::bail!("Node '{}' references unknown tensor {}", spec.name, t);
            }
        }

        if let Some(looped) = spec.outputs.iter().find(|t| spec.inputs.contains(t)) {
            anyhow::bail!(
                "Node '{}' reads its own output '{}', which introduces a cycle",
                spec.name,
                self.tensors[looped.index()].name
            );
        }

        for out in &spec.outputs {
            if let Some(existing) = self.producers[out.index()] {
                anyhow::bail!(
                    "Tensor '{}' already produced by '{}', cannot add producer '{}'",
                    self.tensors[out.index()].name,
                    self.nodes[existing.index()].name,
                    spec.name
                );
            }
        }

        // The new node sits between the producers of its inputs and the
        // consumers of its outputs; a path back from the latter to the former
        // closes a cycle.
        for out in &spec.outputs {
            for &consumer in &self.consumers[out.index()] {
                for input in &spec.inputs {
                    if let Some(producer) = self.producers[input.index()] {
                        if consumer == producer || self.is_ancestor(consumer, producer) {
                            anyhow::bail!(
                                "Adding node '{}' introduces a cycle through '{}'",
                                spec.name,
                                self.nodes[consumer.index()].name
                            );
                        }
                    }
                }
            }
        }

        let id = NodeId::new(self.nodes.len() as u32);
        for input in &spec.inputs {
            let consumers = &mut self.consumers[input.index()];
            if !consumers.contains(&id) {
                consumers.push(id);
            }
        }
        for out in &spec.outputs {
            self.producers[out.index()] = Some(id);
        }

        self.nodes.push(NodeInfo {
            name: spec.name,
            op: spec.op,
            engine: spec.engine,
            inputs: spec.inputs,
            outputs: spec.outputs,
            access_pattern: spec.access_pattern,
            binding_input_reuse: spec.binding_input_reuse,
        });
        self.bundles.push(None);
        Ok(id)
    }

    /// Stamp a node with the bundle it committed to. The stamp is permanent.
    pub fn assign_bundle(&mut self, node: NodeId, bundle: BundleId) -> Result<()> {
        let slot = self
            .bundles
            .get_mut(node.index())
            .ok_or_else(|| anyhow::anyhow!("Unknown node {}", node))?;
        match slot {
            Some(existing) if *existing != bundle => {
                anyhow::bail!(
                    "Node '{}' already belongs to {}",
                    self.nodes[node.index()].name,
                    existing
                )
            }
            _ => {
                *slot = Some(bundle);
                Ok(())
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn tensor_count(&self) -> usize {
        self.tensors.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId::new)
    }

    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.name == name)
            .map(|idx| NodeId::new(idx as u32))
    }

    /// Nodes consuming any output of `node`
    pub fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[node.index()]
            .outputs
            .iter()
            .flat_map(move |t| self.consumers[t.index()].iter().copied())
    }
}

impl GraphQuery for ComputeGraph {
    fn node(&self, node: NodeId) -> &NodeInfo {
        &self.nodes[node.index()]
    }

    fn tensor(&self, tensor: TensorId) -> &TensorInfo {
        &self.tensors[tensor.index()]
    }

    fn producer_of(&self, tensor: TensorId) -> Option<NodeId> {
        self.producers[tensor.index()]
    }

    fn consumers_of(&self, tensor: TensorId) -> &[NodeId] {
        &self.consumers[tensor.index()]
    }

    fn is_ancestor(&self, a: NodeId, b: NodeId) -> bool {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<NodeId> = self.successors(a).collect();

        while let Some(n) = queue.pop_front() {
            if n == b {
                return true;
            }
            if visited.insert(n) {
                queue.extend(self.successors(n));
            }
        }
        false
    }

    fn bundle_of(&self, node: NodeId) -> Option<BundleId> {
        self.bundles[node.index()]
    }
}

/// A bundle owned by the driver while it grows
#[derive(Debug, Clone)]
pub struct Bundle {
    id: BundleId,
    nodes: HashSet<NodeId>,
}

impl Bundle {
    pub fn new(id: BundleId) -> Self {
        Self {
            id,
            nodes: HashSet::new(),
        }
    }

    pub fn with_nodes(id: BundleId, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            id,
            nodes: nodes.into_iter().collect(),
        }
    }

    pub fn id(&self) -> BundleId {
        self.id
    }

    pub fn insert(&mut self, node: NodeId) -> bool {
        self.nodes.insert(node)
    }

    /// Stamp every member node with this bundle's id
    pub fn commit(&self, graph: &mut ComputeGraph) -> Result<()> {
        let mut members: Vec<NodeId> = self.nodes.iter().copied().collect();
        members.sort();
        for node in members {
            graph.assign_bundle(node, self.id)?;
        }
        Ok(())
    }
}

impl BundleView for Bundle {
    fn nodes(&self) -> &HashSet<NodeId> {
        &self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> (ComputeGraph, Vec<NodeId>) {
        // a -> t1 -> b -> t2 -> c
        let mut g = ComputeGraph::new();
        let t0 = g.add_data_tensor("t0", vec![4, 4]);
        let t1 = g.add_data_tensor("t1", vec![4, 4]);
        let t2 = g.add_data_tensor("t2", vec![4, 4]);
        let t3 = g.add_data_tensor("t3", vec![4, 4]);
        let a = g.add_node(NodeSpec::tpc("a").inputs([t0]).outputs([t1])).unwrap();
        let b = g.add_node(NodeSpec::tpc("b").inputs([t1]).outputs([t2])).unwrap();
        let c = g.add_node(NodeSpec::tpc("c").inputs([t2]).outputs([t3])).unwrap();
        (g, vec![a, b, c])
    }

    #[test]
    fn test_adjacency_tables() {
        let (g, ids) = chain();
        let t1 = g.outputs(ids[0])[0];
        assert_eq!(g.producer_of(t1), Some(ids[0]));
        assert_eq!(g.consumers_of(t1), &[ids[1]]);
        assert_eq!(g.producer_of(g.inputs(ids[0])[0]), None);
        assert_eq!(g.find_node("c"), Some(ids[2]));
    }

    #[test]
    fn test_is_ancestor() {
        let (g, ids) = chain();
        assert!(g.is_ancestor(ids[0], ids[2]));
        assert!(g.is_ancestor(ids[0], ids[1]));
        assert!(!g.is_ancestor(ids[2], ids[0]));
        assert!(!g.is_ancestor(ids[1], ids[1]));
    }

    #[test]
    fn test_second_producer_rejected() {
        let (mut g, _) = chain();
        let t1 = TensorId::new(1);
        let t9 = g.add_data_tensor("t9", vec![1]);
        let err = g
            .add_node(NodeSpec::tpc("dup").inputs([t9]).outputs([t1]))
            .unwrap_err();
        assert!(err.to_string().contains("already produced"));
    }

    #[test]
    fn test_cycle_rejected() {
        // c's output t3 fed back into a new node that produces t0 (a's input)
        let (mut g, _) = chain();
        let t0 = TensorId::new(0);
        let t3 = TensorId::new(3);
        let err = g
            .add_node(NodeSpec::tpc("back").inputs([t3]).outputs([t0]))
            .unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_self_loop_rejected() {
        let mut g = ComputeGraph::new();
        let t = g.add_data_tensor("t", vec![4]);
        let err = g
            .add_node(NodeSpec::tpc("loop").inputs([t]).outputs([t]))
            .unwrap_err();
        assert!(err.to_string().contains("cycle"));
        assert_eq!(g.node_count(), 0);
        assert_eq!(g.producer_of(t), None);
    }

    #[test]
    fn test_unknown_tensor_rejected() {
        let mut g = ComputeGraph::new();
        assert!(g
            .add_node(NodeSpec::tpc("x").inputs([TensorId::new(7)]))
            .is_err());
    }

    #[test]
    fn test_bundle_commit_is_one_way() {
        let (mut g, ids) = chain();
        let bundle = Bundle::with_nodes(BundleId(3), [ids[0], ids[1]]);
        bundle.commit(&mut g).unwrap();

        assert_eq!(g.bundle_of(ids[0]), Some(BundleId(3)));
        assert!(g.is_bundled(ids[1]));
        assert!(!g.is_bundled(ids[2]));

        // re-committing to the same bundle is a no-op, to another is refused
        assert!(g.assign_bundle(ids[0], BundleId(3)).is_ok());
        assert!(g.assign_bundle(ids[0], BundleId(4)).is_err());
    }
}
