//! Bundle path validation
//!
//! Once a bundle is formed it is scheduled as a single unit. Stitching a
//! candidate into it is unsafe when some other path between the candidate and
//! the already committed nodes leaves the bundle and comes back: after the
//! collapse that path becomes a cycle in the bundle-producer graph (BPG).

use crate::graph::{GraphQuery, NodeId, TensorId};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Decides whether stitching a candidate through a tensor keeps the
/// bundle-producer graph acyclic.
pub trait PathsValidation {
    /// `producer` would join the bundle by producing `tensor` for committed
    /// consumers. Returns false if that closes a BPG cycle.
    fn validate_producer_paths(
        &self,
        producer: NodeId,
        tensor: TensorId,
        committed: &HashSet<NodeId>,
    ) -> bool;

    /// `consumer` would join the bundle by reading `tensor` from a committed
    /// producer. Returns false if that closes a BPG cycle.
    fn validate_consumer_paths(
        &self,
        consumer: NodeId,
        tensor: TensorId,
        committed: &HashSet<NodeId>,
    ) -> bool;
}

/// Reachability-based validation over any [`GraphQuery`].
///
/// A stitch is rejected iff the candidate reaches a committed node through at
/// least one node outside `committed ∪ {candidate}`, or a committed node
/// reaches the candidate through such a node.
pub struct BundlePathsValidation<'g> {
    graph: &'g dyn GraphQuery,
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

impl<'g> BundlePathsValidation<'g> {
    pub fn new(graph: &'g dyn GraphQuery) -> Self {
        Self { graph }
    }

    fn neighbours(&self, node: NodeId, direction: Direction) -> Vec<NodeId> {
        match direction {
            Direction::Forward => self
                .graph
                .outputs(node)
                .iter()
                .flat_map(|t| self.graph.consumers_of(*t).iter().copied())
                .collect(),
            Direction::Backward => self
                .graph
                .inputs(node)
                .iter()
                .filter_map(|t| self.graph.producer_of(*t))
                .collect(),
        }
    }

    /// Committed node reached from `candidate` via external nodes only, if any
    fn external_detour(
        &self,
        candidate: NodeId,
        committed: &HashSet<NodeId>,
        direction: Direction,
    ) -> Option<NodeId> {
        let is_external = |n: &NodeId| *n != candidate && !committed.contains(n);

        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut queue: VecDeque<NodeId> = self
            .neighbours(candidate, direction)
            .into_iter()
            .filter(is_external)
            .collect();

        while let Some(n) = queue.pop_front() {
            if !visited.insert(n) {
                continue;
            }
            for next in self.neighbours(n, direction) {
                if committed.contains(&next) {
                    return Some(next);
                }
                if is_external(&next) && !visited.contains(&next) {
                    queue.push_back(next);
                }
            }
        }
        None
    }

    fn validate(&self, candidate: NodeId, tensor: TensorId, committed: &HashSet<NodeId>) -> bool {
        for direction in [Direction::Forward, Direction::Backward] {
            if let Some(reached) = self.external_detour(candidate, committed, direction) {
                debug!(
                    "stitching '{}' through '{}' closes a BPG cycle via '{}'",
                    self.graph.node(candidate).name,
                    self.graph.tensor(tensor).name,
                    self.graph.node(reached).name
                );
                return false;
            }
        }
        true
    }
}

impl PathsValidation for BundlePathsValidation<'_> {
    /// # Panics
    /// If `tensor` is not an output of `producer`.
    fn validate_producer_paths(
        &self,
        producer: NodeId,
        tensor: TensorId,
        committed: &HashSet<NodeId>,
    ) -> bool {
        assert!(
            self.graph.outputs(producer).contains(&tensor),
            "tensor '{}' is not an output of producer '{}'",
            self.graph.tensor(tensor).name,
            self.graph.node(producer).name
        );
        self.validate(producer, tensor, committed)
    }

    /// # Panics
    /// If `tensor` is not an input of `consumer`.
    fn validate_consumer_paths(
        &self,
        consumer: NodeId,
        tensor: TensorId,
        committed: &HashSet<NodeId>,
    ) -> bool {
        assert!(
            self.graph.inputs(consumer).contains(&tensor),
            "tensor '{}' is not an input of consumer '{}'",
            self.graph.tensor(tensor).name,
            self.graph.node(consumer).name
        );
        self.validate(consumer, tensor, committed)
    }
}
