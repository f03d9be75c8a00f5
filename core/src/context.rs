//! Evaluation context handed to every rule

use crate::graph::{BundleView, GraphQuery, NodeId};
use crate::paths::{BundlePathsValidation, PathsValidation};
use crate::rule::RuleIdentifier;
use std::collections::HashSet;

/// Everything a rule may look at while deciding on a candidate.
///
/// Built fresh by the driver for each evaluation; it only borrows. Each rule
/// documents which optional fields it requires, and evaluating a rule whose
/// required field is absent panics: that is a driver bug, not a rejection.
#[derive(Clone, Copy)]
pub struct RuleContext<'a> {
    pub graph: &'a dyn GraphQuery,
    /// Node being evaluated
    pub node: Option<NodeId>,
    /// Bundle being formed
    pub bundle: Option<&'a dyn BundleView>,
    /// Nodes accepted in this bundling round but not committed yet
    pub candidates: Option<&'a [NodeId]>,
    /// Path validation override; defaults to [`BundlePathsValidation`] over `graph`
    pub paths: Option<&'a dyn PathsValidation>,
}

impl<'a> RuleContext<'a> {
    pub fn new(graph: &'a dyn GraphQuery) -> Self {
        Self {
            graph,
            node: None,
            bundle: None,
            candidates: None,
            paths: None,
        }
    }

    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_bundle(mut self, bundle: &'a dyn BundleView) -> Self {
        self.bundle = Some(bundle);
        self
    }

    pub fn with_candidates(mut self, candidates: &'a [NodeId]) -> Self {
        self.candidates = Some(candidates);
        self
    }

    pub fn with_paths_validation(mut self, paths: &'a dyn PathsValidation) -> Self {
        self.paths = Some(paths);
        self
    }

    /// # Panics
    /// If no node is set.
    pub fn require_node(&self, rule: RuleIdentifier) -> NodeId {
        self.node
            .unwrap_or_else(|| panic!("rule {rule}: context has no candidate node"))
    }

    /// # Panics
    /// If no bundle is set.
    pub fn require_bundle(&self, rule: RuleIdentifier) -> &'a dyn BundleView {
        self.bundle
            .unwrap_or_else(|| panic!("rule {rule}: context has no bundle"))
    }

    /// # Panics
    /// If no candidate list is set.
    pub fn require_candidates(&self, rule: RuleIdentifier) -> &'a [NodeId] {
        self.candidates
            .unwrap_or_else(|| panic!("rule {rule}: context has no candidate list"))
    }

    /// `bundle ∪ candidates`
    ///
    /// # Panics
    /// If either the bundle or the candidate list is absent.
    pub fn committed_nodes(&self, rule: RuleIdentifier) -> HashSet<NodeId> {
        let mut committed = self.require_bundle(rule).nodes().clone();
        committed.extend(self.require_candidates(rule).iter().copied());
        committed
    }

    /// Run `f` against the configured path validation, or the graph's default one
    pub fn with_validation<R>(&self, f: impl FnOnce(&dyn PathsValidation) -> R) -> R {
        match self.paths {
            Some(paths) => f(paths),
            None => f(&BundlePathsValidation::new(self.graph)),
        }
    }

    pub(crate) fn node_name(&self, node: NodeId) -> &'a str {
        &self.graph.node(node).name
    }
}

impl std::fmt::Debug for RuleContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleContext")
            .field("node", &self.node)
            .field("bundle_len", &self.bundle.map(|b| b.len()))
            .field("candidates", &self.candidates)
            .field("paths_override", &self.paths.is_some())
            .finish()
    }
}
