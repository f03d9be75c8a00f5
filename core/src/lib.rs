//! # Bundle Rules Core
//!
//! The node-bundling rule engine: named, composable predicates that decide
//! whether a candidate node may join a forming bundle.
//!
//! ## Quick Start
//!
//! ```
//! use bundle_rules_core::{ComputeGraph, NodeSpec, OpKind, RuleCatalogue, RuleContext, RuleIdentifier};
//!
//! let mut graph = ComputeGraph::new();
//! let a = graph.add_data_tensor("a", vec![64, 32]);
//! let b = graph.add_data_tensor("b", vec![32, 16]);
//! let out = graph.add_data_tensor("out", vec![64, 16]);
//! let gemm = graph
//!     .add_node(NodeSpec::mme("gemm", OpKind::Gemm).inputs([a, b]).outputs([out]))
//!     .unwrap();
//!
//! let ctx = RuleContext::new(&graph).with_node(gemm);
//! let rule = RuleCatalogue::global().get(RuleIdentifier::SupportedGemm);
//! assert!(rule.evaluate(&ctx));
//! ```
//!
//! ## Layout
//!
//! - [`graph`]: the query surface rules read, plus an arena graph
//! - [`rule`]: predicates and AND/OR composites
//! - [`catalogue`]: identifier-keyed registry of every rule
//! - [`rules`]: the structural predicate library
//! - [`paths`]: BPG cycle checks used by the topology rules

pub mod access_pattern;
pub mod catalogue;
pub mod config;
pub mod context;
pub mod coverage;
pub mod graph;
pub mod paths;
pub mod rule;
pub mod rules;

pub use access_pattern::{AccessPattern, OperandAccess, TilingHazard};
pub use catalogue::RuleCatalogue;
pub use config::RuleBounds;
pub use context::RuleContext;
pub use coverage::{CoverageReport, CoverageTracker, RuleTally};
pub use graph::{
    Bundle, BundleId, BundleView, ComputeGraph, Engine, GraphQuery, NodeId, NodeInfo, NodeSpec,
    OpKind, TensorId, TensorInfo, TensorKind,
};
pub use paths::{BundlePathsValidation, PathsValidation};
pub use rule::{Combinator, Predicate, PredicateHandle, RuleIdentifier};
