//! Registry of every rule, keyed by [`RuleIdentifier`]
//!
//! Built once by [`RuleCatalogue::bootstrap`], then only read. Lookups of
//! identifiers that were never registered are engine misconfiguration and
//! panic.

use crate::config::RuleBounds;
use crate::rule::{Predicate, PredicateHandle, RuleIdentifier};
use crate::rules::{catalogue_table, RuleEntry};
use lazy_static::lazy_static;
use std::collections::HashMap;
use tracing::debug;

lazy_static! {
    static ref DEFAULT_CATALOGUE: RuleCatalogue = RuleCatalogue::bootstrap(&RuleBounds::default());
}

#[derive(Debug, Default)]
pub struct RuleCatalogue {
    entries: HashMap<RuleIdentifier, PredicateHandle>,
}

impl RuleCatalogue {
    /// Empty catalogue, for drivers that assemble their own rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalogue holding every atomic and composite rule exactly once
    pub fn bootstrap(bounds: &RuleBounds) -> Self {
        let mut catalogue = Self::new();
        for entry in catalogue_table(bounds) {
            let predicate = match entry {
                RuleEntry::Atomic(predicate) => predicate,
                RuleEntry::Composite {
                    identifier,
                    combinator,
                    children,
                } => Predicate::composite(identifier, combinator, catalogue.get_many(children)),
            };
            catalogue.register(predicate.into_handle());
        }
        debug!(
            "Bootstrapped rule catalogue with {} rules ({:?})",
            catalogue.len(),
            bounds
        );
        catalogue
    }

    /// Process-wide catalogue built with default bounds on first use
    pub fn global() -> &'static RuleCatalogue {
        &DEFAULT_CATALOGUE
    }

    /// # Panics
    /// If a rule with the same identifier is already registered.
    pub fn register(&mut self, predicate: PredicateHandle) {
        let identifier = predicate.identifier();
        assert!(
            !self.entries.contains_key(&identifier),
            "rule {identifier} is already registered"
        );
        self.entries.insert(identifier, predicate);
    }

    /// # Panics
    /// If `identifier` was never registered.
    pub fn get(&self, identifier: RuleIdentifier) -> PredicateHandle {
        self.try_get(identifier)
            .unwrap_or_else(|| panic!("Missing rule for identifier {identifier}"))
    }

    pub fn try_get(&self, identifier: RuleIdentifier) -> Option<PredicateHandle> {
        self.entries.get(&identifier).cloned()
    }

    /// Handles for `identifiers`, in order.
    ///
    /// # Panics
    /// If any identifier was never registered.
    pub fn get_many(&self, identifiers: &[RuleIdentifier]) -> Vec<PredicateHandle> {
        identifiers.iter().map(|id| self.get(*id)).collect()
    }

    /// Handles for the registered subset of `identifiers`, in order
    pub fn get_available(&self, identifiers: &[RuleIdentifier]) -> Vec<PredicateHandle> {
        identifiers
            .iter()
            .filter_map(|id| self.try_get(*id))
            .collect()
    }

    pub fn contains(&self, identifier: RuleIdentifier) -> bool {
        self.entries.contains_key(&identifier)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered identifiers in declaration order
    pub fn identifiers(&self) -> Vec<RuleIdentifier> {
        let mut ids: Vec<RuleIdentifier> = self.entries.keys().copied().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RuleContext;
    use crate::graph::{ComputeGraph, NodeId, NodeSpec, OpKind};
    use crate::rule::Combinator;
    use std::sync::Arc;

    #[test]
    fn test_bootstrap_registers_everything() {
        let catalogue = RuleCatalogue::bootstrap(&RuleBounds::default());
        assert_eq!(catalogue.len(), RuleIdentifier::ALL.len());
        assert_eq!(catalogue.identifiers(), RuleIdentifier::ALL.to_vec());
    }

    #[test]
    fn test_get_returns_the_same_handle() {
        let catalogue = RuleCatalogue::global();
        let a = catalogue.get(RuleIdentifier::SupportedGemm);
        let b = catalogue.get(RuleIdentifier::SupportedGemm);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.identifier(), RuleIdentifier::SupportedGemm);
        assert_eq!(a.name(), "SUPPORTED_GEMM");
    }

    #[test]
    fn test_composites_share_child_handles() {
        let catalogue = RuleCatalogue::global();
        let gemm = catalogue.get(RuleIdentifier::SupportedGemm);
        let seed = catalogue.get(RuleIdentifier::SupportedMultiGemmSeed);
        assert_eq!(seed.combinator(), Some(Combinator::Or));
        assert!(Arc::ptr_eq(&seed.children()[0], &gemm));
        let ids: Vec<_> = seed.children().iter().map(|c| c.identifier()).collect();
        assert_eq!(
            ids,
            vec![
                RuleIdentifier::SupportedGemm,
                RuleIdentifier::SupportedBatchGemm,
                RuleIdentifier::IsConv
            ]
        );
    }

    #[test]
    fn test_bounds_flow_into_rules() {
        let mut g = ComputeGraph::new();
        let conv = g.add_node(NodeSpec::mme("conv", OpKind::Convolution)).unwrap();
        let ctx = RuleContext::new(&g).with_node(conv);

        let default = RuleCatalogue::bootstrap(&RuleBounds::default());
        assert!(!default.get(RuleIdentifier::SupportedMultiGemmSeed).evaluate(&ctx));

        let bounds = RuleBounds {
            conv_bundling: true,
            ..RuleBounds::default()
        };
        let conv_enabled = RuleCatalogue::bootstrap(&bounds);
        assert!(conv_enabled.get(RuleIdentifier::SupportedMultiGemmSeed).evaluate(&ctx));
    }

    fn bgemm(g: &mut ComputeGraph, name: &str, a: Vec<u64>, b: Vec<u64>, out: Vec<u64>) -> NodeId {
        let a = g.add_data_tensor(format!("{name}_a"), a);
        let b = g.add_data_tensor(format!("{name}_b"), b);
        let out = g.add_data_tensor(format!("{name}_out"), out);
        g.add_node(NodeSpec::mme(name, OpKind::BatchGemm).inputs([a, b]).outputs([out]))
            .unwrap()
    }

    #[test]
    fn test_supported_batch_gemm() {
        let mut g = ComputeGraph::new();
        let valid = bgemm(&mut g, "valid", vec![4, 8, 16], vec![4, 16, 32], vec![4, 8, 32]);
        let no_batch = bgemm(&mut g, "no_batch", vec![8, 16], vec![16, 32], vec![8, 32]);
        let mixed_rank = bgemm(&mut g, "mixed", vec![4, 8, 16], vec![16, 32], vec![4, 8, 32]);
        let plain = g.add_node(NodeSpec::mme("plain", OpKind::Gemm)).unwrap();

        let rule = RuleCatalogue::global().get(RuleIdentifier::SupportedBatchGemm);
        let eval = |node| rule.evaluate(&RuleContext::new(&g).with_node(node));
        assert!(eval(valid));
        assert!(!eval(no_batch));
        assert!(!eval(mixed_rank));
        // IS_BATCH_GEMM short-circuits before the batch gemm shape check
        assert!(!eval(plain));
    }

    #[test]
    fn test_supported_attention_seed() {
        let mut g = ComputeGraph::new();
        let x = g.add_data_tensor("x", vec![8, 64]);
        let y = g.add_data_tensor("y", vec![8, 64]);
        let z = g.add_data_tensor("z", vec![8, 64]);
        let reshape = g.add_node(NodeSpec::logical("reshape").inputs([x]).outputs([y])).unwrap();
        let softmax = g.add_node(NodeSpec::tpc("softmax").inputs([y]).outputs([z])).unwrap();
        let scores = bgemm(&mut g, "scores", vec![2, 8, 64], vec![2, 64, 8], vec![2, 8, 8]);

        let rule = RuleCatalogue::global().get(RuleIdentifier::SupportedAttentionSeed);
        let eval = |node| rule.evaluate(&RuleContext::new(&g).with_node(node));
        assert!(eval(reshape));
        assert!(eval(scores));
        assert!(!eval(softmax));
    }

    #[test]
    fn test_get_available_skips_missing() {
        let mut catalogue = RuleCatalogue::new();
        catalogue.register(Predicate::leaf(RuleIdentifier::IsGemm, |_| true).into_handle());
        let found = catalogue.get_available(&[RuleIdentifier::IsConv, RuleIdentifier::IsGemm]);
        assert_eq!(found.len(), 1);
        assert!(catalogue.try_get(RuleIdentifier::IsConv).is_none());
        assert!(catalogue.contains(RuleIdentifier::IsGemm));
    }

    #[test]
    #[should_panic(expected = "Missing rule for identifier IS_CONV")]
    fn test_missing_rule_panics() {
        RuleCatalogue::new().get(RuleIdentifier::IsConv);
    }

    #[test]
    #[should_panic(expected = "Missing rule")]
    fn test_get_many_panics_on_partial() {
        let mut catalogue = RuleCatalogue::new();
        catalogue.register(Predicate::leaf(RuleIdentifier::IsGemm, |_| true).into_handle());
        catalogue.get_many(&[RuleIdentifier::IsGemm, RuleIdentifier::IsConv]);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_registration_panics() {
        let mut catalogue = RuleCatalogue::new();
        catalogue.register(Predicate::leaf(RuleIdentifier::IsGemm, |_| true).into_handle());
        catalogue.register(Predicate::leaf(RuleIdentifier::IsGemm, |_| false).into_handle());
    }

    #[test]
    fn test_catalogue_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RuleCatalogue>();

        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| RuleCatalogue::global().len()))
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), RuleIdentifier::ALL.len());
        }
    }
}
