use bundle_rules::rules::bounds;
use bundle_rules::{
    AccessPattern, ComputeGraph, GraphQuery, NodeId, NodeSpec, OpKind, OperandAccess, Predicate,
    RuleCatalogue, RuleContext, RuleIdentifier,
};
use proptest::prelude::*;
use proptest::sample::Index;
use std::collections::HashSet;

fn constant(value: bool) -> bundle_rules::PredicateHandle {
    Predicate::leaf(RuleIdentifier::IsGemm, move |_| value).into_handle()
}

/// Per node: engine (0 = TPC, 1 = MME, 2 = logical), picks among earlier
/// outputs to read, and whether its output mapping starts at an offset.
type NodeShape = (u8, Vec<Index>, bool);

/// DAG where node `i` reads the output of some earlier nodes. Every node
/// carries an access pattern mapping its operands onto a 16x16 index space.
fn build_graph(shape: &[NodeShape]) -> (ComputeGraph, Vec<NodeId>) {
    let mut g = ComputeGraph::new();
    let outputs: Vec<_> = (0..shape.len())
        .map(|i| g.add_data_tensor(format!("t{i}"), vec![16, 16]))
        .collect();

    let mut nodes = Vec::new();
    for (i, (engine, picks, skewed)) in shape.iter().enumerate() {
        let mut inputs: Vec<_> = if i == 0 {
            Vec::new()
        } else {
            picks.iter().map(|ix| outputs[ix.index(i)]).collect()
        };
        inputs.sort();
        inputs.dedup();

        let mut output_access = OperandAccess::identity(2);
        if *skewed {
            output_access.offset = vec![0, 1];
        }
        let ap = inputs
            .iter()
            .fold(AccessPattern::new(vec![16, 16]), |ap, t| {
                ap.with_operand(*t, OperandAccess::identity(2))
            })
            .with_operand(outputs[i], output_access);

        let name = format!("n{i}");
        let spec = match engine {
            0 => NodeSpec::tpc(name),
            1 => NodeSpec::mme(name, OpKind::Gemm),
            _ => NodeSpec::logical(name),
        };
        nodes.push(
            g.add_node(spec.inputs(inputs).outputs([outputs[i]]).access_pattern(ap))
                .unwrap(),
        );
    }
    (g, nodes)
}

fn graph_strategy() -> impl Strategy<Value = Vec<NodeShape>> {
    prop::collection::vec(
        (0u8..3, prop::collection::vec(any::<Index>(), 0..3), any::<bool>()),
        1..10,
    )
}

const COMPLEMENTARY_PAIRS: [(RuleIdentifier, RuleIdentifier); 9] = [
    (RuleIdentifier::RunsOnTpc, RuleIdentifier::NotRunsOnTpc),
    (RuleIdentifier::RunsOnMme, RuleIdentifier::NotRunsOnMme),
    (RuleIdentifier::RunsOnDma, RuleIdentifier::NotRunsOnDma),
    (RuleIdentifier::IsBundled, RuleIdentifier::IsNotBundled),
    (RuleIdentifier::BindingInputReuse, RuleIdentifier::NoBindingInputReuse),
    (RuleIdentifier::HasSharedInputInBundle, RuleIdentifier::NoSharedInputInBundle),
    (RuleIdentifier::IsProducerBpgCycle, RuleIdentifier::NoProducerBpgCycle),
    (RuleIdentifier::IsConsumerBpgCycle, RuleIdentifier::NoConsumerBpgCycle),
    (
        RuleIdentifier::OverlapOrOffsetInAccessPattern,
        RuleIdentifier::NoOverlapOrOffsetInAccessPattern,
    ),
];

proptest! {
    #[test]
    fn test_and_matches_all(values in prop::collection::vec(any::<bool>(), 1..8)) {
        let g = ComputeGraph::new();
        let ctx = RuleContext::new(&g);
        let children = values.iter().map(|v| constant(*v)).collect();
        let rule = Predicate::all(RuleIdentifier::SupportedGemm, children);
        prop_assert_eq!(rule.evaluate(&ctx), values.iter().all(|v| *v));
    }

    #[test]
    fn test_or_matches_any(values in prop::collection::vec(any::<bool>(), 1..8)) {
        let g = ComputeGraph::new();
        let ctx = RuleContext::new(&g);
        let children = values.iter().map(|v| constant(*v)).collect();
        let rule = Predicate::any(RuleIdentifier::SupportedMultiGemmSeed, children);
        prop_assert_eq!(rule.evaluate(&ctx), values.iter().any(|v| *v));
    }

    #[test]
    fn test_complementary_pairs_disagree(
        shape in graph_strategy(),
        in_bundle in prop::collection::vec(any::<bool>(), 10),
        in_candidates in prop::collection::vec(any::<bool>(), 10),
    ) {
        let (g, nodes) = build_graph(&shape);
        let bundle: HashSet<NodeId> = nodes
            .iter()
            .zip(&in_bundle)
            .filter(|(_, member)| **member)
            .map(|(n, _)| *n)
            .collect();
        let pool: Vec<NodeId> = nodes
            .iter()
            .zip(&in_candidates)
            .filter(|(n, picked)| **picked && !bundle.contains(*n))
            .map(|(n, _)| *n)
            .collect();
        let catalogue = RuleCatalogue::global();

        for &node in nodes.iter().filter(|n| !bundle.contains(*n)) {
            let candidates: Vec<NodeId> = pool.iter().copied().filter(|c| *c != node).collect();
            let ctx = RuleContext::new(&g)
                .with_node(node)
                .with_bundle(&bundle)
                .with_candidates(&candidates);
            for (positive, negative) in COMPLEMENTARY_PAIRS {
                let p = catalogue.get(positive).evaluate(&ctx);
                let n = catalogue.get(negative).evaluate(&ctx);
                prop_assert_ne!(p, n, "{} / {}", positive, negative);
            }

            let skewed = shape[node.index()].2;
            prop_assert_eq!(
                catalogue.get(RuleIdentifier::OverlapOrOffsetInAccessPattern).evaluate(&ctx),
                skewed
            );
            prop_assert!(catalogue.get(RuleIdentifier::HasAccessPattern).evaluate(&ctx));

            // strict size comparisons: never both for MME, always both otherwise
            let larger_in = catalogue.get(RuleIdentifier::MmeInputsLargerThanOutputs).evaluate(&ctx);
            let larger_out = catalogue.get(RuleIdentifier::MmeOutputsLargerThanInputs).evaluate(&ctx);
            if g.runs_on_mme(node) {
                prop_assert!(!(larger_in && larger_out));
            } else {
                prop_assert!(larger_in && larger_out);
            }
        }
    }

    #[test]
    fn test_candidate_bound_arithmetic(
        bound in 0usize..8,
        count in 0usize..10,
        with_node in any::<bool>(),
    ) {
        let mut g = ComputeGraph::new();
        let ids: Vec<NodeId> = (0..=count)
            .map(|i| g.add_node(NodeSpec::tpc(format!("n{i}"))).unwrap())
            .collect();
        let candidates = &ids[..count];
        let mut ctx = RuleContext::new(&g).with_candidates(candidates);
        if with_node {
            ctx = ctx.with_node(ids[count]);
        }

        let expected = if bound == 0 {
            count == 0
        } else {
            count + usize::from(with_node) <= bound
        };
        prop_assert_eq!(bounds::not_exceeds_candidates(bound).evaluate(&ctx), expected);
    }

    #[test]
    fn test_cycle_survives_unrelated_bundle_growth(extra in 0usize..6) {
        // p -> t -> m and p -> u -> x -> v -> m, with m bundled
        let mut g = ComputeGraph::new();
        let t = g.add_data_tensor("t", vec![8]);
        let u = g.add_data_tensor("u", vec![8]);
        let v = g.add_data_tensor("v", vec![8]);
        let out = g.add_data_tensor("out", vec![8]);
        let p = g.add_node(NodeSpec::tpc("p").outputs([t, u])).unwrap();
        g.add_node(NodeSpec::tpc("x").inputs([u]).outputs([v])).unwrap();
        let m = g
            .add_node(NodeSpec::mme("m", OpKind::Gemm).inputs([t, v]).outputs([out]))
            .unwrap();

        let mut bundle: HashSet<NodeId> = HashSet::from([m]);
        for i in 0..extra {
            bundle.insert(g.add_node(NodeSpec::tpc(format!("iso{i}"))).unwrap());
        }

        let candidates: Vec<NodeId> = Vec::new();
        let ctx = RuleContext::new(&g)
            .with_node(p)
            .with_bundle(&bundle)
            .with_candidates(&candidates);
        let rule = RuleCatalogue::global().get(RuleIdentifier::IsProducerBpgCycle);
        prop_assert!(rule.evaluate(&ctx));
    }
}
