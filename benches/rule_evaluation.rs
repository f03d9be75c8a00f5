//! Benchmark suite for catalogue lookup and rule evaluation

use bundle_rules::{
    AdmissionEngine, ComputeGraph, NodeId, NodeSpec, OpKind, RuleBounds, RuleCatalogue,
    RuleContext, RuleIdentifier,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::HashSet;

/// `width` parallel TPC chains of length `depth` between a producer and one MME consumer
fn create_fan_graph(width: usize, depth: usize) -> (ComputeGraph, NodeId, NodeId) {
    let mut g = ComputeGraph::new();
    let mut heads = Vec::new();
    let mut tails = Vec::new();
    for w in 0..width {
        heads.push(g.add_data_tensor(format!("head{w}"), vec![32, 32]));
    }
    let producer = g.add_node(NodeSpec::tpc("producer").outputs(heads.clone())).unwrap();

    for (w, head) in heads.into_iter().enumerate() {
        let mut current = head;
        for d in 0..depth {
            let next = g.add_data_tensor(format!("c{w}_{d}"), vec![32, 32]);
            g.add_node(
                NodeSpec::tpc(format!("chain{w}_{d}"))
                    .inputs([current])
                    .outputs([next]),
            )
            .unwrap();
            current = next;
        }
        tails.push(current);
    }

    let out = g.add_data_tensor("out", vec![32, 32]);
    let mme = g
        .add_node(NodeSpec::mme("sink", OpKind::Gemm).inputs(tails).outputs([out]))
        .unwrap();
    (g, producer, mme)
}

fn benchmark_catalogue_lookup(c: &mut Criterion) {
    let catalogue = RuleCatalogue::global();
    c.bench_function("catalogue_get", |b| {
        b.iter(|| catalogue.get(black_box(RuleIdentifier::SupportedMultiGemmSeed)))
    });
    c.bench_function("catalogue_bootstrap", |b| {
        b.iter(|| RuleCatalogue::bootstrap(black_box(&RuleBounds::default())))
    });
}

fn benchmark_supported_gemm(c: &mut Criterion) {
    let mut g = ComputeGraph::new();
    let a = g.add_data_tensor("a", vec![256, 128]);
    let w = g.add_data_tensor("w", vec![128, 64]);
    let out = g.add_data_tensor("out", vec![256, 64]);
    let gemm = g
        .add_node(NodeSpec::mme("gemm", OpKind::Gemm).inputs([a, w]).outputs([out]))
        .unwrap();
    let rule = RuleCatalogue::global().get(RuleIdentifier::SupportedMultiGemmSeed);
    let ctx = RuleContext::new(&g).with_node(gemm);

    c.bench_function("supported_multi_gemm_seed", |b| {
        b.iter(|| black_box(rule.evaluate(&ctx)))
    });
}

fn benchmark_bpg_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("producer_bpg_cycle");
    for depth in [1usize, 8, 64] {
        let (g, producer, mme) = create_fan_graph(4, depth);
        let bundle: HashSet<NodeId> = HashSet::from([mme]);
        let candidates: Vec<NodeId> = Vec::new();
        let rule = RuleCatalogue::global().get(RuleIdentifier::NoProducerBpgCycle);

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            let ctx = RuleContext::new(&g)
                .with_node(producer)
                .with_bundle(&bundle)
                .with_candidates(&candidates);
            b.iter(|| black_box(rule.evaluate(&ctx)))
        });
    }
    group.finish();
}

fn benchmark_admission(c: &mut Criterion) {
    let (g, producer, mme) = create_fan_graph(4, 8);
    let engine = AdmissionEngine::default().with_metrics(false);
    let bundle: HashSet<NodeId> = HashSet::from([mme]);
    let candidates: Vec<NodeId> = Vec::new();
    let rules = [
        RuleIdentifier::IsNotBundled,
        RuleIdentifier::RunsOnTpc,
        RuleIdentifier::NoSharedInputInBundle,
        RuleIdentifier::NoMultipleOutputsInBundle,
        RuleIdentifier::NoProducerBpgCycle,
    ];

    c.bench_function("admission_check", |b| {
        let ctx = RuleContext::new(&g)
            .with_node(producer)
            .with_bundle(&bundle)
            .with_candidates(&candidates);
        b.iter(|| black_box(engine.evaluate(&ctx, &rules)))
    });
}

criterion_group!(
    benches,
    benchmark_catalogue_lookup,
    benchmark_supported_gemm,
    benchmark_bpg_cycle,
    benchmark_admission
);
criterion_main!(benches);
