//! Topological safety predicates
//!
//! Ancestry checks against the bundle and BPG cycle checks on stitch tensors.
//! A stitch tensor connects the candidate to a node of
//! `bundle ∪ candidates`: on the producer side it is an output of the
//! candidate read by such a node, on the consumer side an input of the
//! candidate written by one.

use crate::context::RuleContext;
use crate::graph::{BundleView, NodeId, TensorId};
use crate::rule::RuleIdentifier;
use std::collections::HashSet;
use tracing::debug;

/// Every other MME reader of the candidate's inputs is an ancestor or a
/// descendant of the candidate. Requires `ctx.node`.
pub fn is_isolated(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::IsIsolated);
    for &input in ctx.graph.inputs(node) {
        for &consumer in ctx.graph.consumers_of(input) {
            if consumer == node || !ctx.graph.runs_on_mme(consumer) {
                continue;
            }
            if !ctx.graph.is_ancestor(consumer, node) && !ctx.graph.is_ancestor(node, consumer) {
                debug!(
                    "node {} shares input {} with unrelated MME node {}",
                    ctx.node_name(node),
                    ctx.graph.tensor(input).name,
                    ctx.node_name(consumer)
                );
                return false;
            }
        }
    }
    true
}

/// No bundle node is an ancestor or descendant of the candidate. Requires
/// `ctx.node` and `ctx.bundle`.
pub fn no_ancestors_in_bundle(ctx: &RuleContext<'_>) -> bool {
    let rule = RuleIdentifier::NoAncestorsInBundle;
    let node = ctx.require_node(rule);
    let bundle = ctx.require_bundle(rule);
    !bundle.nodes().iter().any(|&member| {
        member != node
            && (ctx.graph.is_ancestor(node, member) || ctx.graph.is_ancestor(member, node))
    })
}

/// Consumers of the node's data outputs that do real work, looking through
/// logical ops.
fn real_consumers(ctx: &RuleContext<'_>, node: NodeId) -> Vec<NodeId> {
    let mut found = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        for &out in ctx.graph.outputs(n) {
            if !ctx.graph.tensor(out).is_data() {
                continue;
            }
            for &consumer in ctx.graph.consumers_of(out) {
                if !visited.insert(consumer) {
                    continue;
                }
                if ctx.graph.is_logical_operation(consumer) {
                    stack.push(consumer);
                } else {
                    found.push(consumer);
                }
            }
        }
    }
    found
}

/// No real consumer of the node's data outputs runs on TPC. Requires
/// `ctx.node`.
pub fn no_tpc_consumers(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::NoTpcConsumers);
    !real_consumers(ctx, node)
        .into_iter()
        .any(|c| ctx.graph.runs_on_tpc(c))
}

fn producer_stitch_tensors(
    ctx: &RuleContext<'_>,
    node: NodeId,
    committed: &HashSet<NodeId>,
) -> Vec<TensorId> {
    ctx.graph
        .outputs(node)
        .iter()
        .copied()
        .filter(|t| {
            ctx.graph
                .consumers_of(*t)
                .iter()
                .any(|c| committed.contains(c))
        })
        .collect()
}

fn consumer_stitch_tensors(
    ctx: &RuleContext<'_>,
    node: NodeId,
    committed: &HashSet<NodeId>,
) -> Vec<TensorId> {
    ctx.graph
        .inputs(node)
        .iter()
        .copied()
        .filter(|t| {
            ctx.graph
                .producer_of(*t)
                .is_some_and(|p| committed.contains(&p))
        })
        .collect()
}

fn log_bpg_cycle(ctx: &RuleContext<'_>, node: NodeId, tensor: TensorId) {
    debug!(
        "adding candidate: {} with stitched tensor: {} to the bundle introduces a BPG cycle",
        ctx.node_name(node),
        ctx.graph.tensor(tensor).name
    );
}

/// Some producer-side stitch tensor closes a BPG cycle. Requires `ctx.node`,
/// `ctx.bundle` and `ctx.candidates`.
pub fn is_producer_bpg_cycle(ctx: &RuleContext<'_>) -> bool {
    let rule = RuleIdentifier::IsProducerBpgCycle;
    let node = ctx.require_node(rule);
    let committed = ctx.committed_nodes(rule);
    let stitched = producer_stitch_tensors(ctx, node, &committed);

    ctx.with_validation(|paths| {
        stitched.iter().any(|&t| {
            let unsafe_stitch = !paths.validate_producer_paths(node, t, &committed);
            if unsafe_stitch {
                log_bpg_cycle(ctx, node, t);
            }
            unsafe_stitch
        })
    })
}

pub fn no_producer_bpg_cycle(ctx: &RuleContext<'_>) -> bool {
    !is_producer_bpg_cycle(ctx)
}

/// Some consumer-side stitch tensor closes a BPG cycle. Requires `ctx.node`,
/// `ctx.bundle` and `ctx.candidates`.
pub fn is_consumer_bpg_cycle(ctx: &RuleContext<'_>) -> bool {
    let rule = RuleIdentifier::IsConsumerBpgCycle;
    let node = ctx.require_node(rule);
    let committed = ctx.committed_nodes(rule);
    let stitched = consumer_stitch_tensors(ctx, node, &committed);

    ctx.with_validation(|paths| {
        stitched.iter().any(|&t| {
            let unsafe_stitch = !paths.validate_consumer_paths(node, t, &committed);
            if unsafe_stitch {
                log_bpg_cycle(ctx, node, t);
            }
            unsafe_stitch
        })
    })
}

pub fn no_consumer_bpg_cycle(ctx: &RuleContext<'_>) -> bool {
    !is_consumer_bpg_cycle(ctx)
}

/// The first data input the candidate shares with an MME node of the bundle
/// can be stitched without a BPG cycle. Passes when no such input exists.
/// Candidates are not considered. Requires `ctx.node` and `ctx.bundle`.
pub fn no_shared_mme_operand_bpg_cycle(ctx: &RuleContext<'_>) -> bool {
    let rule = RuleIdentifier::NoSharedMmeOperandBpgCycle;
    let node = ctx.require_node(rule);
    let bundle = ctx.require_bundle(rule);

    let shared = ctx.graph.inputs(node).iter().copied().find(|t| {
        ctx.graph.tensor(*t).is_data()
            && ctx
                .graph
                .consumers_of(*t)
                .iter()
                .any(|c| ctx.graph.runs_on_mme(*c) && bundle.contains(*c))
    });
    let Some(shared) = shared else {
        return true;
    };

    let safe = ctx.with_validation(|paths| paths.validate_consumer_paths(node, shared, bundle.nodes()));
    if !safe {
        debug!(
            "adding candidate: {} with shared operand: {} to the seed introduces a BPG cycle",
            ctx.node_name(node),
            ctx.graph.tensor(shared).name
        );
    }
    safe
}
