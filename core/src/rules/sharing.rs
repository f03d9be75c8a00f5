//! Tensor sharing limits between the candidate and the bundle

use crate::context::RuleContext;
use crate::graph::{NodeId, TensorId};
use crate::rule::{Predicate, RuleIdentifier};
use std::collections::HashSet;
use tracing::debug;

/// Some input of the candidate is also consumed by a node of
/// `bundle ∪ candidates`. Shape tensors and non-scratchpad aux tensors are
/// free to share. Requires `ctx.node`, `ctx.bundle` and `ctx.candidates`.
pub fn has_shared_input_in_bundle(ctx: &RuleContext<'_>) -> bool {
    let rule = RuleIdentifier::HasSharedInputInBundle;
    let node = ctx.require_node(rule);
    let committed = ctx.committed_nodes(rule);

    for &input in ctx.graph.inputs(node) {
        let info = ctx.graph.tensor(input);
        if info.is_shape() || info.is_non_scratchpad_aux() {
            continue;
        }
        if let Some(other) = ctx
            .graph
            .consumers_of(input)
            .iter()
            .find(|c| committed.contains(*c))
        {
            debug!(
                "bundle candidate {} shares input tensor {} with node {} which is already in the bundle",
                ctx.node_name(node),
                info.name,
                ctx.node_name(*other)
            );
            return true;
        }
    }
    false
}

pub fn no_shared_input_in_bundle(ctx: &RuleContext<'_>) -> bool {
    !has_shared_input_in_bundle(ctx)
}

/// Count of data inputs read by more than one MME node of
/// `bundle ∪ {candidate}` is at most `max_shared`. Requires `ctx.node` and
/// `ctx.bundle`.
pub fn not_exceeds_shared_mme_operands(max_shared: usize) -> Predicate {
    Predicate::leaf(RuleIdentifier::SingleSharedMmeOperandInBundle, move |ctx| {
        let rule = RuleIdentifier::SingleSharedMmeOperandInBundle;
        let node = ctx.require_node(rule);
        let mut members = ctx.require_bundle(rule).nodes().clone();
        members.insert(node);

        let is_member_mme = |n: &NodeId| members.contains(n) && ctx.graph.runs_on_mme(*n);
        let mut shared: HashSet<TensorId> = HashSet::new();
        for mme in members.iter().filter(|n| ctx.graph.runs_on_mme(**n)) {
            for &input in ctx.graph.inputs(*mme) {
                if !ctx.graph.tensor(input).is_data() {
                    continue;
                }
                let mme_readers = ctx
                    .graph
                    .consumers_of(input)
                    .iter()
                    .filter(|c| is_member_mme(*c))
                    .count();
                if mme_readers > 1 {
                    shared.insert(input);
                }
            }
        }

        if shared.len() > max_shared {
            debug!(
                "candidate {} raises shared MME operands to {} (max {})",
                ctx.node_name(node),
                shared.len(),
                max_shared
            );
            return false;
        }
        true
    })
}

/// At most one output of the candidate is consumed inside
/// `bundle ∪ candidates`. Requires `ctx.node`, `ctx.bundle` and
/// `ctx.candidates`.
pub fn no_multiple_outputs_in_bundle(ctx: &RuleContext<'_>) -> bool {
    let rule = RuleIdentifier::NoMultipleOutputsInBundle;
    let node = ctx.require_node(rule);
    let committed = ctx.committed_nodes(rule);

    let bundled_outputs = ctx
        .graph
        .outputs(node)
        .iter()
        .filter(|t| {
            ctx.graph
                .consumers_of(**t)
                .iter()
                .any(|c| committed.contains(c))
        })
        .count();
    if bundled_outputs > 1 {
        debug!(
            "candidate {} has {} outputs consumed in the bundle",
            ctx.node_name(node),
            bundled_outputs
        );
        return false;
    }
    true
}
