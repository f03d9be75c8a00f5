//! Operand rank, dynamism and size predicates

use crate::context::RuleContext;
use crate::graph::{operands, TensorId};
use crate::rule::{Predicate, RuleIdentifier};
use tracing::debug;

/// No operand of the node has rank above `max_rank`. Requires `ctx.node`.
pub fn is_low_rank(max_rank: usize) -> Predicate {
    Predicate::leaf(RuleIdentifier::IsLowRank, move |ctx| {
        let node = ctx.require_node(RuleIdentifier::IsLowRank);
        match operands(ctx.graph, node).find(|t| ctx.graph.tensor(*t).rank() > max_rank) {
            Some(t) => {
                debug!(
                    "node: {} operand {} has rank {} above {}",
                    ctx.node_name(node),
                    ctx.graph.tensor(t).name,
                    ctx.graph.tensor(t).rank(),
                    max_rank
                );
                false
            }
            None => true,
        }
    })
}

/// No operand of the node is dynamic-shaped. Requires `ctx.node`.
pub fn is_static_shape(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::IsStaticShape);
    !operands(ctx.graph, node).any(|t| ctx.graph.tensor(t).dynamic_shape)
}

fn max_dense_size(ctx: &RuleContext<'_>, tensors: &[TensorId]) -> u64 {
    tensors
        .iter()
        .map(|t| ctx.graph.tensor(*t).dense_size_in_elements())
        .max()
        .unwrap_or(0)
}

/// True for non-MME nodes; for MME nodes, the largest input is strictly
/// larger than the largest output. Requires `ctx.node`.
pub fn mme_inputs_larger_than_outputs(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::MmeInputsLargerThanOutputs);
    if !ctx.graph.runs_on_mme(node) {
        return true;
    }
    max_dense_size(ctx, ctx.graph.inputs(node)) > max_dense_size(ctx, ctx.graph.outputs(node))
}

/// Mirror of [`mme_inputs_larger_than_outputs`]
pub fn mme_outputs_larger_than_inputs(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::MmeOutputsLargerThanInputs);
    if !ctx.graph.runs_on_mme(node) {
        return true;
    }
    max_dense_size(ctx, ctx.graph.outputs(node)) > max_dense_size(ctx, ctx.graph.inputs(node))
}
