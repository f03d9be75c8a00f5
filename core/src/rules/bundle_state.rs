//! Bundle membership predicates

use crate::context::RuleContext;
use crate::graph::BundleView;
use crate::rule::RuleIdentifier;
use tracing::debug;

/// Node already committed to a bundle. Requires `ctx.node`.
pub fn is_bundled(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::IsBundled);
    match ctx.graph.bundle_of(node) {
        Some(bundle) => {
            debug!("Node: {} already belongs to {}", ctx.node_name(node), bundle);
            true
        }
        None => false,
    }
}

pub fn is_not_bundled(ctx: &RuleContext<'_>) -> bool {
    !is_bundled(ctx)
}

pub fn binding_input_reuse(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::BindingInputReuse);
    if ctx.graph.node(node).binding_input_reuse {
        debug!("{} has binding input reuse", ctx.node_name(node));
        return true;
    }
    false
}

pub fn no_binding_input_reuse(ctx: &RuleContext<'_>) -> bool {
    !binding_input_reuse(ctx)
}

/// No MME node of the bundle reads a tensor produced inside the bundle.
/// Requires `ctx.bundle`.
pub fn no_mme_producers_bundled(ctx: &RuleContext<'_>) -> bool {
    let bundle = ctx.require_bundle(RuleIdentifier::NoMmeProducersBundled);
    !bundle
        .nodes()
        .iter()
        .filter(|n| ctx.graph.runs_on_mme(**n))
        .any(|n| {
            ctx.graph
                .inputs(*n)
                .iter()
                .filter_map(|t| ctx.graph.producer_of(*t))
                .any(|producer| bundle.contains(producer))
        })
}

/// No MME node of the bundle feeds a consumer inside the bundle.
/// Requires `ctx.bundle`.
pub fn no_mme_consumers_bundled(ctx: &RuleContext<'_>) -> bool {
    let bundle = ctx.require_bundle(RuleIdentifier::NoMmeConsumersBundled);
    !bundle
        .nodes()
        .iter()
        .filter(|n| ctx.graph.runs_on_mme(**n))
        .any(|n| {
            ctx.graph
                .outputs(*n)
                .iter()
                .flat_map(|t| ctx.graph.consumers_of(*t).iter())
                .any(|consumer| bundle.contains(*consumer))
        })
}
