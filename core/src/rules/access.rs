//! Access pattern predicates

use crate::access_pattern::TilingHazard;
use crate::context::RuleContext;
use crate::graph::operands;
use crate::rule::RuleIdentifier;
use tracing::debug;

/// The node has an access pattern and every input and output maps into it.
/// Requires `ctx.node`.
pub fn has_access_pattern(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::HasAccessPattern);
    let Some(ap) = ctx.graph.access_pattern(node) else {
        debug!("Node: {} does not have an access pattern", ctx.node_name(node));
        return false;
    };

    // Fused nodes may end up with shape tensors the access pattern never mapped
    if let Some(t) = operands(ctx.graph, node).find(|t| !ap.has_operand(*t)) {
        debug!(
            "Node: {}, operand: {} has no access pattern",
            ctx.node_name(node),
            ctx.graph.tensor(t).name
        );
        return false;
    }
    true
}

/// Some data operand overlaps, starts at an offset, or leaves index-space
/// elements unmapped.
///
/// # Panics
/// If `ctx.node` is absent, has no access pattern, or one of its data operands
/// is not mapped by it.
pub fn overlap_or_offset_in_access_pattern(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::OverlapOrOffsetInAccessPattern);
    let ap = ctx.graph.access_pattern(node).unwrap_or_else(|| {
        panic!(
            "rule {}: node '{}' has no access pattern",
            RuleIdentifier::OverlapOrOffsetInAccessPattern,
            ctx.node_name(node)
        )
    });

    for t in operands(ctx.graph, node) {
        let info = ctx.graph.tensor(t);
        if info.is_shape() {
            continue;
        }
        if let Some(hazard) = ap.tiling_hazard(t, info) {
            match hazard {
                TilingHazard::Overlap { dim, overlap } => debug!(
                    "node {} has overlap {} on tensor {}, dim {}",
                    ctx.node_name(node),
                    overlap,
                    info.name,
                    dim
                ),
                TilingHazard::Offset { dim, offset } => debug!(
                    "node {} has offset {} on tensor {} dim {}",
                    ctx.node_name(node),
                    offset,
                    info.name,
                    dim
                ),
                TilingHazard::Padding { dim } => debug!(
                    "node {} has padding on tensor {} dim {}",
                    ctx.node_name(node),
                    info.name,
                    dim
                ),
            }
            return true;
        }
    }
    false
}

pub fn no_overlap_or_offset_in_access_pattern(ctx: &RuleContext<'_>) -> bool {
    !overlap_or_offset_in_access_pattern(ctx)
}
