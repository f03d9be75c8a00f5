//! Engine and operator class predicates. All of them require `ctx.node`.

use crate::context::RuleContext;
use crate::graph::OpKind;
use crate::rule::{Predicate, RuleIdentifier};
use std::collections::HashSet;
use tracing::debug;

/// Batch dims start after the two matrix dims
const DIM_GEMM_BATCH: usize = 2;

pub fn runs_on_tpc(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::RunsOnTpc);
    ctx.graph.runs_on_tpc(node)
}

pub fn not_runs_on_tpc(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::NotRunsOnTpc);
    !ctx.graph.runs_on_tpc(node)
}

pub fn runs_on_mme(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::RunsOnMme);
    ctx.graph.runs_on_mme(node)
}

pub fn not_runs_on_mme(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::NotRunsOnMme);
    !ctx.graph.runs_on_mme(node)
}

pub fn runs_on_dma(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::RunsOnDma);
    ctx.graph.runs_on_dma(node)
}

pub fn not_runs_on_dma(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::NotRunsOnDma);
    !ctx.graph.runs_on_dma(node)
}

pub fn is_logical_operation(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::IsLogicalOperation);
    ctx.graph.is_logical_operation(node)
}

/// A logical op can only be bundled with a single data input and a single
/// data output; anything else needs all its producers and consumers in the
/// same bundle, which bundling does not guarantee.
pub fn supported_logical_operation(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::SupportedLogicalOperation);
    if !ctx.graph.is_logical_operation(node) {
        return true;
    }
    let count_data = |tensors: &[_]| {
        tensors
            .iter()
            .filter(|t| ctx.graph.tensor(**t).is_data())
            .count()
    };
    let inputs = count_data(ctx.graph.inputs(node));
    let outputs = count_data(ctx.graph.outputs(node));
    if inputs != 1 || outputs != 1 {
        debug!(
            "logical node: {} has {} data inputs and {} data outputs",
            ctx.node_name(node),
            inputs,
            outputs
        );
        return false;
    }
    true
}

pub fn is_gemm(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::IsGemm);
    let info = ctx.graph.node(node);
    if !info.op.is_gemm() {
        debug!("node: {}, type: {:?} is not a gemm node", info.name, info.op);
        return false;
    }
    true
}

pub fn is_batch_gemm(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::IsBatchGemm);
    let info = ctx.graph.node(node);
    if !info.op.is_batch_gemm() {
        debug!(
            "node: {}, type: {:?} is not a masked batch gemm / batch gemm node",
            info.name, info.op
        );
        return false;
    }
    true
}

/// Forward/backward convolution check, only when conv bundling is enabled.
pub fn is_conv(conv_bundling: bool) -> Predicate {
    Predicate::leaf(RuleIdentifier::IsConv, move |ctx| {
        let node = ctx.require_node(RuleIdentifier::IsConv);
        if !conv_bundling {
            return false;
        }
        let info = ctx.graph.node(node);
        if !info.op.is_convolution() {
            debug!(
                "node: {}, type: {:?} is not a fwd/bwd convolution node",
                info.name, info.op
            );
            return false;
        }
        true
    })
}

/// Batch gemm with at least one batch dim and operands of equal rank.
///
/// # Panics
/// If the node is not a batch gemm, or lacks the two operands and the output.
pub fn valid_batch_gemm(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::ValidBatchGemm);
    let info = ctx.graph.node(node);
    assert!(
        info.op.is_batch_gemm(),
        "rule {}: node '{}' is not a batch gemm",
        RuleIdentifier::ValidBatchGemm,
        info.name
    );
    assert!(
        info.inputs.len() >= 2 && !info.outputs.is_empty(),
        "rule {}: batch gemm '{}' needs two operands and an output",
        RuleIdentifier::ValidBatchGemm,
        info.name
    );

    let out_rank = ctx.graph.tensor(info.outputs[0]).rank();
    if out_rank <= DIM_GEMM_BATCH {
        debug!("batch-gemm {} without any batch dimensions is not supported", info.name);
        return false;
    }

    let a_rank = ctx.graph.tensor(info.inputs[0]).rank();
    let b_rank = ctx.graph.tensor(info.inputs[1]).rank();
    if a_rank != b_rank {
        debug!(
            "unsupported bgemm {} with operand A rank {} != operand B rank {}",
            info.name, a_rank, b_rank
        );
        return false;
    }
    true
}

/// No data tensor feeds two input slots of the node
pub fn has_unique_inputs(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::HasUniqueInputs);
    let mut seen = HashSet::new();
    for &input in ctx.graph.inputs(node) {
        if !ctx.graph.tensor(input).is_data() {
            continue;
        }
        if !seen.insert(input) {
            debug!(
                "node: {} - input tensor {} has multiple operand roles",
                ctx.node_name(node),
                ctx.graph.tensor(input).name
            );
            return false;
        }
    }
    true
}

pub fn not_serialize_deserialize_node(ctx: &RuleContext<'_>) -> bool {
    let node = ctx.require_node(RuleIdentifier::NotSerializeDeserializeNode);
    !matches!(
        ctx.graph.node(node).op,
        OpKind::Serialize | OpKind::Deserialize
    )
}
