//! Structural predicate library
//!
//! Every rule the catalogue serves is listed once in [`catalogue_table`]:
//! plain leaf functions, leaves closed over a [`RuleBounds`] value, and AND/OR
//! composites named by their children's identifiers.

pub mod access;
pub mod bounds;
pub mod bundle_state;
pub mod node_kind;
pub mod shape;
pub mod sharing;
pub mod topology;

use crate::config::RuleBounds;
use crate::context::RuleContext;
use crate::rule::{Combinator, Predicate, RuleIdentifier};

type LeafFn = fn(&RuleContext<'_>) -> bool;

/// One row of the bootstrap table
pub enum RuleEntry {
    Atomic(Predicate),
    Composite {
        identifier: RuleIdentifier,
        combinator: Combinator,
        children: &'static [RuleIdentifier],
    },
}

impl RuleEntry {
    pub fn identifier(&self) -> RuleIdentifier {
        match self {
            RuleEntry::Atomic(predicate) => predicate.identifier(),
            RuleEntry::Composite { identifier, .. } => *identifier,
        }
    }
}

const LEAVES: &[(RuleIdentifier, LeafFn)] = &[
    (RuleIdentifier::IsStaticShape, shape::is_static_shape),
    (RuleIdentifier::IsBundled, bundle_state::is_bundled),
    (RuleIdentifier::IsNotBundled, bundle_state::is_not_bundled),
    (RuleIdentifier::HasAccessPattern, access::has_access_pattern),
    (RuleIdentifier::BindingInputReuse, bundle_state::binding_input_reuse),
    (RuleIdentifier::NoBindingInputReuse, bundle_state::no_binding_input_reuse),
    (
        RuleIdentifier::OverlapOrOffsetInAccessPattern,
        access::overlap_or_offset_in_access_pattern,
    ),
    (
        RuleIdentifier::NoOverlapOrOffsetInAccessPattern,
        access::no_overlap_or_offset_in_access_pattern,
    ),
    (RuleIdentifier::HasUniqueInputs, node_kind::has_unique_inputs),
    (RuleIdentifier::SupportedLogicalOperation, node_kind::supported_logical_operation),
    (RuleIdentifier::IsLogicalOperation, node_kind::is_logical_operation),
    (RuleIdentifier::RunsOnTpc, node_kind::runs_on_tpc),
    (RuleIdentifier::NotRunsOnTpc, node_kind::not_runs_on_tpc),
    (RuleIdentifier::RunsOnMme, node_kind::runs_on_mme),
    (RuleIdentifier::NotRunsOnMme, node_kind::not_runs_on_mme),
    (RuleIdentifier::RunsOnDma, node_kind::runs_on_dma),
    (RuleIdentifier::NotRunsOnDma, node_kind::not_runs_on_dma),
    (RuleIdentifier::IsGemm, node_kind::is_gemm),
    (RuleIdentifier::IsBatchGemm, node_kind::is_batch_gemm),
    (RuleIdentifier::ValidBatchGemm, node_kind::valid_batch_gemm),
    (RuleIdentifier::IsIsolated, topology::is_isolated),
    (RuleIdentifier::NoAncestorsInBundle, topology::no_ancestors_in_bundle),
    (RuleIdentifier::HasSharedInputInBundle, sharing::has_shared_input_in_bundle),
    (RuleIdentifier::NoSharedInputInBundle, sharing::no_shared_input_in_bundle),
    (RuleIdentifier::NoMultipleOutputsInBundle, sharing::no_multiple_outputs_in_bundle),
    (RuleIdentifier::IsProducerBpgCycle, topology::is_producer_bpg_cycle),
    (RuleIdentifier::NoProducerBpgCycle, topology::no_producer_bpg_cycle),
    (RuleIdentifier::IsConsumerBpgCycle, topology::is_consumer_bpg_cycle),
    (RuleIdentifier::NoConsumerBpgCycle, topology::no_consumer_bpg_cycle),
    (
        RuleIdentifier::NoSharedMmeOperandBpgCycle,
        topology::no_shared_mme_operand_bpg_cycle,
    ),
    (RuleIdentifier::LastCandidateTpc, bounds::last_candidate_tpc),
    (RuleIdentifier::LastCandidateMme, bounds::last_candidate_mme),
    (RuleIdentifier::NoMmeProducersBundled, bundle_state::no_mme_producers_bundled),
    (RuleIdentifier::NoMmeConsumersBundled, bundle_state::no_mme_consumers_bundled),
    (RuleIdentifier::NoTpcConsumers, topology::no_tpc_consumers),
    (
        RuleIdentifier::NotSerializeDeserializeNode,
        node_kind::not_serialize_deserialize_node,
    ),
    (RuleIdentifier::MmeInputsLargerThanOutputs, shape::mme_inputs_larger_than_outputs),
    (RuleIdentifier::MmeOutputsLargerThanInputs, shape::mme_outputs_larger_than_inputs),
];

// Children must appear earlier in the table than their parent
const COMPOSITES: &[(RuleIdentifier, Combinator, &[RuleIdentifier])] = &[
    (
        RuleIdentifier::SupportedGemm,
        Combinator::And,
        &[RuleIdentifier::IsGemm, RuleIdentifier::HasUniqueInputs],
    ),
    (
        RuleIdentifier::SupportedBatchGemm,
        Combinator::And,
        &[
            RuleIdentifier::IsBatchGemm,
            RuleIdentifier::HasUniqueInputs,
            RuleIdentifier::ValidBatchGemm,
        ],
    ),
    (
        RuleIdentifier::SupportedMultiGemmSeed,
        Combinator::Or,
        &[
            RuleIdentifier::SupportedGemm,
            RuleIdentifier::SupportedBatchGemm,
            RuleIdentifier::IsConv,
        ],
    ),
    (
        RuleIdentifier::SupportedAttentionSeed,
        Combinator::Or,
        &[
            RuleIdentifier::SupportedGemm,
            RuleIdentifier::SupportedBatchGemm,
            RuleIdentifier::IsLogicalOperation,
        ],
    ),
];

/// Every catalogue rule, atomics first, with bound parameters taken from `bounds`
pub fn catalogue_table(bounds: &RuleBounds) -> Vec<RuleEntry> {
    let mut table: Vec<RuleEntry> = LEAVES
        .iter()
        .map(|&(identifier, f)| RuleEntry::Atomic(Predicate::leaf(identifier, f)))
        .collect();

    table.extend(
        [
            shape::is_low_rank(bounds.max_low_rank),
            node_kind::is_conv(bounds.conv_bundling),
            sharing::not_exceeds_shared_mme_operands(bounds.max_shared_mme_operands),
            self::bounds::not_exceeds_candidates(bounds.max_candidates),
            self::bounds::not_exceeds_seed_nodes(bounds.max_seed_nodes),
            self::bounds::has_tpc_candidates(bounds.tpc_candidates),
        ]
        .map(RuleEntry::Atomic),
    );

    table.extend(
        COMPOSITES
            .iter()
            .map(|&(identifier, combinator, children)| RuleEntry::Composite {
                identifier,
                combinator,
                children,
            }),
    );
    table
}
