//! Candidate and seed multiplicity bounds
//!
//! Pure arithmetic over collection sizes. The bound is a runtime value closed
//! over when the predicate is built.

use crate::context::RuleContext;
use crate::graph::{GraphQuery, NodeId};
use crate::rule::{Predicate, RuleIdentifier};

/// `|candidates| + (node present ? 1 : 0) <= bound`. Requires `ctx.candidates`.
///
/// A zero bound only requires the candidate list to be empty and ignores the
/// node under evaluation.
pub fn not_exceeds_candidates(bound: usize) -> Predicate {
    Predicate::leaf(RuleIdentifier::NotMaxCandidates, move |ctx| {
        let candidates = ctx.require_candidates(RuleIdentifier::NotMaxCandidates);
        if bound == 0 {
            return candidates.is_empty();
        }
        candidates.len() + usize::from(ctx.node.is_some()) <= bound
    })
}

/// `|bundle| + 1 <= bound`, counting the candidate. Requires `ctx.node` and
/// `ctx.bundle`.
pub fn not_exceeds_seed_nodes(bound: usize) -> Predicate {
    Predicate::leaf(RuleIdentifier::IsValidSeedSize, move |ctx| {
        ctx.require_node(RuleIdentifier::IsValidSeedSize);
        let bundle = ctx.require_bundle(RuleIdentifier::IsValidSeedSize);
        bundle.len() < bound
    })
}

/// Exactly `count` of the candidates run on TPC. Requires `ctx.candidates`.
pub fn has_tpc_candidates(count: usize) -> Predicate {
    Predicate::leaf(RuleIdentifier::ExactlyTpcCandidates, move |ctx| {
        let candidates = ctx.require_candidates(RuleIdentifier::ExactlyTpcCandidates);
        candidates.iter().filter(|n| ctx.graph.runs_on_tpc(**n)).count() == count
    })
}

fn last_candidate_matches(
    ctx: &RuleContext<'_>,
    rule: RuleIdentifier,
    engine_check: fn(&dyn GraphQuery, NodeId) -> bool,
) -> bool {
    ctx.require_candidates(rule)
        .last()
        .is_some_and(|last| engine_check(ctx.graph, *last))
}

pub fn last_candidate_tpc(ctx: &RuleContext<'_>) -> bool {
    last_candidate_matches(ctx, RuleIdentifier::LastCandidateTpc, |g, n| g.runs_on_tpc(n))
}

pub fn last_candidate_mme(ctx: &RuleContext<'_>) -> bool {
    last_candidate_matches(ctx, RuleIdentifier::LastCandidateMme, |g, n| g.runs_on_mme(n))
}
