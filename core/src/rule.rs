//! Rules: named predicates over a [`RuleContext`]
//!
//! A [`Predicate`] is either a leaf closure or an AND/OR composite of other
//! predicates. Both evaluate through the same [`Predicate::evaluate`], so
//! composites nest to any depth.

use crate::context::RuleContext;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::trace;

macro_rules! rule_identifiers {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Stable identifier of every rule the catalogue knows about
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum RuleIdentifier {
            $($variant),+
        }

        impl RuleIdentifier {
            /// Every identifier, in declaration order
            pub const ALL: &'static [RuleIdentifier] = &[$(RuleIdentifier::$variant),+];

            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(RuleIdentifier::$variant => $name),+
                }
            }
        }
    };
}

rule_identifiers! {
    IsLowRank => "IS_LOW_RANK",
    IsStaticShape => "IS_STATIC_SHAPE",
    IsBundled => "IS_BUNDLED",
    IsNotBundled => "IS_NOT_BUNDLED",
    HasAccessPattern => "HAS_ACCESS_PATTERN",
    BindingInputReuse => "BINDING_INPUT_REUSE",
    NoBindingInputReuse => "NO_BINDING_INPUT_REUSE",
    OverlapOrOffsetInAccessPattern => "OVERLAP_OR_OFFSET_IN_ACCESS_PATTERN",
    NoOverlapOrOffsetInAccessPattern => "NO_OVERLAP_OR_OFFSET_IN_ACCESS_PATTERN",
    HasUniqueInputs => "HAS_UNIQUE_INPUTS",
    SupportedLogicalOperation => "SUPPORTED_LOGICAL_OPERATION",
    IsLogicalOperation => "IS_LOGICAL_OPERATION",
    RunsOnTpc => "RUNS_ON_TPC",
    NotRunsOnTpc => "NOT_RUNS_ON_TPC",
    RunsOnMme => "RUNS_ON_MME",
    NotRunsOnMme => "NOT_RUNS_ON_MME",
    RunsOnDma => "RUNS_ON_DMA",
    NotRunsOnDma => "NOT_RUNS_ON_DMA",
    IsGemm => "IS_GEMM",
    IsConv => "IS_CONV",
    IsBatchGemm => "IS_BATCH_GEMM",
    ValidBatchGemm => "VALID_BATCH_GEMM",
    IsIsolated => "IS_ISOLATED",
    NoAncestorsInBundle => "NO_ANCESTORS_IN_BUNDLE",
    HasSharedInputInBundle => "HAS_SHARED_INPUT_IN_BUNDLE",
    NoSharedInputInBundle => "NO_SHARED_INPUT_IN_BUNDLE",
    SingleSharedMmeOperandInBundle => "SINGLE_SHARED_MME_OPERAND_IN_BUNDLE",
    NoMultipleOutputsInBundle => "NO_MULTIPLE_OUTPUTS_IN_BUNDLE",
    IsProducerBpgCycle => "IS_PRODUCER_BPG_CYCLE",
    NoProducerBpgCycle => "NO_PRODUCER_BPG_CYCLE",
    IsConsumerBpgCycle => "IS_CONSUMER_BPG_CYCLE",
    NoConsumerBpgCycle => "NO_CONSUMER_BPG_CYCLE",
    NoSharedMmeOperandBpgCycle => "NO_SHARED_MME_OPERAND_BPG_CYCLE",
    NotMaxCandidates => "NOT_MAX_CANDIDATES",
    IsValidSeedSize => "IS_VALID_SEED_SIZE",
    LastCandidateTpc => "LAST_CANDIDATE_TPC",
    LastCandidateMme => "LAST_CANDIDATE_MME",
    ExactlyTpcCandidates => "EXACTLY_TPC_CANDIDATES",
    NoMmeProducersBundled => "NO_MME_PRODUCERS_BUNDLED",
    NoMmeConsumersBundled => "NO_MME_CONSUMERS_BUNDLED",
    NoTpcConsumers => "NO_TPC_CONSUMERS",
    NotSerializeDeserializeNode => "NOT_SERIALIZE_DESERIALIZE_NODE",
    MmeInputsLargerThanOutputs => "MME_INPUTS_LARGER_THAN_OUTPUTS",
    MmeOutputsLargerThanInputs => "MME_OUTPUTS_LARGER_THAN_INPUTS",
    SupportedGemm => "SUPPORTED_GEMM",
    SupportedBatchGemm => "SUPPORTED_BATCH_GEMM",
    SupportedMultiGemmSeed => "SUPPORTED_MULTI_GEMM_SEED",
    SupportedAttentionSeed => "SUPPORTED_ATTENTION_SEED",
}

impl fmt::Display for RuleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleIdentifier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        RuleIdentifier::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown rule identifier: {}", s))
    }
}

/// How a composite folds its children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    And,
    Or,
}

type RuleFn = dyn Fn(&RuleContext<'_>) -> bool + Send + Sync;

/// Shared, immutable handle to a predicate
pub type PredicateHandle = Arc<Predicate>;

enum RuleBody {
    Leaf(Box<RuleFn>),
    Composite {
        combinator: Combinator,
        children: Vec<PredicateHandle>,
    },
}

pub struct Predicate {
    identifier: RuleIdentifier,
    name: String,
    body: RuleBody,
}

impl Predicate {
    /// Leaf rule named after its identifier
    pub fn leaf<F>(identifier: RuleIdentifier, f: F) -> Self
    where
        F: Fn(&RuleContext<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            identifier,
            name: identifier.to_string(),
            body: RuleBody::Leaf(Box::new(f)),
        }
    }

    /// # Panics
    /// If `children` is empty.
    pub fn composite(
        identifier: RuleIdentifier,
        combinator: Combinator,
        children: Vec<PredicateHandle>,
    ) -> Self {
        assert!(
            !children.is_empty(),
            "composite rule {identifier} must have at least one child"
        );
        Self {
            identifier,
            name: identifier.to_string(),
            body: RuleBody::Composite {
                combinator,
                children,
            },
        }
    }

    /// AND composite. Panics if `children` is empty.
    pub fn all(identifier: RuleIdentifier, children: Vec<PredicateHandle>) -> Self {
        Self::composite(identifier, Combinator::And, children)
    }

    /// OR composite. Panics if `children` is empty.
    pub fn any(identifier: RuleIdentifier, children: Vec<PredicateHandle>) -> Self {
        Self::composite(identifier, Combinator::Or, children)
    }

    /// Override the display name, e.g. for composites assembled at a call site
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn into_handle(self) -> PredicateHandle {
        Arc::new(self)
    }

    pub fn identifier(&self) -> RuleIdentifier {
        self.identifier
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn combinator(&self) -> Option<Combinator> {
        match &self.body {
            RuleBody::Leaf(_) => None,
            RuleBody::Composite { combinator, .. } => Some(*combinator),
        }
    }

    pub fn children(&self) -> &[PredicateHandle] {
        match &self.body {
            RuleBody::Leaf(_) => &[],
            RuleBody::Composite { children, .. } => children,
        }
    }

    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> bool {
        match &self.body {
            RuleBody::Leaf(f) => {
                trace!("Apply rule {}", self.name);
                f(ctx)
            }
            RuleBody::Composite {
                combinator,
                children,
            } => {
                let _guard =
                    tracing::trace_span!("composite_rule", rule = %self.name, ?combinator).entered();
                match combinator {
                    Combinator::And => children.iter().all(|child| child.evaluate(ctx)),
                    Combinator::Or => children.iter().any(|child| child.evaluate(ctx)),
                }
            }
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Predicate");
        s.field("identifier", &self.identifier).field("name", &self.name);
        if let RuleBody::Composite {
            combinator,
            children,
        } = &self.body
        {
            let ids: Vec<RuleIdentifier> = children.iter().map(|c| c.identifier).collect();
            s.field("combinator", combinator).field("children", &ids);
        }
        s.finish()
    }
}
