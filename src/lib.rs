pub mod config;
pub mod logging;
pub mod metrics;

pub use bundle_rules_core::*;

use crate::config::BundlerConfig;
use crate::metrics::RULE_METRICS;
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// One rule decision inside an admission check
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct EvaluationTrace {
    pub rule: RuleIdentifier,
    pub rule_name: String,
    pub admitted: bool,
}

/// Outcome of checking a candidate node against an ordered rule list
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Admission {
    pub admitted: bool,
    /// First rule that rejected the node
    pub rejected_by: Option<RuleIdentifier>,
    pub traces: Vec<EvaluationTrace>,
}

/// Runs rule lists from a catalogue the way a bundler asks for them: in
/// order, stopping at the first rejection.
#[derive(Clone)]
pub struct AdmissionEngine {
    catalogue: Arc<RuleCatalogue>,
    coverage: CoverageTracker,
    metrics_enabled: bool,
}

impl AdmissionEngine {
    pub fn new(catalogue: Arc<RuleCatalogue>) -> Self {
        Self {
            catalogue,
            coverage: CoverageTracker::new(),
            metrics_enabled: true,
        }
    }

    pub fn from_config(config: &BundlerConfig) -> Result<Self> {
        config.validate()?;
        let catalogue = Arc::new(RuleCatalogue::bootstrap(&config.rules));
        Ok(Self {
            metrics_enabled: config.metrics_enabled,
            ..Self::new(catalogue)
        })
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    pub fn catalogue(&self) -> &RuleCatalogue {
        &self.catalogue
    }

    pub fn coverage(&self) -> &CoverageTracker {
        &self.coverage
    }

    /// Coverage of every rule the catalogue holds
    pub fn coverage_report(&self) -> CoverageReport {
        self.coverage.report(&self.catalogue.identifiers())
    }

    /// Evaluate `rules` in order against `ctx`, stopping at the first rule that
    /// does not hold.
    ///
    /// # Panics
    /// If a rule is missing from the catalogue, or a rule's required context
    /// field is absent.
    pub fn evaluate(&self, ctx: &RuleContext<'_>, rules: &[RuleIdentifier]) -> Admission {
        let start = Instant::now();
        let mut traces = Vec::with_capacity(rules.len());
        let mut rejected_by = None;

        for &identifier in rules {
            let rule = self.catalogue.get(identifier);
            let admitted = rule.evaluate(ctx);
            self.coverage.record(identifier, admitted);
            traces.push(EvaluationTrace {
                rule: identifier,
                rule_name: rule.name().to_string(),
                admitted,
            });
            if !admitted {
                rejected_by = Some(identifier);
                break;
            }
        }

        if self.metrics_enabled {
            RULE_METRICS.record_admission(
                traces.len(),
                rejected_by,
                start.elapsed().as_secs_f64(),
            );
        }

        match rejected_by {
            Some(rule) => debug!("{:?} rejected by {}", ctx, rule),
            None => debug!("{:?} admitted after {} rules", ctx, traces.len()),
        }

        Admission {
            admitted: rejected_by.is_none(),
            rejected_by,
            traces,
        }
    }

    pub fn admits(&self, ctx: &RuleContext<'_>, rules: &[RuleIdentifier]) -> bool {
        self.evaluate(ctx, rules).admitted
    }

    /// Evaluate every rule in `rules` without stopping, for diagnostics.
    /// Does not touch coverage or metrics.
    pub fn explain(&self, ctx: &RuleContext<'_>, rules: &[RuleIdentifier]) -> Vec<EvaluationTrace> {
        rules
            .iter()
            .map(|&identifier| {
                let rule = self.catalogue.get(identifier);
                EvaluationTrace {
                    rule: identifier,
                    rule_name: rule.name().to_string(),
                    admitted: rule.evaluate(ctx),
                }
            })
            .collect()
    }
}

impl Default for AdmissionEngine {
    fn default() -> Self {
        Self::new(Arc::new(RuleCatalogue::bootstrap(&RuleBounds::default())))
    }
}
