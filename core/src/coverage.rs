//! Rule coverage tracking
//!
//! Records which rules were evaluated, and how they decided, so tests and
//! bundling runs can report rules nothing ever exercised.

use crate::rule::RuleIdentifier;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Accept / reject tallies for one rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleTally {
    pub accepted: u64,
    pub rejected: u64,
}

impl RuleTally {
    pub fn evaluations(&self) -> u64 {
        self.accepted + self.rejected
    }
}

/// Cloneable handle to shared coverage counters
#[derive(Clone, Default)]
pub struct CoverageTracker {
    tallies: Arc<Mutex<BTreeMap<RuleIdentifier, RuleTally>>>,
}

impl CoverageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<RuleIdentifier, RuleTally>> {
        // Counters stay consistent even if a panicking rule poisoned the lock
        self.tallies.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, rule: RuleIdentifier, admitted: bool) {
        let mut tallies = self.lock();
        let tally = tallies.entry(rule).or_default();
        if admitted {
            tally.accepted += 1;
        } else {
            tally.rejected += 1;
        }
    }

    pub fn tally(&self, rule: RuleIdentifier) -> RuleTally {
        self.lock().get(&rule).copied().unwrap_or_default()
    }

    pub fn reset(&self) {
        self.lock().clear();
    }

    /// Coverage of `all_rules` by what has been recorded so far
    pub fn report(&self, all_rules: &[RuleIdentifier]) -> CoverageReport {
        let tallies = self.lock();
        let mut covered = 0;
        let mut uncovered = Vec::new();

        for rule in all_rules {
            if tallies.contains_key(rule) {
                covered += 1;
            } else {
                uncovered.push(*rule);
            }
        }

        CoverageReport {
            total: all_rules.len(),
            covered,
            uncovered,
            coverage_percentage: if all_rules.is_empty() {
                0.0
            } else {
                (covered as f64 / all_rules.len() as f64) * 100.0
            },
            tallies: tallies.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoverageReport {
    pub total: usize,
    pub covered: usize,
    pub uncovered: Vec<RuleIdentifier>,
    pub coverage_percentage: f64,
    pub tallies: BTreeMap<RuleIdentifier, RuleTally>,
}

impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rule coverage report")?;
        writeln!(f, "{}", "=".repeat(50))?;
        writeln!(f, "Total rules: {}", self.total)?;
        writeln!(f, "Covered: {} ({:.1}%)", self.covered, self.coverage_percentage)?;
        writeln!(f, "Uncovered: {}", self.uncovered.len())?;

        if !self.uncovered.is_empty() {
            writeln!(f, "\nUncovered rules:")?;
            for rule in &self.uncovered {
                writeln!(f, "  - {}", rule)?;
            }
        }

        writeln!(f, "\nEvaluations:")?;
        for (rule, tally) in &self.tallies {
            writeln!(
                f,
                "  {}: {} accepted, {} rejected",
                rule, tally.accepted, tally.rejected
            )?;
        }
        Ok(())
    }
}
