use bundle_rules_core::RuleIdentifier;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

// Rule checks run in microseconds, so the buckets sit far below the usual
// Prometheus defaults
const DURATION_BUCKETS: [f64; 10] = [
    0.000_001, 0.000_005, 0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.1,
];

#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<(f64, AtomicU64)>, // (upper_bound, count)
    overflow: AtomicU64,
    // f64 bit pattern of the running total
    sum_bits: AtomicU64,
}

impl Histogram {
    fn new() -> Self {
        Self {
            buckets: DURATION_BUCKETS
                .iter()
                .map(|b| (*b, AtomicU64::new(0)))
                .collect(),
            overflow: AtomicU64::new(0),
            sum_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub fn record(&self, value: f64) {
        // the closure always returns Some, so the update cannot fail
        let _ = self
            .sum_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });

        for (bound, count) in &self.buckets {
            if value <= *bound {
                count.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        self.overflow.fetch_add(1, Ordering::Relaxed);
    }

    /// Cumulative `(upper_bound, count)` pairs, without the `+Inf` bucket
    pub fn snapshot(&self) -> Vec<(f64, u64)> {
        let mut running = 0;
        self.buckets
            .iter()
            .map(|(bound, count)| {
                running += count.load(Ordering::Relaxed);
                (*bound, running)
            })
            .collect()
    }

    pub fn count(&self) -> u64 {
        self.buckets
            .iter()
            .map(|(_, c)| c.load(Ordering::Relaxed))
            .sum::<u64>()
            + self.overflow.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> f64 {
        f64::from_bits(self.sum_bits.load(Ordering::Relaxed))
    }

    fn to_prometheus(&self, name: &str) -> String {
        let mut output = format!("# HELP {}_seconds Duration histogram.\n", name);
        output.push_str(&format!("# TYPE {}_seconds histogram\n", name));
        for (bound, count) in self.snapshot() {
            output.push_str(&format!(
                "{}_seconds_bucket{{le=\"{}\"}} {}\n",
                name, bound, count
            ));
        }
        output.push_str(&format!(
            "{}_seconds_bucket{{le=\"+Inf\"}} {}\n",
            name,
            self.count()
        ));
        output.push_str(&format!("{}_seconds_sum {}\n", name, self.sum()));
        output.push_str(&format!("{}_seconds_count {}\n", name, self.count()));
        output
    }
}

/// Process-wide admission counters
pub struct RuleMetrics {
    pub admission_checks: AtomicU64,
    pub admitted_total: AtomicU64,
    pub rejected_total: AtomicU64,
    pub rule_evaluations: AtomicU64,
    pub rejections_by_rule: Mutex<HashMap<RuleIdentifier, AtomicU64>>,
    pub admission_duration: Histogram,
}

impl RuleMetrics {
    pub fn new() -> Self {
        Self {
            admission_checks: AtomicU64::new(0),
            admitted_total: AtomicU64::new(0),
            rejected_total: AtomicU64::new(0),
            rule_evaluations: AtomicU64::new(0),
            rejections_by_rule: Mutex::new(HashMap::new()),
            admission_duration: Histogram::new(),
        }
    }

    fn rejections(&self) -> MutexGuard<'_, HashMap<RuleIdentifier, AtomicU64>> {
        self.rejections_by_rule
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// One finished admission check. `rejected_by` is `None` when every rule held.
    pub fn record_admission(
        &self,
        evaluated: usize,
        rejected_by: Option<RuleIdentifier>,
        duration_secs: f64,
    ) {
        self.admission_checks.fetch_add(1, Ordering::Relaxed);
        self.rule_evaluations
            .fetch_add(evaluated as u64, Ordering::Relaxed);
        self.admission_duration.record(duration_secs);

        match rejected_by {
            None => {
                self.admitted_total.fetch_add(1, Ordering::Relaxed);
            }
            Some(rule) => {
                self.rejected_total.fetch_add(1, Ordering::Relaxed);
                self.rejections()
                    .entry(rule)
                    .or_insert_with(|| AtomicU64::new(0))
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn rejections_for(&self, rule: RuleIdentifier) -> u64 {
        self.rejections()
            .get(&rule)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let rejections_by_rule = self
            .rejections()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.load(Ordering::Relaxed)))
            .collect();

        MetricsSnapshot {
            admission_checks: self.admission_checks.load(Ordering::Relaxed),
            admitted_total: self.admitted_total.load(Ordering::Relaxed),
            rejected_total: self.rejected_total.load(Ordering::Relaxed),
            rule_evaluations: self.rule_evaluations.load(Ordering::Relaxed),
            rejections_by_rule,
        }
    }

    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut output = format!(
            "# HELP bundle_rules_admission_checks_total Total number of admission checks.\n\
             # TYPE bundle_rules_admission_checks_total counter\n\
             bundle_rules_admission_checks_total {}\n\
             # HELP bundle_rules_admitted_total Admission checks where every rule held.\n\
             # TYPE bundle_rules_admitted_total counter\n\
             bundle_rules_admitted_total {}\n\
             # HELP bundle_rules_rejected_total Admission checks stopped by a rule.\n\
             # TYPE bundle_rules_rejected_total counter\n\
             bundle_rules_rejected_total {}\n\
             # HELP bundle_rules_rule_evaluations_total Total top-level rule evaluations.\n\
             # TYPE bundle_rules_rule_evaluations_total counter\n\
             bundle_rules_rule_evaluations_total {}\n",
            snapshot.admission_checks,
            snapshot.admitted_total,
            snapshot.rejected_total,
            snapshot.rule_evaluations,
        );

        output.push_str("# HELP bundle_rules_rejections_total Rejections per rule.\n");
        output.push_str("# TYPE bundle_rules_rejections_total counter\n");
        let mut per_rule: Vec<_> = snapshot.rejections_by_rule.iter().collect();
        per_rule.sort();
        for (rule, count) in per_rule {
            output.push_str(&format!(
                "bundle_rules_rejections_total{{rule=\"{}\"}} {}\n",
                rule, count
            ));
        }

        output.push_str(
            &self
                .admission_duration
                .to_prometheus("bundle_rules_admission_duration"),
        );
        output
    }
}

impl Default for RuleMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub admission_checks: u64,
    pub admitted_total: u64,
    pub rejected_total: u64,
    pub rule_evaluations: u64,
    pub rejections_by_rule: HashMap<String, u64>,
}

lazy_static::lazy_static! {
    pub static ref RULE_METRICS: RuleMetrics = RuleMetrics::new();
}
