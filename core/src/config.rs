use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Bound parameters and feature switches the rule library closes over at
/// bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleBounds {
    /// Upper bound on `candidates` (+1 when a node is being evaluated)
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Upper bound on seed size, candidate included
    #[serde(default = "default_max_seed_nodes")]
    pub max_seed_nodes: usize,
    /// Exact number of TPC nodes expected among the candidates
    #[serde(default = "default_tpc_candidates")]
    pub tpc_candidates: usize,
    /// Upper bound on inputs shared by more than one MME node of the bundle
    #[serde(default = "default_max_shared_mme_operands")]
    pub max_shared_mme_operands: usize,
    /// Let convolutions seed multi-gemm bundles
    #[serde(default)]
    pub conv_bundling: bool,
    /// Highest operand rank a low-rank node may have
    #[serde(default = "default_max_low_rank")]
    pub max_low_rank: usize,
}

fn default_max_candidates() -> usize {
    7
}

fn default_max_seed_nodes() -> usize {
    3
}

fn default_tpc_candidates() -> usize {
    2
}

fn default_max_shared_mme_operands() -> usize {
    1
}

fn default_max_low_rank() -> usize {
    5
}

impl Default for RuleBounds {
    fn default() -> Self {
        Self {
            max_candidates: default_max_candidates(),
            max_seed_nodes: default_max_seed_nodes(),
            tpc_candidates: default_tpc_candidates(),
            max_shared_mme_operands: default_max_shared_mme_operands(),
            conv_bundling: false,
            max_low_rank: default_max_low_rank(),
        }
    }
}

impl RuleBounds {
    pub fn validate(&self) -> Result<()> {
        if self.max_seed_nodes == 0 {
            anyhow::bail!("max_seed_nodes must be at least 1, a seed always holds its candidate");
        }
        if self.tpc_candidates > self.max_candidates {
            anyhow::bail!(
                "tpc_candidates ({}) exceeds max_candidates ({})",
                self.tpc_candidates,
                self.max_candidates
            );
        }
        if self.max_low_rank == 0 {
            anyhow::bail!("max_low_rank must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let bounds = RuleBounds::default();
        assert_eq!(bounds.max_candidates, 7);
        assert_eq!(bounds.max_seed_nodes, 3);
        assert_eq!(bounds.tpc_candidates, 2);
        assert_eq!(bounds.max_shared_mme_operands, 1);
        assert!(!bounds.conv_bundling);
        assert_eq!(bounds.max_low_rank, 5);
        assert!(bounds.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
max_candidates: 4
conv_bundling: true
"#;
        let bounds: RuleBounds = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(bounds.max_candidates, 4);
        assert!(bounds.conv_bundling);
        assert_eq!(bounds.max_seed_nodes, 3);
        assert_eq!(bounds.tpc_candidates, 2);
    }

    #[test]
    fn test_validation_rejects_impossible_bounds() {
        let mut bounds = RuleBounds::default();
        bounds.max_seed_nodes = 0;
        assert!(bounds.validate().is_err());

        let mut bounds = RuleBounds::default();
        bounds.max_candidates = 1;
        let err = bounds.validate().unwrap_err();
        assert!(err.to_string().contains("exceeds max_candidates"));

        let mut bounds = RuleBounds::default();
        bounds.max_low_rank = 0;
        assert!(bounds.validate().is_err());
    }
}
