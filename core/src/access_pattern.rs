//! Node access patterns
//!
//! An access pattern maps a node's logical index space onto regions of each of
//! its operands. Slicing a bundle walks the index space, so operands whose
//! mapping overlaps, starts at an offset, or leaves index-space elements
//! unmapped (padding) cannot be tiled safely.

use crate::graph::{TensorId, TensorInfo};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Mapping of one operand into the node index space. All vectors have one
/// entry per tensor dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperandAccess {
    /// Index-space dimension each tensor dimension is driven by
    pub index_space_dims: Vec<usize>,
    /// Tensor elements covered by one index-space element
    pub granularity: Vec<u64>,
    #[serde(default)]
    pub offset: Vec<i64>,
    #[serde(default)]
    pub overlap: Vec<u64>,
}

impl OperandAccess {
    /// One-to-one mapping of tensor dim `d` onto index-space dim `d`
    pub fn identity(rank: usize) -> Self {
        Self {
            index_space_dims: (0..rank).collect(),
            granularity: vec![1; rank],
            offset: vec![0; rank],
            overlap: vec![0; rank],
        }
    }

    fn index_space_dim(&self, dim: usize, tensor: &str) -> usize {
        *self.index_space_dims.get(dim).unwrap_or_else(|| {
            panic!("tensor '{}' dim {} has no index-space mapping", tensor, dim)
        })
    }

    fn granularity_at(&self, dim: usize, tensor: &str) -> u64 {
        *self.granularity.get(dim).unwrap_or_else(|| {
            panic!("tensor '{}' dim {} has no granularity", tensor, dim)
        })
    }

    fn offset_at(&self, dim: usize) -> i64 {
        self.offset.get(dim).copied().unwrap_or(0)
    }

    fn overlap_at(&self, dim: usize) -> u64 {
        self.overlap.get(dim).copied().unwrap_or(0)
    }
}

/// Why an operand cannot be tiled along the index space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TilingHazard {
    Overlap { dim: usize, overlap: u64 },
    Offset { dim: usize, offset: i64 },
    /// Some index-space elements map to no tensor element
    Padding { dim: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPattern {
    /// Extent of each index-space dimension
    pub resolution: Vec<u64>,
    pub operands: HashMap<TensorId, OperandAccess>,
}

impl AccessPattern {
    pub fn new(resolution: Vec<u64>) -> Self {
        Self {
            resolution,
            operands: HashMap::new(),
        }
    }

    pub fn with_operand(mut self, tensor: TensorId, access: OperandAccess) -> Self {
        self.operands.insert(tensor, access);
        self
    }

    pub fn has_operand(&self, tensor: TensorId) -> bool {
        self.operands.contains_key(&tensor)
    }

    pub fn operand(&self, tensor: TensorId) -> Option<&OperandAccess> {
        self.operands.get(&tensor)
    }

    /// First hazard found while mapping the full `tensor` onto the index space.
    ///
    /// # Panics
    /// If the tensor is not mapped by this access pattern, a tensor dimension
    /// has no index-space mapping or granularity, or a mapped index-space
    /// dimension lies outside the resolution.
    pub fn tiling_hazard(&self, tensor: TensorId, info: &TensorInfo) -> Option<TilingHazard> {
        let access = self.operands.get(&tensor).unwrap_or_else(|| {
            panic!("tensor '{}' is not mapped by the node access pattern", info.name)
        });

        for (dim, &size) in info.sizes.iter().enumerate() {
            let is_dim = access.index_space_dim(dim, &info.name);
            let dim_resolution = *self.resolution.get(is_dim).unwrap_or_else(|| {
                panic!(
                    "tensor '{}' dim {} maps to index-space dim {} outside resolution {:?}",
                    info.name, dim, is_dim, self.resolution
                )
            });

            let overlap = access.overlap_at(dim);
            if overlap != 0 && dim_resolution > 1 {
                return Some(TilingHazard::Overlap { dim, overlap });
            }

            let offset = access.offset_at(dim);
            if offset != 0 {
                return Some(TilingHazard::Offset { dim, offset });
            }

            // Number of index-space elements the whole tensor dim spans
            let granularity = access.granularity_at(dim, &info.name).max(1);
            let node_tile = size.div_ceil(granularity);
            if node_tile != dim_resolution {
                return Some(TilingHazard::Padding { dim });
            }
        }
        None
    }
}
