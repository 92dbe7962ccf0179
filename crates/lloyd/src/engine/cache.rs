//! Kernel cache keyed by problem shape.
//!
//! ## Purpose
//!
//! Resolving a plan and instantiating the kernels for a shape is done once;
//! repeated fits on the same shape reuse the cached kernel set.
//!
//! ## Invariants
//!
//! * A shape maps to exactly one kernel set for the lifetime of the cache.
//! * A failed build leaves the cache unchanged.

// External dependencies
use log::debug;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

// Internal dependencies
use crate::engine::plan::{KernelPlan, ShapeKey};
use crate::kernels::assignment::{LabelKernel, PairwiseDistanceKernel};
use crate::kernels::fused::FusedLloydKernel;
use crate::kernels::reduction::TreeReduction;
use crate::primitives::errors::KMeansError;

// ============================================================================
// Kernel Set
// ============================================================================

/// Every kernel instantiated for one shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelSet {
    /// Plan the kernels were built from.
    pub plan: KernelPlan,

    /// Fused assignment+update kernel.
    pub fused: FusedLloydKernel,

    /// Labelling kernel.
    pub labels: LabelKernel,

    /// Pairwise distance kernel.
    pub pairwise: PairwiseDistanceKernel,

    /// Sum reduction.
    pub reduction: TreeReduction,
}

impl KernelSet {
    /// Instantiate the kernels of `plan` for `shape`.
    pub fn build(plan: KernelPlan, shape: &ShapeKey) -> Self {
        let geometry = plan.geometry(shape);
        let work_group_size = plan.work_group_size;
        Self {
            plan,
            fused: FusedLloydKernel {
                geometry,
                work_group_size,
                n_copies: plan.n_copies,
            },
            labels: LabelKernel {
                geometry,
                work_group_size,
            },
            pairwise: PairwiseDistanceKernel {
                geometry,
                work_group_size,
            },
            reduction: TreeReduction::new(work_group_size),
        }
    }
}

// ============================================================================
// Kernel Cache
// ============================================================================

/// Shape-keyed cache of kernel sets.
#[derive(Debug, Clone, Default)]
pub struct KernelCache {
    kernels: HashMap<ShapeKey, KernelSet>,
    misses: usize,
}

impl KernelCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached kernel set for `shape`, building it on a miss.
    pub fn get_or_build<F>(&mut self, shape: ShapeKey, build: F) -> Result<KernelSet, KMeansError>
    where
        F: FnOnce() -> Result<KernelSet, KMeansError>,
    {
        match self.kernels.entry(shape) {
            Entry::Occupied(entry) => Ok(*entry.get()),
            Entry::Vacant(entry) => {
                let set = build()?;
                self.misses += 1;
                debug!(
                    "kernel cache miss for {:?}; built {} private copies",
                    shape, set.plan.n_copies
                );
                Ok(*entry.insert(set))
            }
        }
    }

    /// Number of cached shapes.
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    /// Whether nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    /// Number of builds performed.
    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Drop every cached kernel set.
    pub fn clear(&mut self) {
        self.kernels.clear();
    }
}
