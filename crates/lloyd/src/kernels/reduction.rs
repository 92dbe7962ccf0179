//! Power-of-two tree reduction.
//!
//! ## Purpose
//!
//! Reduces `N` scalars to their sum with repeated passes. In one pass, each
//! work item of a group adds two input elements into group-local memory,
//! then the group halves the active range until two values remain; their
//! sum is the group's partial result. Passes repeat on the partial results
//! until one value is left.
//!
//! ## Invariants
//!
//! * `work_group_size` is a power of two, at least 2.
//! * Inputs past `N` are read as zero, so any `N >= 1` is supported.

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::primitives::ndrange::{NdRange, WorkGroup, launch};

/// Sum reduction over power-of-two work-groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeReduction {
    work_group_size: usize,
}

impl TreeReduction {
    /// Reduction with groups of `work_group_size` items (at least 2).
    pub fn new(work_group_size: usize) -> Self {
        Self {
            work_group_size: work_group_size.max(2),
        }
    }

    /// Items per group.
    pub fn work_group_size(&self) -> usize {
        self.work_group_size
    }

    /// Number of passes needed for `n` inputs.
    pub fn n_passes(&self, n: usize) -> usize {
        let mut remaining = n;
        let mut passes = 0;
        while remaining > 1 {
            remaining = remaining.div_ceil(2 * self.work_group_size);
            passes += 1;
        }
        passes
    }

    /// Sum of `values` (zero when empty).
    pub fn sum<T: Float + Send + Sync>(&self, values: &[T], parallel: bool) -> T {
        match values.len() {
            0 => return T::zero(),
            1 => return values[0],
            _ => {}
        }

        let mut partials = self.pass(values, parallel);
        while partials.len() > 1 {
            partials = self.pass(&partials, parallel);
        }
        partials[0]
    }

    fn pass<T: Float + Send + Sync>(&self, values: &[T], parallel: bool) -> Vec<T> {
        let range = NdRange::new(values.len().div_ceil(2), self.work_group_size);
        let mut partials = vec![T::zero(); range.n_groups()];
        launch(&range, &mut partials, 1, parallel, |group, out| {
            out[0] = reduce_group(group, values);
        });
        partials
    }
}

fn reduce_group<T: Float>(group: &mut WorkGroup, values: &[T]) -> T {
    let size = group.size();
    let base = group.group_id() * 2 * size;
    let read = |idx: usize| values.get(idx).copied().unwrap_or_else(T::zero);

    let mut local: Vec<T> = group
        .local_ids()
        .map(|lid| read(base + lid) + read(base + lid + size))
        .collect();

    let mut active = size;
    while active > 2 {
        group.barrier();
        active /= 2;
        for lid in 0..active {
            local[lid] = local[lid] + local[lid + active];
        }
    }
    group.barrier();

    local[0] + local[1]
}
