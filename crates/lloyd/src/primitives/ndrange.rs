//! Work-group execution model.
//!
//! ## Purpose
//!
//! This module emulates the data-parallel dispatch model the kernels are
//! written against: a grid of independent work-groups, each made of work
//! items that synchronize only through group barriers.
//!
//! ## Design notes
//!
//! * **Phases**: A kernel body runs every local item of a phase before the
//!   next phase starts. A call to [`WorkGroup::barrier`] marks the boundary,
//!   so barrier semantics hold exactly.
//! * **Groups**: Independent groups are distributed across host threads with
//!   rayon (feature `cpu`), or run in order when parallelism is disabled.
//! * **Outputs**: Each group receives a disjoint chunk of the output, so no
//!   group can observe another group's writes during a launch.
//!
//! ## Key concepts
//!
//! * **NdRange**: Global item count rounded up to a whole number of groups.
//! * **Privatized launch**: Groups sharing a private replica (`group_id mod K`)
//!   run sequentially on that replica; replicas run in parallel.
//!
//! ## Invariants
//!
//! * `work_group_size >= 1`.
//! * Cross-group ordering exists only between launches.

// Feature-gated imports
#[cfg(feature = "cpu")]
use rayon::prelude::*;

// External dependencies
use core::ops::Range;

// ============================================================================
// NdRange
// ============================================================================

/// Global and local dispatch sizes of one kernel launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdRange {
    /// Total number of work items (a multiple of `work_group_size`).
    pub global_size: usize,

    /// Number of work items per group.
    pub work_group_size: usize,
}

impl NdRange {
    /// Dispatch enough groups of `work_group_size` items to cover `n_items`.
    pub fn new(n_items: usize, work_group_size: usize) -> Self {
        let work_group_size = work_group_size.max(1);
        let n_groups = n_items.div_ceil(work_group_size).max(1);
        Self {
            global_size: n_groups * work_group_size,
            work_group_size,
        }
    }

    /// Number of work-groups in the grid.
    pub fn n_groups(&self) -> usize {
        self.global_size / self.work_group_size
    }
}

// ============================================================================
// WorkGroup
// ============================================================================

/// Execution context of one work-group.
#[derive(Debug, Clone)]
pub struct WorkGroup {
    group_id: usize,
    size: usize,
    barriers: usize,
}

impl WorkGroup {
    /// Create the context of group `group_id`.
    pub fn new(group_id: usize, size: usize) -> Self {
        Self {
            group_id,
            size,
            barriers: 0,
        }
    }

    /// Index of this group in the grid.
    #[inline]
    pub fn group_id(&self) -> usize {
        self.group_id
    }

    /// Number of work items in this group.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Local ids of the group's work items.
    #[inline]
    pub fn local_ids(&self) -> Range<usize> {
        0..self.size
    }

    /// Global id of the first item of this group.
    #[inline]
    pub fn first_global_id(&self) -> usize {
        self.group_id * self.size
    }

    /// Global id of local item `local_id`.
    #[inline]
    pub fn global_id(&self, local_id: usize) -> usize {
        self.first_global_id() + local_id
    }

    /// Group-wide barrier: ends the current phase.
    #[inline]
    pub fn barrier(&mut self) {
        self.barriers += 1;
    }

    /// Number of barriers crossed so far.
    pub fn barriers(&self) -> usize {
        self.barriers
    }
}

// ============================================================================
// Launch Helpers
// ============================================================================

/// Launch a kernel whose groups each own `per_group` consecutive outputs.
///
/// Returns the total number of barriers crossed by all groups.
pub fn launch<O, F>(
    range: &NdRange,
    out: &mut [O],
    per_group: usize,
    parallel: bool,
    kernel: F,
) -> usize
where
    O: Send,
    F: Fn(&mut WorkGroup, &mut [O]) + Sync + Send,
{
    let per_group = per_group.max(1);
    let size = range.work_group_size;

    #[cfg(feature = "cpu")]
    if parallel {
        return out
            .par_chunks_mut(per_group)
            .enumerate()
            .map(|(group_id, chunk)| run_group(group_id, size, chunk, &kernel))
            .sum();
    }
    #[cfg(not(feature = "cpu"))]
    let _ = parallel;

    out.chunks_mut(per_group)
        .enumerate()
        .map(|(group_id, chunk)| run_group(group_id, size, chunk, &kernel))
        .sum()
}

/// Launch a kernel that only reads shared inputs and writes through atomics.
pub fn launch_groups<F>(range: &NdRange, parallel: bool, kernel: F) -> usize
where
    F: Fn(&mut WorkGroup) + Sync + Send,
{
    let size = range.work_group_size;
    let body = |group_id: usize| {
        let mut group = WorkGroup::new(group_id, size);
        kernel(&mut group);
        group.barriers()
    };

    #[cfg(feature = "cpu")]
    if parallel {
        return (0..range.n_groups()).into_par_iter().map(body).sum();
    }
    #[cfg(not(feature = "cpu"))]
    let _ = parallel;

    (0..range.n_groups()).map(body).sum()
}

/// Launch a kernel whose groups accumulate into private replicas.
///
/// Group `g` writes its `per_group` outputs and mutates replica `g % K`, where
/// `K = replicas.len()`. Groups mapped to the same replica run one after the
/// other, so every replica has exactly one writer at any instant.
pub fn launch_privatized<O, P, F>(
    range: &NdRange,
    out: &mut [O],
    per_group: usize,
    replicas: Vec<P>,
    parallel: bool,
    kernel: F,
) -> usize
where
    O: Send,
    P: Send,
    F: Fn(&mut WorkGroup, &mut [O], &mut P) + Sync + Send,
{
    let per_group = per_group.max(1);
    let n_replicas = replicas.len();
    if n_replicas == 0 {
        return 0;
    }
    let size = range.work_group_size;

    let mut buckets: Vec<Vec<(usize, &mut [O])>> = (0..n_replicas).map(|_| Vec::new()).collect();
    for (group_id, chunk) in out.chunks_mut(per_group).enumerate() {
        buckets[group_id % n_replicas].push((group_id, chunk));
    }

    #[cfg(feature = "cpu")]
    if parallel {
        return replicas
            .into_par_iter()
            .zip(buckets.into_par_iter())
            .map(|(mut replica, bucket)| run_replica(size, &mut replica, bucket, &kernel))
            .sum();
    }
    #[cfg(not(feature = "cpu"))]
    let _ = parallel;

    replicas
        .into_iter()
        .zip(buckets)
        .map(|(mut replica, bucket)| run_replica(size, &mut replica, bucket, &kernel))
        .sum()
}

fn run_group<O, F>(group_id: usize, size: usize, chunk: &mut [O], kernel: &F) -> usize
where
    F: Fn(&mut WorkGroup, &mut [O]),
{
    let mut group = WorkGroup::new(group_id, size);
    kernel(&mut group, chunk);
    group.barriers()
}

fn run_replica<O, P, F>(
    size: usize,
    replica: &mut P,
    bucket: Vec<(usize, &mut [O])>,
    kernel: &F,
) -> usize
where
    F: Fn(&mut WorkGroup, &mut [O], &mut P),
{
    let mut barriers = 0;
    for (group_id, chunk) in bucket {
        let mut group = WorkGroup::new(group_id, size);
        kernel(&mut group, chunk, replica);
        barriers += group.barriers();
    }
    barriers
}
