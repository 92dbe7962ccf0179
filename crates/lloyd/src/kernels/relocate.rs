//! Empty-cluster relocation.
//!
//! ## Purpose
//!
//! When some clusters received no sample, each of them is reseated on one of
//! the samples farthest from their assigned centroid. The sums and counts of
//! the update are patched so that the following division yields the new
//! centroid directly.
//!
//! ## Design notes
//!
//! * **Threshold selection**: With `E` empty clusters, the `E`-th largest
//!   distance is the threshold. All samples strictly above it are selected,
//!   then samples equal to it in scan order until exactly `E` are taken.
//! * **Deterministic placement**: A first launch counts, per group, the
//!   samples above and at the threshold. Exclusive scans of those counts give
//!   every group its write offsets, so the selection order does not depend
//!   on scheduling.
//!
//! * **Eligibility**: A sample may only move when it has a positive weight
//!   and its current cluster keeps a positive count without it. Ineligible
//!   samples are masked below every real distance before selection. When
//!   several picks drain the same donor, the surplus picks are dropped and
//!   the remaining empty clusters go through another selection round.
//!
//! ## Invariants
//!
//! * Exactly `E` distinct samples are selected when `E <= n_samples`.
//! * The `i`-th empty cluster is paired with the `i`-th applied sample.
//! * Every count is positive after relocation whenever at least `n_clusters`
//!   samples carry a positive weight.
//! * Distances are exact and unweighted.

// External dependencies
use core::cmp::Ordering;
use core::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use log::debug;
use num_traits::Float;

// Internal dependencies
use crate::kernels::elementwise::distances_to_assigned;
use crate::primitives::matrix::FeatureMajor;
use crate::primitives::ndrange::{NdRange, launch, launch_groups};

// ============================================================================
// Selection
// ============================================================================

/// Value of the `k`-th largest element of `values` (`1 <= k <= len`).
pub fn kth_largest<T: Float>(values: &[T], k: usize) -> T {
    let mut scratch = values.to_vec();
    let pivot = scratch.len() - k;
    let (_, value, _) =
        scratch.select_nth_unstable_by(pivot, |a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    *value
}

/// Indices of the `n_selected` largest `distances`, ties broken by index.
///
/// Samples strictly above the threshold come first, then samples equal to
/// it; each part is in increasing sample order.
pub fn select_farthest<T: Float + Send + Sync>(
    distances: &[T],
    n_selected: usize,
    work_group_size: usize,
    parallel: bool,
) -> Vec<usize> {
    let n_samples = distances.len();
    let n_selected = n_selected.min(n_samples);
    if n_selected == 0 {
        return Vec::new();
    }

    let threshold = kth_largest(distances, n_selected);
    let range = NdRange::new(n_samples, work_group_size);
    let group_span = |group_id: usize| {
        let start = (group_id * work_group_size).min(n_samples);
        start..(start + work_group_size).min(n_samples)
    };

    // Pass 1: per-group counts above and at the threshold.
    let mut group_counts = vec![(0usize, 0usize); range.n_groups()];
    launch(&range, &mut group_counts, 1, parallel, |group, out| {
        out[0] = distances[group_span(group.group_id())]
            .iter()
            .fold((0, 0), |(gt, eq), &d| {
                if d > threshold {
                    (gt + 1, eq)
                } else if d == threshold {
                    (gt, eq + 1)
                } else {
                    (gt, eq)
                }
            });
    });

    let mut greater_offsets = Vec::with_capacity(group_counts.len());
    let mut equal_offsets = Vec::with_capacity(group_counts.len());
    let (mut n_greater, mut n_equal) = (0, 0);
    for &(gt, eq) in &group_counts {
        greater_offsets.push(n_greater);
        equal_offsets.push(n_equal);
        n_greater += gt;
        n_equal += eq;
    }

    // Pass 2: write each selected sample at its scanned position.
    let selected: Vec<AtomicUsize> = (0..n_selected).map(|_| AtomicUsize::new(0)).collect();
    launch_groups(&range, parallel, |group| {
        let group_id = group.group_id();
        let (mut gt_rank, mut eq_rank) = (0, 0);
        for sample in group_span(group_id) {
            let d = distances[sample];
            if d > threshold {
                let pos = greater_offsets[group_id] + gt_rank;
                selected[pos].store(sample, AtomicOrdering::Relaxed);
                gt_rank += 1;
            } else if d == threshold {
                let pos = n_greater + equal_offsets[group_id] + eq_rank;
                if pos < n_selected {
                    selected[pos].store(sample, AtomicOrdering::Relaxed);
                }
                eq_rank += 1;
            }
        }
    });

    selected
        .into_iter()
        .map(AtomicUsize::into_inner)
        .collect()
}

// ============================================================================
// Relocation
// ============================================================================

/// Inputs of one relocation.
#[derive(Debug)]
pub struct RelocationInput<'a, T> {
    /// Samples, `n_features × n_samples`.
    pub x: &'a FeatureMajor<T>,

    /// Sample weights.
    pub weights: &'a [T],

    /// Centroids the assignments were computed against.
    pub centroids: &'a FeatureMajor<T>,

    /// Empty clusters, in list order.
    pub empty_clusters: &'a [usize],
}

/// Mask samples that cannot move below every real distance.
///
/// A sample is eligible when its weight is positive and its cluster keeps a
/// positive count without it.
fn mask_ineligible<T: Float + Send + Sync>(
    weights: &[T],
    assignments: &[usize],
    counts: &[T],
    distances: &mut [T],
    work_group_size: usize,
    parallel: bool,
) {
    let range = NdRange::new(distances.len(), work_group_size);
    launch(&range, distances, work_group_size, parallel, |group, chunk| {
        for (local_id, distance) in chunk.iter_mut().enumerate() {
            let sample = group.global_id(local_id);
            let weight = weights[sample];
            if weight <= T::zero() || counts[assignments[sample]] - weight <= T::zero() {
                *distance = -T::one();
            }
        }
    });
}

/// Reseat every empty cluster on a far sample.
///
/// Patches `sums` (reduced, not yet divided), `counts` and `assignments`, and
/// returns the `(cluster, sample)` pairs. `distances` is per-sample scratch.
/// Clusters stay empty only when no eligible sample is left.
pub fn relocate_empty_clusters<T: Float + Send + Sync>(
    input: &RelocationInput<'_, T>,
    assignments: &mut [usize],
    sums: &mut FeatureMajor<T>,
    counts: &mut [T],
    distances: &mut [T],
    work_group_size: usize,
    parallel: bool,
) -> Vec<(usize, usize)> {
    let x = input.x;
    distances_to_assigned(
        x,
        input.centroids,
        assignments,
        None,
        distances,
        work_group_size,
        parallel,
    );

    let mut moves = Vec::with_capacity(input.empty_clusters.len());
    let mut pending = input.empty_clusters.to_vec();
    while !pending.is_empty() {
        mask_ineligible(input.weights, assignments, counts, distances, work_group_size, parallel);
        let selected = select_farthest(distances, pending.len(), work_group_size, parallel);

        let mut next_cluster = 0;
        for &sample in &selected {
            let old_cluster = assignments[sample];
            let weight = input.weights[sample];
            // Earlier picks of this round may have drained the donor.
            if distances[sample] < T::zero() || counts[old_cluster] - weight <= T::zero() {
                continue;
            }
            let cluster = pending[next_cluster];
            next_cluster += 1;

            counts[old_cluster] = counts[old_cluster] - weight;
            counts[cluster] = weight;
            for feature in 0..x.n_features() {
                let contribution = weight * x.get(feature, sample);
                sums.set(feature, old_cluster, sums.get(feature, old_cluster) - contribution);
                sums.set(feature, cluster, contribution);
            }

            assignments[sample] = cluster;
            distances[sample] = -T::one();
            moves.push((cluster, sample));
        }

        if next_cluster == 0 {
            debug!("{} clusters left empty: no eligible samples", pending.len());
            break;
        }
        pending.drain(..next_cluster);
    }

    debug!("relocated {} empty clusters: {:?}", moves.len(), moves);
    moves
}
