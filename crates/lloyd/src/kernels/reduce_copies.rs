//! Reduction of private centroid copies.
//!
//! ## Purpose
//!
//! Sums the `K` private sum matrices and count vectors element-wise into the
//! global statistics, and records every cluster whose reduced count is
//! exactly zero.
//!
//! ## Invariants
//!
//! * The empty-cluster counter must be reset before the launch.
//! * After the launch the recorded clusters are a duplicate-free list of
//!   every zero-count cluster, in unspecified order.

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::primitives::buffer::{EmptyClusters, PrivateCopies};
use crate::primitives::ndrange::{NdRange, launch};

/// Reduce `copies` into `sums` (`n_features × n_clusters`) and `counts`.
///
/// Returns the number of barriers crossed.
pub fn reduce_private_copies<T: Float + Send + Sync>(
    copies: &PrivateCopies<T>,
    sums: &mut [T],
    counts: &mut [T],
    empty: &EmptyClusters,
    work_group_size: usize,
    parallel: bool,
) -> usize {
    let n_copies = copies.n_copies();
    let matrix_len = copies.n_features() * copies.n_clusters();
    let n_clusters = copies.n_clusters();

    let range = NdRange::new(matrix_len, work_group_size);
    let mut barriers = launch(&range, sums, work_group_size, parallel, |group, chunk| {
        for (local_id, out) in chunk.iter_mut().enumerate() {
            let idx = group.global_id(local_id);
            *out = (0..n_copies).fold(T::zero(), |acc, k| acc + copies.sums[k * matrix_len + idx]);
        }
    });

    let range = NdRange::new(n_clusters, work_group_size);
    barriers += launch(&range, counts, work_group_size, parallel, |group, chunk| {
        for (local_id, out) in chunk.iter_mut().enumerate() {
            let cluster = group.global_id(local_id);
            let total = (0..n_copies)
                .fold(T::zero(), |acc, k| acc + copies.counts[k * n_clusters + cluster]);
            *out = total;
            if total == T::zero() {
                empty.push(cluster);
            }
        }
    });

    barriers
}
