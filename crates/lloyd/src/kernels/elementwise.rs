//! Elementwise kernels.
//!
//! ## Purpose
//!
//! Small one-item-per-element kernels that glue the main kernels together:
//! zero initialisation, centroid half norms, broadcast division of sums by
//! counts, per-cluster centroid shifts and per-sample distances to the
//! assigned centroid (the inertia kernel).
//!
//! ## Invariants
//!
//! * Each work item writes exactly one output element.

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::math::distance::{half_squared_norm, squared_euclidean};
use crate::primitives::matrix::FeatureMajor;
use crate::primitives::ndrange::{NdRange, launch};

/// Set every element of `out` to `value`.
pub fn fill<T: Copy + Send + Sync>(
    out: &mut [T],
    value: T,
    work_group_size: usize,
    parallel: bool,
) {
    let range = NdRange::new(out.len(), work_group_size);
    launch(&range, out, work_group_size, parallel, |_, chunk| {
        chunk.fill(value);
    });
}

/// `out[c] = ½‖centroids[:, c]‖²` for every centroid.
pub fn half_squared_norms<T: Float + Send + Sync>(
    centroids: &FeatureMajor<T>,
    out: &mut [T],
    work_group_size: usize,
    parallel: bool,
) {
    let range = NdRange::new(centroids.n_items(), work_group_size);
    launch(&range, out, work_group_size, parallel, |group, chunk| {
        for (local_id, norm) in chunk.iter_mut().enumerate() {
            let cluster = group.global_id(local_id);
            *norm =
                half_squared_norm((0..centroids.n_features()).map(|f| centroids.get(f, cluster)));
        }
    });
}

/// Divide every column of `sums` by its cluster count.
///
/// Clusters whose count is not positive take their column from `previous`.
pub fn broadcast_divide<T: Float + Send + Sync>(
    sums: &mut FeatureMajor<T>,
    counts: &[T],
    previous: &FeatureMajor<T>,
    work_group_size: usize,
    parallel: bool,
) {
    let n_clusters = sums.n_items();
    let previous = previous.as_slice();
    let range = NdRange::new(sums.as_slice().len(), work_group_size);
    launch(&range, sums.as_mut_slice(), work_group_size, parallel, |group, chunk| {
        for (local_id, value) in chunk.iter_mut().enumerate() {
            let idx = group.global_id(local_id);
            let count = counts[idx % n_clusters];
            *value = if count > T::zero() {
                *value / count
            } else {
                previous[idx]
            };
        }
    });
}

/// `out[c] = ‖new[:, c] − old[:, c]‖²` for every centroid.
pub fn centroid_shifts<T: Float + Send + Sync>(
    old: &FeatureMajor<T>,
    new: &FeatureMajor<T>,
    out: &mut [T],
    work_group_size: usize,
    parallel: bool,
) {
    let range = NdRange::new(old.n_items(), work_group_size);
    launch(&range, out, work_group_size, parallel, |group, chunk| {
        for (local_id, shift) in chunk.iter_mut().enumerate() {
            let cluster = group.global_id(local_id);
            *shift = squared_euclidean(
                (0..old.n_features()).map(|f| new.get(f, cluster)),
                (0..old.n_features()).map(|f| old.get(f, cluster)),
            );
        }
    });
}

/// `out[i] = w[i] · ‖x[:, i] − centroids[:, labels[i]]‖²`.
///
/// With `weights == None` every weight is one (relocation distances).
pub fn distances_to_assigned<T: Float + Send + Sync>(
    x: &FeatureMajor<T>,
    centroids: &FeatureMajor<T>,
    labels: &[usize],
    weights: Option<&[T]>,
    out: &mut [T],
    work_group_size: usize,
    parallel: bool,
) {
    let range = NdRange::new(x.n_items(), work_group_size);
    launch(&range, out, work_group_size, parallel, |group, chunk| {
        for (local_id, distance) in chunk.iter_mut().enumerate() {
            let sample = group.global_id(local_id);
            let cluster = labels[sample];
            let squared = squared_euclidean(
                (0..x.n_features()).map(|f| x.get(f, sample)),
                (0..x.n_features()).map(|f| centroids.get(f, cluster)),
            );
            *distance = match weights {
                Some(w) => w[sample] * squared,
                None => squared,
            };
        }
    });
}
