//! Label-only assignment and pairwise distance kernels.
//!
//! ## Purpose
//!
//! This module holds the sliding-window sweep shared by every distance
//! kernel, and the two kernels that use it without updating centroids:
//! nearest-centroid labelling and the full sample-to-centroid squared
//! distance matrix.
//!
//! ## Design notes
//!
//! * **Sweep order**: Centroid windows outer, feature windows inner. A
//!   sample's accumulators only hold one centroid window at a time.
//! * **Operator**: Chosen by type parameter when the sweep is instantiated.
//!
//! ## Invariants
//!
//! * One group handles `work_group_size` consecutive samples.
//! * The last group may cover fewer real samples; the others never read
//!   past the sample count.

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::kernels::accumulate::accumulate_window;
use crate::kernels::nearest::NearestTracker;
use crate::kernels::tile::{CentroidWindow, WindowGeometry, load_half_norms};
use crate::math::distance::{AccumulateOp, Product, SquaredDiff};
use crate::primitives::matrix::FeatureMajor;
use crate::primitives::ndrange::{NdRange, WorkGroup, launch};

// ============================================================================
// Window Sweep
// ============================================================================

/// Slide every window of `centroids` past the group's `n_valid` samples.
///
/// After each centroid window, `fold` receives the window's first centroid,
/// its extent, the loaded half-norm window (zeros when `half_norms` is
/// `None`) and the `n_valid × window_n_centroids` accumulators.
#[allow(clippy::too_many_arguments)]
pub fn sweep_windows<T, Op, F>(
    group: &mut WorkGroup,
    geometry: &WindowGeometry,
    x: &FeatureMajor<T>,
    centroids: &FeatureMajor<T>,
    half_norms: Option<&[T]>,
    n_valid: usize,
    mut fold: F,
) where
    T: Float,
    Op: AccumulateOp<T>,
    F: FnMut(usize, usize, &[T], &[T]),
{
    let width = geometry.window_n_centroids;
    let first_sample = group.first_global_id();

    let mut window = CentroidWindow::new(geometry.window_n_features, width);
    let mut half_norm_window = vec![T::zero(); width];
    let mut acc = vec![T::zero(); n_valid * width];

    for cw in 0..geometry.n_centroid_windows() {
        let centroid_start = cw * width;
        let centroid_extent = geometry.centroid_extent(cw);

        acc.fill(T::zero());
        if let Some(half_norms) = half_norms {
            load_half_norms(group, half_norms, centroid_start, &mut half_norm_window);
        }

        for fw in 0..geometry.n_feature_windows() {
            let feature_start = fw * geometry.window_n_features;
            let feature_extent = geometry.feature_extent(fw);

            window.load(group, centroids, feature_start, centroid_start);
            group.barrier();

            for (local_id, sample_acc) in acc.chunks_exact_mut(width).enumerate() {
                accumulate_window::<T, Op>(
                    &window,
                    x,
                    first_sample + local_id,
                    feature_start,
                    feature_extent,
                    centroid_extent,
                    sample_acc,
                );
            }
            group.barrier();
        }

        fold(centroid_start, centroid_extent, &half_norm_window, &acc);
        group.barrier();
    }
}

/// Nearest centroid of each of the group's `n_valid` samples.
pub fn nearest_in_group<T: Float>(
    group: &mut WorkGroup,
    geometry: &WindowGeometry,
    x: &FeatureMajor<T>,
    centroids: &FeatureMajor<T>,
    half_norms: &[T],
    n_valid: usize,
) -> Vec<NearestTracker<T>> {
    let width = geometry.window_n_centroids;
    let mut trackers = vec![NearestTracker::new(); n_valid];

    sweep_windows::<T, Product, _>(
        group,
        geometry,
        x,
        centroids,
        Some(half_norms),
        n_valid,
        |centroid_start, extent, half_norm_window, dots| {
            for (tracker, sample_dots) in trackers.iter_mut().zip(dots.chunks_exact(width)) {
                tracker.fold_pseudo_distances(
                    &half_norm_window[..extent],
                    &sample_dots[..extent],
                    centroid_start,
                );
            }
        },
    );

    trackers
}

// ============================================================================
// Label Kernel
// ============================================================================

/// Nearest-centroid labelling without centroid update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelKernel {
    /// Window grid.
    pub geometry: WindowGeometry,

    /// Samples per work-group.
    pub work_group_size: usize,
}

impl LabelKernel {
    /// Write the nearest centroid of every sample into `labels`.
    ///
    /// Returns the number of barriers crossed.
    pub fn run<T: Float + Send + Sync>(
        &self,
        x: &FeatureMajor<T>,
        centroids: &FeatureMajor<T>,
        half_norms: &[T],
        labels: &mut [usize],
        parallel: bool,
    ) -> usize {
        let range = NdRange::new(x.n_items(), self.work_group_size);
        let geometry = &self.geometry;

        launch(&range, labels, self.work_group_size, parallel, |group, chunk| {
            let trackers = nearest_in_group(group, geometry, x, centroids, half_norms, chunk.len());
            for (label, tracker) in chunk.iter_mut().zip(trackers) {
                *label = tracker.index;
            }
        })
    }
}

// ============================================================================
// Pairwise Distance Kernel
// ============================================================================

/// Squared Euclidean distance from every sample to every centroid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairwiseDistanceKernel {
    /// Window grid.
    pub geometry: WindowGeometry,

    /// Samples per work-group.
    pub work_group_size: usize,
}

impl PairwiseDistanceKernel {
    /// Fill `out` (row-major, `n_samples × n_clusters`) with squared distances.
    pub fn run<T: Float + Send + Sync>(
        &self,
        x: &FeatureMajor<T>,
        centroids: &FeatureMajor<T>,
        out: &mut [T],
        parallel: bool,
    ) -> usize {
        let n_clusters = centroids.n_items();
        let width = self.geometry.window_n_centroids;
        let range = NdRange::new(x.n_items(), self.work_group_size);
        let geometry = &self.geometry;

        launch(
            &range,
            out,
            self.work_group_size * n_clusters,
            parallel,
            |group, rows| {
                let n_valid = rows.len() / n_clusters.max(1);
                sweep_windows::<T, SquaredDiff, _>(
                    group,
                    geometry,
                    x,
                    centroids,
                    None,
                    n_valid,
                    |centroid_start, extent, _, distances| {
                        for (row, sample_distances) in
                            rows.chunks_exact_mut(n_clusters).zip(distances.chunks_exact(width))
                        {
                            row[centroid_start..centroid_start + extent]
                                .copy_from_slice(&sample_distances[..extent]);
                        }
                    },
                );
            },
        )
    }
}
