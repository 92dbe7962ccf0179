//! Window geometry and cooperative centroid tile loader.
//!
//! ## Purpose
//!
//! Distances are computed one window of the centroid matrix at a time so that
//! shared memory holds at most `window_n_features × window_n_centroids`
//! values, whatever the problem size. This module computes the window grid
//! and loads one window into group-local memory.
//!
//! ## Design notes
//!
//! * **Runtime extents**: The last window along each axis may be shorter.
//!   Consumers loop over the true extent returned by the geometry.
//! * **Coalescing**: Cell `i` of the window is loaded by local item
//!   `i mod group size`; consecutive items read consecutive centroids of one
//!   feature row.
//! * **Padding**: Rows are stored with a stride of `width + 1`.
//!
//! ## Invariants
//!
//! * Cells outside the matrix are loaded as zero.
//! * Every cell is written by exactly one local item per load.

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::primitives::matrix::FeatureMajor;
use crate::primitives::ndrange::WorkGroup;

// ============================================================================
// Window Geometry
// ============================================================================

/// Sliding-window grid over a `n_features × n_clusters` centroid matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowGeometry {
    /// Window width (centroids per window).
    pub window_n_centroids: usize,

    /// Window height (features per window).
    pub window_n_features: usize,

    /// Number of features of the problem.
    pub n_features: usize,

    /// Number of clusters of the problem.
    pub n_clusters: usize,
}

impl WindowGeometry {
    /// Geometry for the given window and problem sizes.
    pub fn new(
        window_n_centroids: usize,
        window_n_features: usize,
        n_features: usize,
        n_clusters: usize,
    ) -> Self {
        Self {
            window_n_centroids: window_n_centroids.max(1),
            window_n_features: window_n_features.max(1),
            n_features,
            n_clusters,
        }
    }

    /// Number of windows along the centroid axis.
    #[inline]
    pub fn n_centroid_windows(&self) -> usize {
        self.n_clusters.div_ceil(self.window_n_centroids)
    }

    /// Number of windows along the feature axis.
    #[inline]
    pub fn n_feature_windows(&self) -> usize {
        self.n_features.div_ceil(self.window_n_features)
    }

    /// Number of real centroids in centroid window `window`.
    #[inline]
    pub fn centroid_extent(&self, window: usize) -> usize {
        if window + 1 == self.n_centroid_windows() {
            ((self.n_clusters - 1) % self.window_n_centroids) + 1
        } else {
            self.window_n_centroids
        }
    }

    /// Number of real features in feature window `window`.
    #[inline]
    pub fn feature_extent(&self, window: usize) -> usize {
        if window + 1 == self.n_feature_windows() {
            ((self.n_features - 1) % self.window_n_features) + 1
        } else {
            self.window_n_features
        }
    }

    /// Barriers crossed by one group during a full window sweep.
    pub fn barriers_per_sweep(&self) -> usize {
        self.n_centroid_windows() * (2 * self.n_feature_windows() + 1)
    }
}

// ============================================================================
// Centroid Window
// ============================================================================

/// Group-local copy of one window of the centroid matrix.
#[derive(Debug, Clone)]
pub struct CentroidWindow<T> {
    data: Vec<T>,
    height: usize,
    width: usize,
    stride: usize,
}

impl<T: Float> CentroidWindow<T> {
    /// Allocate a zeroed `height × width` window.
    pub fn new(height: usize, width: usize) -> Self {
        let stride = width + 1;
        Self {
            data: vec![T::zero(); height * stride],
            height,
            width,
            stride,
        }
    }

    /// Window value at (`row`, `col`).
    #[inline(always)]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.stride + col]
    }

    /// Cooperatively load the window whose top-left corner is
    /// (`feature_start`, `centroid_start`).
    pub fn load(
        &mut self,
        group: &WorkGroup,
        centroids: &FeatureMajor<T>,
        feature_start: usize,
        centroid_start: usize,
    ) {
        let n_cells = self.height * self.width;
        let n_features = centroids.n_features();
        let n_clusters = centroids.n_items();

        for local_id in group.local_ids() {
            for cell in (local_id..n_cells).step_by(group.size()) {
                let row = cell / self.width;
                let col = cell % self.width;
                let feature = feature_start + row;
                let centroid = centroid_start + col;

                let inside = feature < n_features && centroid < n_clusters;
                self.data[row * self.stride + col] = if inside {
                    centroids.get(feature, centroid)
                } else {
                    T::zero()
                };
            }
        }
    }
}

/// Cooperatively load the half norms of one centroid window.
pub fn load_half_norms<T: Float>(
    group: &WorkGroup,
    half_norms: &[T],
    centroid_start: usize,
    window: &mut [T],
) {
    let width = window.len();
    for local_id in group.local_ids() {
        for col in (local_id..width).step_by(group.size()) {
            window[col] = half_norms
                .get(centroid_start + col)
                .copied()
                .unwrap_or_else(T::zero);
        }
    }
}
