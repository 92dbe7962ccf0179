//! Output types for k-means fits.
//!
//! ## Purpose
//!
//! This module defines the `KMeansResult` struct which holds everything a
//! fit produces: labels, centroids, inertia and convergence metadata.
//!
//! ## Design notes
//!
//! * **Layout**: Centroids are stored row-major (`n_clusters × n_features`),
//!   the transpose of the kernel layout, so that `centroid(c)` is a slice.
//! * **Ergonomics**: Implements `Display` for human-readable output.
//!
//! ## Invariants
//!
//! * `labels.len()` equals the number of samples; every label is below
//!   `n_clusters`.
//! * `centroids.len() == n_clusters * n_features`.
//!
//! ## Non-goals
//!
//! * This module does not perform calculations beyond simple summaries.

// External dependencies
use core::fmt::{Display, Formatter, Result};
use num_traits::Float;

// Internal dependencies
use crate::engine::executor::ExecutorOutput;

// ============================================================================
// Result Structure
// ============================================================================

/// Result of a k-means fit.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult<T> {
    /// Cluster index of every sample.
    pub labels: Vec<usize>,

    /// Final centroids, row-major `n_clusters × n_features`.
    pub centroids: Vec<T>,

    /// Number of clusters.
    pub n_clusters: usize,

    /// Number of features.
    pub n_features: usize,

    /// Weighted sum of squared distances to the assigned centroids.
    pub inertia: T,

    /// Number of Lloyd iterations performed.
    pub n_iter: usize,

    /// Whether the center shift fell below the tolerance.
    pub converged: bool,

    /// Summed squared centroid shift of the last iteration.
    pub center_shift: T,

    /// Per-iteration inertia (verbose fits only).
    pub inertia_trace: Option<Vec<T>>,
}

impl<T: Float> KMeansResult<T> {
    /// Build a result from driver output.
    pub fn from_output(output: ExecutorOutput<T>) -> Self {
        Self {
            labels: output.assignments,
            centroids: output.centroids_t.to_rows(),
            n_clusters: output.centroids_t.n_items(),
            n_features: output.centroids_t.n_features(),
            inertia: output.inertia,
            n_iter: output.n_iter,
            converged: output.converged,
            center_shift: output.center_shift,
            inertia_trace: output.inertia_trace,
        }
    }

    // ========================================================================
    // Query Methods
    // ========================================================================

    /// Coordinates of centroid `cluster`.
    pub fn centroid(&self, cluster: usize) -> &[T] {
        &self.centroids[cluster * self.n_features..(cluster + 1) * self.n_features]
    }

    /// Number of samples assigned to each cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }

    /// Check if the per-iteration inertia was recorded.
    pub fn has_inertia_trace(&self) -> bool {
        self.inertia_trace.is_some()
    }
}

// ============================================================================
// Display Implementation
// ============================================================================

impl<T: Float + Display> Display for KMeansResult<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "Summary:")?;
        writeln!(f, "  Samples:    {}", self.labels.len())?;
        writeln!(f, "  Clusters:   {}", self.n_clusters)?;
        writeln!(f, "  Features:   {}", self.n_features)?;
        writeln!(f, "  Iterations: {}", self.n_iter)?;
        writeln!(f, "  Converged:  {}", if self.converged { "yes" } else { "no" })?;
        writeln!(f, "  Inertia:    {}", self.inertia)?;
        writeln!(f)?;

        writeln!(f, "Centroids:")?;

        let n_cols = self.n_features.min(4);
        write!(f, "{:>8} {:>8}", "Cluster", "Size")?;
        for feature in 0..n_cols {
            write!(f, " {:>12}", format!("x{}", feature))?;
        }
        if self.n_features > n_cols {
            write!(f, " {:>4}", "...")?;
        }
        writeln!(f)?;

        let line_width = 17 + 13 * n_cols + if self.n_features > n_cols { 5 } else { 0 };
        writeln!(f, "{:-<width$}", "", width = line_width)?;

        // Rows (show first 10 and last 10 if more than 20 clusters)
        let n = self.n_clusters;
        let rows_to_show: Vec<usize> = if n <= 20 {
            (0..n).collect()
        } else {
            (0..10).chain(n - 10..n).collect()
        };

        let sizes = self.cluster_sizes();
        let mut prev_idx = 0;
        for (i, &idx) in rows_to_show.iter().enumerate() {
            if i > 0 && idx != prev_idx + 1 {
                writeln!(f, "{:>8}", "...")?;
            }
            prev_idx = idx;

            write!(f, "{:>8} {:>8}", idx, sizes[idx])?;
            for value in &self.centroid(idx)[..n_cols] {
                write!(f, " {:>12.6}", value)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
