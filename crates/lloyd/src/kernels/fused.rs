//! Fused assignment+update kernel.
//!
//! ## Purpose
//!
//! This is the main per-iteration kernel. For every sample it finds the
//! nearest centroid with the sliding-window sweep, writes the assignment,
//! and immediately adds the weighted sample into the sums and counts of the
//! private copy owned by its work-group.
//!
//! ## Design notes
//!
//! * **Privatization**: Group `g` mutates copy `g mod K` only. Contention on a
//!   copy is bounded by the number of groups sharing it, not by the number of
//!   features.
//! * **Fusion**: Assignment and accumulation happen in the same launch; the
//!   sample's features are still hot when they are accumulated.
//!
//! ## Invariants
//!
//! * Private copies must be zeroed before the launch.
//! * A cluster that receives no sample keeps a zero count; this is repaired
//!   by the relocator, not reported as an error.

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::kernels::assignment::nearest_in_group;
use crate::kernels::tile::WindowGeometry;
use crate::primitives::buffer::PrivateCopies;
use crate::primitives::matrix::FeatureMajor;
use crate::primitives::ndrange::{NdRange, launch_privatized};

/// Fused nearest-centroid assignment and privatized centroid accumulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FusedLloydKernel {
    /// Window grid.
    pub geometry: WindowGeometry,

    /// Samples per work-group.
    pub work_group_size: usize,

    /// Number of private copies `K`.
    pub n_copies: usize,
}

impl FusedLloydKernel {
    /// Run one assignment+update step.
    ///
    /// Writes the nearest centroid of every sample into `assignments` and
    /// accumulates `weight × sample` and `weight` into `copies`. Returns the
    /// number of barriers crossed.
    #[allow(clippy::too_many_arguments)]
    pub fn run<T: Float + Send + Sync>(
        &self,
        x: &FeatureMajor<T>,
        weights: &[T],
        centroids: &FeatureMajor<T>,
        half_norms: &[T],
        assignments: &mut [usize],
        copies: &mut PrivateCopies<T>,
        parallel: bool,
    ) -> usize {
        let range = NdRange::new(x.n_items(), self.work_group_size);
        let geometry = &self.geometry;

        launch_privatized(
            &range,
            assignments,
            self.work_group_size,
            copies.replicas_mut(),
            parallel,
            |group, labels, replica| {
                let trackers =
                    nearest_in_group(group, geometry, x, centroids, half_norms, labels.len());
                for (local_id, (label, tracker)) in labels.iter_mut().zip(trackers).enumerate() {
                    let sample = group.global_id(local_id);
                    *label = tracker.index;
                    replica.add_sample(x, sample, weights[sample], tracker.index);
                }
            },
        )
    }
}
