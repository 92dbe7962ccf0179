//! Kernel plan resolution.
//!
//! ## Purpose
//!
//! This module turns device capabilities, tiling configuration and problem
//! shape into the concrete integers the kernels are instantiated with:
//! work-group size, window width and height, and the number of private
//! centroid copies.
//!
//! ## Key concepts
//!
//! * **Work-group size**: `work_group_size_multiplier × preferred multiple`.
//!   The default multiplier fills the device maximum; on host devices the
//!   result is capped so the group-local buffers fit in local memory.
//! * **Window**: `window_n_centroids = preferred multiple × width multiplier`,
//!   `window_n_features = window height`.
//! * **Private copies**: As many replicas as fit in `occupancy × cache size`,
//!   at least one, at most one per work-group.
//!
//! ## Invariants
//!
//! * Every tiling integer of a resolved plan is a power of two.
//! * `1 <= n_copies <= n_groups`.

// External dependencies
use log::debug;

// Internal dependencies
use crate::engine::validator::Validator;
use crate::kernels::tile::WindowGeometry;
use crate::primitives::device::DeviceParams;
use crate::primitives::errors::KMeansError;

/// Smallest work-group the tree reduction supports.
pub const MIN_WORK_GROUP_SIZE: usize = 2;

// ============================================================================
// Shape Key
// ============================================================================

/// Problem shape the kernels are specialized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeKey {
    /// Number of samples.
    pub n_samples: usize,

    /// Number of features.
    pub n_features: usize,

    /// Number of clusters.
    pub n_clusters: usize,
}

// ============================================================================
// Tiling Configuration
// ============================================================================

/// User-facing tiling knobs; `None` means "derive from the device".
#[derive(Debug, Clone, PartialEq)]
pub struct TilingConfig {
    /// Override of the device's preferred work-group size multiple.
    pub preferred_work_group_size_multiple: Option<usize>,

    /// Work-group size as a multiple of the preferred multiple.
    pub work_group_size_multiplier: Option<usize>,

    /// Window width as a multiple of the preferred multiple.
    pub centroids_window_width_multiplier: usize,

    /// Window height (features per window).
    pub centroids_window_height: usize,

    /// Fraction of the cache the private copies may occupy.
    pub private_copies_max_cache_occupancy: f64,

    /// Override of the device's global memory cache size in bytes.
    pub global_mem_cache_size: Option<usize>,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            preferred_work_group_size_multiple: None,
            work_group_size_multiplier: None,
            centroids_window_width_multiplier: 1,
            centroids_window_height: 16,
            private_copies_max_cache_occupancy: 0.7,
            global_mem_cache_size: None,
        }
    }
}

impl TilingConfig {
    /// Validate the device-independent knobs.
    pub fn validate(&self) -> Result<(), KMeansError> {
        if let Some(multiple) = self.preferred_work_group_size_multiple {
            Validator::validate_power_of_two("preferred_work_group_size_multiple", multiple)?;
        }
        if let Some(multiplier) = self.work_group_size_multiplier {
            Validator::validate_power_of_two("work_group_size_multiplier", multiplier)?;
        }
        Validator::validate_power_of_two(
            "centroids_window_width_multiplier",
            self.centroids_window_width_multiplier,
        )?;
        Validator::validate_power_of_two("centroids_window_height", self.centroids_window_height)?;
        Validator::validate_cache_occupancy(self.private_copies_max_cache_occupancy)
    }
}

// ============================================================================
// Kernel Plan
// ============================================================================

/// Resolved kernel parameters for one problem shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelPlan {
    /// Items per work-group.
    pub work_group_size: usize,

    /// Preferred work-group size multiple used for the window width.
    pub preferred_work_group_size_multiple: usize,

    /// Window width.
    pub window_n_centroids: usize,

    /// Window height.
    pub window_n_features: usize,

    /// Work-groups of the fused kernel.
    pub n_groups: usize,

    /// Number of private centroid copies.
    pub n_copies: usize,

    /// Global memory cache size the copy count was derived from.
    pub global_mem_cache_size: usize,
}

impl KernelPlan {
    /// Resolve the plan for `shape` with items of `itemsize` bytes.
    pub fn resolve(
        device: &DeviceParams,
        tiling: &TilingConfig,
        shape: &ShapeKey,
        itemsize: usize,
    ) -> Result<Self, KMeansError> {
        tiling.validate()?;

        let multiple = tiling
            .preferred_work_group_size_multiple
            .unwrap_or(device.preferred_work_group_size_multiple);
        Validator::validate_power_of_two("preferred_work_group_size_multiple", multiple)?;

        let window_n_centroids = multiple * tiling.centroids_window_width_multiplier;
        let window_n_features = tiling.centroids_window_height;

        let work_group_size = match tiling.work_group_size_multiplier {
            Some(multiplier) => multiplier * multiple,
            None => {
                let multiplier = (device.max_work_group_size / multiple).max(1);
                Validator::validate_power_of_two("work_group_size_multiplier", multiplier)?;

                let window_bytes =
                    itemsize * (window_n_features * (window_n_centroids + 1) + window_n_centroids);
                let cap = device.capped_work_group_size(itemsize, window_bytes);
                let requested = multiplier * multiple;
                if requested > cap {
                    floor_power_of_two(cap).max(MIN_WORK_GROUP_SIZE)
                } else {
                    requested
                }
            }
        };
        Validator::validate_work_group_size(
            work_group_size,
            MIN_WORK_GROUP_SIZE,
            device.max_work_group_size,
        )?;

        let global_mem_cache_size = match tiling.global_mem_cache_size {
            Some(size) if size > 0 => size,
            _ => device.resolved_global_mem_cache_size(),
        };

        let n_groups = shape.n_samples.div_ceil(work_group_size).max(1);
        let n_copies = private_copies_count(
            n_groups,
            tiling.private_copies_max_cache_occupancy,
            global_mem_cache_size,
            itemsize,
            shape.n_features,
            shape.n_clusters,
        );

        let plan = Self {
            work_group_size,
            preferred_work_group_size_multiple: multiple,
            window_n_centroids,
            window_n_features,
            n_groups,
            n_copies,
            global_mem_cache_size,
        };
        debug!("resolved kernel plan for {:?} on '{}': {:?}", shape, device.name, plan);
        Ok(plan)
    }

    /// Window grid of this plan for `shape`.
    pub fn geometry(&self, shape: &ShapeKey) -> WindowGeometry {
        WindowGeometry::new(
            self.window_n_centroids,
            self.window_n_features,
            shape.n_features,
            shape.n_clusters,
        )
    }
}

/// Number of private copies that fit in `occupancy × cache_size` bytes.
///
/// `K = max(1, min(n_groups, ⌊occupancy × cache / (itemsize × C × (F + 1))⌋))`.
pub fn private_copies_count(
    n_groups: usize,
    occupancy: f64,
    cache_size: usize,
    itemsize: usize,
    n_features: usize,
    n_clusters: usize,
) -> usize {
    let footprint = (itemsize * n_clusters * (n_features + 1)).max(1) as f64;
    let fitting = (occupancy * cache_size as f64 / footprint).floor() as usize;
    fitting.min(n_groups).max(1)
}

fn floor_power_of_two(n: usize) -> usize {
    if n == 0 {
        0
    } else {
        1 << (usize::BITS - 1 - n.leading_zeros())
    }
}
