//! # Lloyd: tiled, privatized, fused k-means kernels for Rust
//!
//! A Lloyd k-means engine built from cooperating data-parallel kernels. One
//! iteration assigns every sample to its nearest centroid and accumulates the
//! new centroid sums in the same launch, with centroid windows staged in
//! group-local memory and per-group private accumulators to bound contention.
//!
//! ## What is Lloyd's algorithm?
//!
//! Lloyd's algorithm alternates two steps until the centroids stop moving:
//! assign each sample to its closest centroid, then move each centroid to the
//! (weighted) mean of the samples assigned to it. This crate runs exactly
//! those two steps, fused, plus the bookkeeping around them: reduction of
//! private copies, relocation of empty clusters and a convergence check on
//! the summed squared centroid shift.
//!
//! ## Quick Start
//!
//! ```rust
//! use lloyd::prelude::*;
//!
//! let x = vec![
//!     vec![0.0, 0.0],
//!     vec![0.2, 0.0],
//!     vec![10.0, 10.0],
//!     vec![10.2, 10.0],
//! ];
//! let init = vec![vec![0.0, 0.0], vec![10.0, 10.0]];
//!
//! // Build the model
//! let mut model = KMeans::new()
//!     .max_iter(50)       // At most 50 Lloyd iterations
//!     .tolerance(1e-6)    // Stop once the summed squared shift is below 1e-6
//!     .build()?;
//!
//! // Fit the model from the given initial centroids
//! let result = model.fit(&x, &init, None)?;
//!
//! assert_eq!(result.labels, vec![0, 0, 1, 1]);
//! println!("{}", result);
//! # Result::<(), KMeansError>::Ok(())
//! ```
//!
//! ```text
//! Summary:
//!   Samples:    4
//!   Clusters:   2
//!   Features:   2
//!   Iterations: 2
//!   Converged:  yes
//!   Inertia:    0.04
//!
//! Centroids:
//!  Cluster     Size           x0           x1
//! -------------------------------------------
//!        0        2     0.100000     0.000000
//!        1        2    10.100000    10.000000
//! ```
//!
//! ### Tiling
//!
//! ```rust
//! use lloyd::prelude::*;
//! # let x = vec![vec![0.0, 0.0], vec![0.2, 0.0], vec![10.0, 10.0], vec![10.2, 10.0]];
//! # let init = vec![vec![0.0, 0.0], vec![10.0, 10.0]];
//!
//! let mut model = KMeans::new()
//!     .work_group_size_multiplier(2)           // Work-groups of 2 × 32 samples
//!     .centroids_window_width_multiplier(1)    // Windows of 32 centroids
//!     .centroids_window_height(8)              // ... by 8 features
//!     .private_copies_max_cache_occupancy(0.5) // Private copies use half the cache
//!     .global_mem_cache_size(1 << 20)          // 1 MiB cache
//!     .verbose(true)                           // Record per-iteration inertia
//!     .build()?;
//!
//! let result = model.fit(&x, &init, None)?;
//! assert!(result.inertia_trace.is_some());
//! # Result::<(), KMeansError>::Ok(())
//! ```
//!
//! ### Result and Error Handling
//!
//! `fit` returns a `Result<KMeansResult<T>, KMeansError>`. Configuration
//! errors (tiling integers that are not powers of two, a work-group larger
//! than the device allows, 64-bit floats on a device without fp64) are
//! reported before any kernel runs. Empty clusters and non-convergence are
//! not errors.
//!
//! ## Features
//!
//! - `cpu` (default): dispatch work-groups across cores with rayon.
//! - `gpu`: run the fused kernel on a wgpu device (f32 only).
//!
//! ## References
//!
//! - Lloyd, S. P. (1982). "Least squares quantization in PCM"
//!
//! ## License
//!
//! See the repository for license information and contribution guidelines.

// Layer 1: Primitives - errors, device model, work-group execution, buffers.
mod primitives;

// Layer 2: Math - accumulation operators and distances.
mod math;

// Layer 3: Kernels - tiled, privatized and elementwise kernels.
mod kernels;

// Layer 4: Engine - plans, kernel cache and the Lloyd driver.
mod engine;

// Layer 5: High-level fluent API.
mod api;

// Sample-matrix input formats.
mod input;

// Standard Lloyd prelude.
pub mod prelude {
    pub use crate::api::{
        Backend, DeviceParams, KMeansBuilder as KMeans, KMeansError, KMeansResult, Lloyd,
    };
    pub use crate::input::SampleMatrix;
}

// Internal modules for development and testing.
//
// This module re-exports internal modules for development and testing purposes.
// It is only available with the `dev` feature enabled.
#[cfg(feature = "dev")]
pub mod internals {
    pub mod primitives {
        pub use crate::primitives::*;
    }
    pub mod math {
        pub use crate::math::*;
    }
    pub mod kernels {
        pub use crate::kernels::*;
    }
    pub mod engine {
        pub use crate::engine::*;
    }
    pub mod api {
        pub use crate::api::*;
    }
    pub mod input {
        pub use crate::input::*;
    }
}
