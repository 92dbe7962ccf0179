//! Layer 3: Kernels
//!
//! # Purpose
//!
//! This layer contains the cooperating data-parallel kernels of one Lloyd
//! iteration: the sliding-window distance machinery, the fused
//! assignment+update kernel, the private-copy reducer, the empty-cluster
//! relocator, the tree reduction and the small elementwise kernels.
//!
//! # Architecture
//!
//! ```text
//! Layer 5: API
//!   ↓
//! Layer 4: Engine
//!   ↓
//! Layer 3: Kernels ← You are here
//!   ↓
//! Layer 2: Math
//!   ↓
//! Layer 1: Primitives
//! ```

/// Window geometry and cooperative centroid tile loader.
pub mod tile;

/// Per-sample accumulation over a loaded tile.
pub mod accumulate;

/// Running nearest-centroid tracker.
pub mod nearest;

/// Label-only assignment and pairwise distance kernels.
pub mod assignment;

/// Fused assignment+update kernel.
pub mod fused;

/// Reduction of private centroid copies.
pub mod reduce_copies;

/// Empty-cluster relocation.
pub mod relocate;

/// Power-of-two tree reduction.
pub mod reduction;

/// Elementwise kernels.
pub mod elementwise;
