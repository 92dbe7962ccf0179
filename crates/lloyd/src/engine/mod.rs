//! Layer 4: Engine
//!
//! # Purpose
//!
//! This layer orchestrates the kernels into the Lloyd iteration: it resolves
//! kernel plans from device capabilities, caches them per problem shape,
//! validates inputs and drives the per-iteration launch sequence until
//! convergence.
//!
//! # Architecture
//!
//! ```text
//! Layer 5: API
//!   ↓
//! Layer 4: Engine ← You are here
//!   ↓
//! Layer 3: Kernels
//!   ↓
//! Layer 2: Math
//!   ↓
//! Layer 1: Primitives
//! ```
//!
//! # Iteration
//!
//! ```text
//! half norms → fused assign+update → reduce copies ─┬─ empty? → relocate
//!                                                   ↓
//!        swap ← shift reduction ← centroid shifts ← broadcast divide
//! ```

/// Input validation.
pub mod validator;

/// Kernel plan resolution.
pub mod plan;

/// Shape-keyed kernel cache.
pub mod cache;

/// Lloyd driver.
pub mod executor;

/// Fit results.
pub mod output;

/// wgpu backend for the fused step.
#[cfg(feature = "gpu")]
pub mod gpu;
