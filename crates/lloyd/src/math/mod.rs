//! Layer 2: Math
//!
//! # Purpose
//!
//! This layer provides the pure arithmetic the kernels are built from:
//! the compile-time accumulation operators and Euclidean norms.
//!
//! # Architecture
//!
//! ```text
//! Layer 5: API
//!   ↓
//! Layer 4: Engine
//!   ↓
//! Layer 3: Kernels
//!   ↓
//! Layer 2: Math ← You are here
//!   ↓
//! Layer 1: Primitives
//! ```

/// Accumulation operators, norms and distances.
pub mod distance;
