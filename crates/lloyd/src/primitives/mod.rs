//! Layer 1: Primitives
//!
//! # Purpose
//!
//! This layer provides the primitive abstractions, data structures, and
//! execution model used throughout the crate. It has zero internal
//! dependencies within the crate.
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
//! Layer 2: Math
//!   ↓
//! Layer 1: Primitives ← You are here
//! ```

/// Shared error types.
pub mod errors;

/// Execution backend configuration.
pub mod backend;

/// Device capability parameters.
pub mod device;

/// Work-group execution model.
pub mod ndrange;

/// Feature-major matrix storage.
pub mod matrix;

/// Buffer management.
pub mod buffer;
