//! Error types for k-means operations.
//!
//! ## Purpose
//!
//! This module defines every error condition that can occur while configuring
//! the kernel set or running Lloyd iterations: input validation, tiling
//! parameter constraints, device capability mismatches and kernel launch
//! failures.
//!
//! ## Design notes
//!
//! * **Contextual**: Errors include the offending values (e.g., requested vs. maximum size).
//! * **Deferred**: Builder errors are recorded and surfaced by `build()`.
//! * **Synchronous**: Configuration errors are detected before any kernel launch.
//!
//! ## Key concepts
//!
//! 1. **Input validation**: Empty matrices, mismatched shapes, non-finite values.
//! 2. **Configuration**: Non-power-of-two tiling, oversized work-groups, bad tolerance.
//! 3. **Device**: Unsupported precision, missing adapter.
//! 4. **Launch**: Runtime failures while dispatching or reading back a kernel.
//!
//! ## Non-goals
//!
//! * Empty clusters and non-convergence are not errors and have no variant here.
//! * This module does not perform the validation logic itself.

// External dependencies
use std::error::Error;
use std::fmt::{Display, Formatter, Result};

// ============================================================================
// Error Type
// ============================================================================

/// Error type for k-means operations.
#[derive(Debug, Clone, PartialEq)]
pub enum KMeansError {
    /// The sample matrix or the initial centroids are empty.
    EmptyInput,

    /// Generic invalid input error with a descriptive message.
    InvalidInput(String),

    /// Two buffers that must agree on a dimension do not.
    MismatchedDimensions {
        /// What was being compared (e.g., "sample_weight length").
        what: &'static str,
        /// Expected size.
        expected: usize,
        /// Size provided.
        got: usize,
    },

    /// Input data contains NaN or infinite values.
    InvalidNumericValue(String),

    /// Fewer samples than clusters.
    TooFewSamples {
        /// Number of samples provided.
        n_samples: usize,
        /// Number of clusters requested.
        n_clusters: usize,
    },

    /// Maximum iteration count must be at least 1.
    InvalidIterations(usize),

    /// Convergence tolerance must be non-negative and finite.
    InvalidTolerance(f64),

    /// A tiling or work-group parameter is not a power of two.
    NotPowerOfTwo {
        /// Name of the parameter.
        parameter: &'static str,
        /// Value provided.
        value: usize,
    },

    /// The requested work-group size exceeds what the device supports.
    WorkGroupTooLarge {
        /// Requested work-group size.
        requested: usize,
        /// Device maximum.
        max: usize,
    },

    /// The requested work-group size is below the kernel minimum.
    WorkGroupTooSmall {
        /// Requested work-group size.
        requested: usize,
        /// Kernel minimum.
        min: usize,
    },

    /// Private-copy cache occupancy must be in (0, 1].
    InvalidCacheOccupancy(f64),

    /// The device cannot compute with the requested floating-point precision.
    UnsupportedPrecision {
        /// Name of the floating-point type.
        dtype: &'static str,
        /// Name of the device.
        device: String,
    },

    /// Parameter was set multiple times in the builder.
    DuplicateParameter {
        /// Name of the parameter that was set multiple times.
        parameter: &'static str,
    },

    /// No device could be acquired for the selected backend.
    DeviceUnavailable(String),

    /// A kernel failed to launch or its results could not be read back.
    KernelLaunch(String),
}

// ============================================================================
// Display Implementation
// ============================================================================

impl Display for KMeansError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::EmptyInput => write!(f, "Input matrices are empty"),
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Self::MismatchedDimensions {
                what,
                expected,
                got,
            } => {
                write!(f, "Dimension mismatch: {what} is {got}, expected {expected}")
            }
            Self::InvalidNumericValue(s) => write!(f, "Invalid numeric value: {s}"),
            Self::TooFewSamples {
                n_samples,
                n_clusters,
            } => {
                write!(
                    f,
                    "Too few samples: got {n_samples}, need at least n_clusters={n_clusters}"
                )
            }
            Self::InvalidIterations(iter) => {
                write!(f, "Invalid max_iter: {iter} (must be >= 1)")
            }
            Self::InvalidTolerance(tol) => {
                write!(f, "Invalid tolerance: {tol} (must be >= 0 and finite)")
            }
            Self::NotPowerOfTwo { parameter, value } => {
                write!(f, "Expected a power of 2 for '{parameter}', got {value}")
            }
            Self::WorkGroupTooLarge { requested, max } => {
                write!(
                    f,
                    "Work-group size {requested} is greater than the device maximum {max}"
                )
            }
            Self::WorkGroupTooSmall { requested, min } => {
                write!(f, "Work-group size {requested} is below the minimum {min}")
            }
            Self::InvalidCacheOccupancy(occ) => {
                write!(
                    f,
                    "Invalid private copies cache occupancy: {occ} (must be > 0 and <= 1)"
                )
            }
            Self::UnsupportedPrecision { dtype, device } => {
                write!(
                    f,
                    "Computations with precision {dtype} were requested but the device {device} does not support it"
                )
            }
            Self::DuplicateParameter { parameter } => {
                write!(
                    f,
                    "Parameter '{parameter}' was set multiple times. Each parameter can only be configured once."
                )
            }
            Self::DeviceUnavailable(msg) => write!(f, "Device unavailable: {msg}"),
            Self::KernelLaunch(msg) => write!(f, "Kernel launch failed: {msg}"),
        }
    }
}

// ============================================================================
// Standard Error Trait
// ============================================================================

impl Error for KMeansError {}
