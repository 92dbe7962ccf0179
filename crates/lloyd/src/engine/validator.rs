//! Input validation for k-means configuration and data.
//!
//! ## Purpose
//!
//! This module provides validation functions for the driver configuration,
//! the tiling parameters and the input buffers. Every check runs before any
//! kernel launch, so configuration errors are reported synchronously.
//!
//! ## Design notes
//!
//! * **Fail-Fast**: Validation stops at the first error encountered.
//! * **Efficiency**: Checks are ordered from cheap to expensive.
//! * **Generics**: Validation is generic over `Float` types.
//!
//! ## Key concepts
//!
//! * **Shapes**: Samples and centroids must agree on the feature count.
//! * **Finite Checks**: All inputs must be finite (no NaN/Inf).
//! * **Tiling**: Window and work-group integers must be powers of two.
//!
//! ## Invariants
//!
//! * Validation logic is deterministic and side-effect free.
//!
//! ## Non-goals
//!
//! * This module does not transpose, cast or clean input data.

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::primitives::errors::KMeansError;
use crate::primitives::matrix::FeatureMajor;

// ============================================================================
// Validator
// ============================================================================

/// Validation utility for k-means configuration and input data.
///
/// Provides static methods returning `Result<(), KMeansError>` that fail fast
/// upon identifying the first violation.
pub struct Validator;

impl Validator {
    // ========================================================================
    // Core Input Validation
    // ========================================================================

    /// Validate samples, weights and initial centroids of one run.
    pub fn validate_inputs<T: Float>(
        x: &FeatureMajor<T>,
        weights: &[T],
        centers: &FeatureMajor<T>,
    ) -> Result<(), KMeansError> {
        // Check 1: Non-empty matrices
        if x.n_items() == 0 || x.n_features() == 0 || centers.n_items() == 0 {
            return Err(KMeansError::EmptyInput);
        }

        // Check 2: Matching shapes
        if centers.n_features() != x.n_features() {
            return Err(KMeansError::MismatchedDimensions {
                what: "centroid feature count",
                expected: x.n_features(),
                got: centers.n_features(),
            });
        }
        if weights.len() != x.n_items() {
            return Err(KMeansError::MismatchedDimensions {
                what: "sample_weight length",
                expected: x.n_items(),
                got: weights.len(),
            });
        }

        // Check 3: Enough samples to seat every cluster
        if x.n_items() < centers.n_items() {
            return Err(KMeansError::TooFewSamples {
                n_samples: x.n_items(),
                n_clusters: centers.n_items(),
            });
        }

        // Check 4: Finite values
        Self::validate_finite(x.as_slice(), "X")?;
        Self::validate_finite(centers.as_slice(), "centers_init")?;
        Self::validate_weights(weights)?;

        Ok(())
    }

    /// Validate a sample matrix against fitted centroids.
    pub fn validate_samples<T: Float>(
        x: &FeatureMajor<T>,
        centers: &FeatureMajor<T>,
    ) -> Result<(), KMeansError> {
        if x.n_items() == 0 || x.n_features() == 0 {
            return Err(KMeansError::EmptyInput);
        }
        if x.n_features() != centers.n_features() {
            return Err(KMeansError::MismatchedDimensions {
                what: "sample feature count",
                expected: centers.n_features(),
                got: x.n_features(),
            });
        }
        Self::validate_finite(x.as_slice(), "X")
    }

    /// Validate that every value is finite.
    pub fn validate_finite<T: Float>(values: &[T], name: &str) -> Result<(), KMeansError> {
        if let Some((i, v)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(KMeansError::InvalidNumericValue(format!(
                "{}[{}]={}",
                name,
                i,
                v.to_f64().unwrap_or(f64::NAN)
            )));
        }
        Ok(())
    }

    /// Validate sample weights: finite, non-negative, positive total.
    pub fn validate_weights<T: Float>(weights: &[T]) -> Result<(), KMeansError> {
        Self::validate_finite(weights, "sample_weight")?;

        if let Some((i, w)) = weights.iter().enumerate().find(|(_, w)| **w < T::zero()) {
            return Err(KMeansError::InvalidNumericValue(format!(
                "sample_weight[{}]={} (must be >= 0)",
                i,
                w.to_f64().unwrap_or(f64::NAN)
            )));
        }

        let total = weights.iter().fold(T::zero(), |acc, &w| acc + w);
        if total <= T::zero() {
            return Err(KMeansError::InvalidInput(
                "sample weights sum to zero".to_string(),
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Parameter Validation
    // ========================================================================

    /// Validate the maximum number of Lloyd iterations.
    pub fn validate_iterations(max_iter: usize) -> Result<(), KMeansError> {
        if max_iter == 0 {
            return Err(KMeansError::InvalidIterations(max_iter));
        }
        Ok(())
    }

    /// Validate the convergence tolerance on the summed squared center shift.
    pub fn validate_tolerance(tol: f64) -> Result<(), KMeansError> {
        if !tol.is_finite() || tol < 0.0 {
            return Err(KMeansError::InvalidTolerance(tol));
        }
        Ok(())
    }

    /// Validate a tiling integer.
    pub fn validate_power_of_two(parameter: &'static str, value: usize) -> Result<(), KMeansError> {
        if !value.is_power_of_two() {
            return Err(KMeansError::NotPowerOfTwo { parameter, value });
        }
        Ok(())
    }

    /// Validate a work-group size against device and kernel limits.
    pub fn validate_work_group_size(
        requested: usize,
        min: usize,
        max: usize,
    ) -> Result<(), KMeansError> {
        if requested > max {
            return Err(KMeansError::WorkGroupTooLarge { requested, max });
        }
        if requested < min {
            return Err(KMeansError::WorkGroupTooSmall { requested, min });
        }
        Ok(())
    }

    /// Validate the private-copy cache occupancy ceiling.
    pub fn validate_cache_occupancy(occupancy: f64) -> Result<(), KMeansError> {
        if !occupancy.is_finite() || occupancy <= 0.0 || occupancy > 1.0 {
            return Err(KMeansError::InvalidCacheOccupancy(occupancy));
        }
        Ok(())
    }

    /// Validate that no parameters were set multiple times in the builder.
    pub fn validate_no_duplicates(
        duplicate_param: Option<&'static str>,
    ) -> Result<(), KMeansError> {
        if let Some(param) = duplicate_param {
            return Err(KMeansError::DuplicateParameter { parameter: param });
        }
        Ok(())
    }
}
