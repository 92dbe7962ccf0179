//! Accumulation operators, norms and distances.
//!
//! ## Purpose
//!
//! The tiled kernels accumulate one of two per-feature terms between a
//! centroid value and a sample value. This module defines both as zero-sized
//! operator types so the choice is made when a kernel is instantiated, not
//! branched on per element.
//!
//! ## Key concepts
//!
//! * **Product**: `c · x`, summed into a dot product. Combined with the half
//!   squared norm of the centroid it yields the pseudo-distance
//!   `½‖c‖² − ⟨x, c⟩`, which orders centroids like `‖x − c‖²`.
//! * **SquaredDiff**: `(c − x)²`, summed into the exact squared distance.
//!
//! ## Invariants
//!
//! * Both operators are neutral on a pair of zeros, so zero padding is safe.

// External dependencies
use num_traits::Float;

// ============================================================================
// Accumulation Operators
// ============================================================================

/// Per-feature term accumulated by the tiled kernels.
pub trait AccumulateOp<T: Float>: Copy + Send + Sync + 'static {
    /// Term contributed by one feature.
    fn combine(centroid: T, sample: T) -> T;
}

/// Dot-product accumulation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Product;

/// Squared-difference accumulation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SquaredDiff;

impl<T: Float> AccumulateOp<T> for Product {
    #[inline(always)]
    fn combine(centroid: T, sample: T) -> T {
        centroid * sample
    }
}

impl<T: Float> AccumulateOp<T> for SquaredDiff {
    #[inline(always)]
    fn combine(centroid: T, sample: T) -> T {
        let diff = centroid - sample;
        diff * diff
    }
}

// ============================================================================
// Norms and Distances
// ============================================================================

/// Half squared Euclidean norm: `½ Σ vᵢ²`.
#[inline]
pub fn half_squared_norm<T: Float>(values: impl IntoIterator<Item = T>) -> T {
    let two = T::one() + T::one();
    values
        .into_iter()
        .fold(T::zero(), |acc, v| acc + v * v)
        / two
}

/// Squared Euclidean distance between two equally long vectors.
#[inline]
pub fn squared_euclidean<T: Float>(
    a: impl IntoIterator<Item = T>,
    b: impl IntoIterator<Item = T>,
) -> T {
    a.into_iter()
        .zip(b)
        .fold(T::zero(), |acc, (x, y)| acc + <SquaredDiff as AccumulateOp<T>>::combine(x, y))
}
