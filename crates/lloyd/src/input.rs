//! Input abstractions for sample matrices.
//!
//! ## Purpose
//!
//! This module provides a unified abstraction for k-means inputs, allowing
//! `fit`, `predict`, `transform` and `score` to accept several matrix
//! formats (row vectors, ndarray) through a single interface.
//!
//! ## Design notes
//!
//! * **Layout conversion**: Every format is transposed into the
//!   feature-major layout the kernels read.
//! * **Fail-fast validation**: Ragged rows are rejected before any kernel
//!   launch.
//!
//! ## Key concepts
//!
//! * **SampleMatrix Trait**: Row count, column count and a feature-major copy.
//! * **Rows**: One row per sample (or per centroid), one column per feature.
//!
//! ## Invariants
//!
//! * The feature-major copy holds every element of the input exactly once.
//!
//! ## Non-goals
//!
//! * This module does not perform data cleaning or imputation.
//! * This module does not rescale or normalize features.

// External dependencies
use ndarray::{ArrayBase, Data, Ix2};
use num_traits::Float;

// Internal dependencies
use crate::primitives::errors::KMeansError;
use crate::primitives::matrix::FeatureMajor;

/// Trait for types that can be used as a sample or centroid matrix.
pub trait SampleMatrix<T: Float> {
    /// Number of rows (samples or centroids).
    fn n_rows(&self) -> usize;

    /// Number of columns (features).
    fn n_cols(&self) -> usize;

    /// Copy the matrix into feature-major storage.
    fn to_feature_major(&self) -> Result<FeatureMajor<T>, KMeansError>;
}

impl<T: Float> SampleMatrix<T> for [Vec<T>] {
    fn n_rows(&self) -> usize {
        self.len()
    }

    fn n_cols(&self) -> usize {
        self.first().map_or(0, Vec::len)
    }

    fn to_feature_major(&self) -> Result<FeatureMajor<T>, KMeansError> {
        let n_cols = self.n_cols();
        if let Some(row) = self.iter().find(|row| row.len() != n_cols) {
            return Err(KMeansError::MismatchedDimensions {
                what: "row length",
                expected: n_cols,
                got: row.len(),
            });
        }

        let rows: Vec<T> = self.iter().flatten().copied().collect();
        FeatureMajor::from_rows(&rows, self.len(), n_cols)
    }
}

impl<T: Float> SampleMatrix<T> for Vec<Vec<T>> {
    fn n_rows(&self) -> usize {
        self.as_slice().n_rows()
    }

    fn n_cols(&self) -> usize {
        self.as_slice().n_cols()
    }

    fn to_feature_major(&self) -> Result<FeatureMajor<T>, KMeansError> {
        self.as_slice().to_feature_major()
    }
}

impl<T: Float, S> SampleMatrix<T> for ArrayBase<S, Ix2>
where
    S: Data<Elem = T>,
{
    fn n_rows(&self) -> usize {
        self.nrows()
    }

    fn n_cols(&self) -> usize {
        self.ncols()
    }

    fn to_feature_major(&self) -> Result<FeatureMajor<T>, KMeansError> {
        // Logical iteration order of the transposed view is feature-major.
        let data: Vec<T> = self.t().iter().copied().collect();
        FeatureMajor::from_vec(data, self.ncols(), self.nrows())
    }
}
