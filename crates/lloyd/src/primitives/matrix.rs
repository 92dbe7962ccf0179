//! Feature-major matrix storage.
//!
//! ## Purpose
//!
//! Samples and centroids are stored transposed (features × items) so that
//! consecutive work items, which handle consecutive samples or centroids,
//! read consecutive addresses.
//!
//! ## Invariants
//!
//! * `data.len() == n_features * n_items`.
//! * Element `(feature, item)` lives at `feature * n_items + item`.

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::primitives::errors::KMeansError;

/// Dense matrix stored one feature row after another.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMajor<T> {
    data: Vec<T>,
    n_features: usize,
    n_items: usize,
}

impl<T: Float> FeatureMajor<T> {
    /// Matrix of `n_features × n_items` filled with `value`.
    pub fn filled(n_features: usize, n_items: usize, value: T) -> Self {
        Self {
            data: vec![value; n_features * n_items],
            n_features,
            n_items,
        }
    }

    /// Wrap an already transposed buffer.
    pub fn from_vec(data: Vec<T>, n_features: usize, n_items: usize) -> Result<Self, KMeansError> {
        if data.len() != n_features * n_items {
            return Err(KMeansError::MismatchedDimensions {
                what: "feature-major buffer length",
                expected: n_features * n_items,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            n_features,
            n_items,
        })
    }

    /// Transpose a row-major `n_items × n_features` buffer.
    pub fn from_rows(rows: &[T], n_items: usize, n_features: usize) -> Result<Self, KMeansError> {
        if rows.len() != n_items * n_features {
            return Err(KMeansError::MismatchedDimensions {
                what: "row-major buffer length",
                expected: n_items * n_features,
                got: rows.len(),
            });
        }

        let mut data = vec![T::zero(); rows.len()];
        for (item, row) in rows.chunks_exact(n_features.max(1)).enumerate() {
            for (feature, &value) in row.iter().enumerate() {
                data[feature * n_items + item] = value;
            }
        }
        Ok(Self {
            data,
            n_features,
            n_items,
        })
    }

    /// Transpose back to a row-major `n_items × n_features` buffer.
    pub fn to_rows(&self) -> Vec<T> {
        let mut rows = vec![T::zero(); self.data.len()];
        for feature in 0..self.n_features {
            for item in 0..self.n_items {
                rows[item * self.n_features + feature] = self.get(feature, item);
            }
        }
        rows
    }

    /// Number of features (rows).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of items (columns): samples or centroids.
    #[inline]
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Value of `feature` for `item`.
    #[inline]
    pub fn get(&self, feature: usize, item: usize) -> T {
        self.data[feature * self.n_items + item]
    }

    /// Overwrite the value of `feature` for `item`.
    #[inline]
    pub fn set(&mut self, feature: usize, item: usize, value: T) {
        self.data[feature * self.n_items + item] = value;
    }

    /// All values of one feature, across items.
    #[inline]
    pub fn feature_row(&self, feature: usize) -> &[T] {
        let start = feature * self.n_items;
        &self.data[start..start + self.n_items]
    }

    /// Values of one item, gathered across features.
    pub fn item(&self, item: usize) -> Vec<T> {
        (0..self.n_features).map(|f| self.get(f, item)).collect()
    }

    /// Underlying buffer.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Underlying buffer, mutable.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Copy every value from `other`, which must have the same shape.
    pub fn copy_from(&mut self, other: &Self) {
        self.data.copy_from_slice(&other.data);
    }
}
