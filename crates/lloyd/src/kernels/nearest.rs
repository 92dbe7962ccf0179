//! Running nearest-centroid tracker.
//!
//! ## Purpose
//!
//! Each sample keeps a `(min_index, min_distance)` pair that is folded with
//! the partial results of every centroid window in turn.
//!
//! ## Invariants
//!
//! * Windows are folded in increasing centroid order and the comparison is
//!   strict, so the lowest index reaching the minimum wins, also across
//!   window boundaries.

// External dependencies
use num_traits::Float;

/// Best centroid seen so far for one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestTracker<T> {
    /// Index of the best centroid.
    pub index: usize,

    /// Its (pseudo-)distance.
    pub distance: T,
}

impl<T: Float> Default for NearestTracker<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> NearestTracker<T> {
    /// Tracker that any finite distance replaces.
    pub fn new() -> Self {
        Self {
            index: 0,
            distance: T::infinity(),
        }
    }

    /// Fold one window of dot products as pseudo-distances `½‖c‖² − ⟨x, c⟩`.
    #[inline]
    pub fn fold_pseudo_distances(&mut self, half_norms: &[T], dots: &[T], centroid_start: usize) {
        for (col, (&half_norm, &dot)) in half_norms.iter().zip(dots).enumerate() {
            let pseudo = half_norm - dot;
            if pseudo < self.distance {
                self.distance = pseudo;
                self.index = centroid_start + col;
            }
        }
    }
}
