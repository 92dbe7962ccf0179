//! Per-sample accumulation over a loaded centroid window.

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::kernels::tile::CentroidWindow;
use crate::math::distance::AccumulateOp;
use crate::primitives::matrix::FeatureMajor;

/// Accumulate `Op` between one sample and every centroid of a window.
///
/// `acc[col]` receives `Σ_row Op(window[row, col], x[feature_start + row, sample])`
/// for `row < feature_extent` and `col < centroid_extent`. Cells past the
/// extents are never read.
#[inline]
pub fn accumulate_window<T, Op>(
    window: &CentroidWindow<T>,
    x: &FeatureMajor<T>,
    sample: usize,
    feature_start: usize,
    feature_extent: usize,
    centroid_extent: usize,
    acc: &mut [T],
) where
    T: Float,
    Op: AccumulateOp<T>,
{
    for row in 0..feature_extent {
        let value = x.get(feature_start + row, sample);
        for (col, slot) in acc[..centroid_extent].iter_mut().enumerate() {
            *slot = *slot + Op::combine(window.get(row, col), value);
        }
    }
}
