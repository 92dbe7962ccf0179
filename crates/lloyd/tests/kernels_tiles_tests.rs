#![cfg(feature = "dev")]
//! Tests for the tiled assignment kernels.
//!
//! These tests verify that the windowed sweeps give the same answers as a
//! brute-force scan, including shapes that no window divides evenly:
//! - Nearest-centroid labelling
//! - Pairwise squared distances
//! - Window geometry and barrier accounting
//!
//! ## Test Organization
//!
//! 1. **Window Geometry** - Extents and barrier counts
//! 2. **Window Loading** - Zero padding at the edges
//! 3. **Label Kernel** - Agreement with brute force
//! 4. **Pairwise Kernel** - Agreement with brute force

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lloyd::internals::kernels::assignment::{LabelKernel, PairwiseDistanceKernel};
use lloyd::internals::kernels::elementwise::half_squared_norms;
use lloyd::internals::kernels::tile::{CentroidWindow, WindowGeometry};
use lloyd::internals::primitives::matrix::FeatureMajor;
use lloyd::internals::primitives::ndrange::WorkGroup;

// ============================================================================
// Helper Functions
// ============================================================================

fn random_matrix(rng: &mut StdRng, n_features: usize, n_items: usize) -> FeatureMajor<f64> {
    let data = (0..n_features * n_items)
        .map(|_| rng.random_range(-5.0..5.0))
        .collect();
    FeatureMajor::from_vec(data, n_features, n_items).unwrap()
}

fn brute_squared_distance(
    x: &FeatureMajor<f64>,
    sample: usize,
    c: &FeatureMajor<f64>,
    cluster: usize,
) -> f64 {
    (0..x.n_features())
        .map(|f| {
            let d = x.get(f, sample) - c.get(f, cluster);
            d * d
        })
        .sum()
}

fn brute_min_distance(x: &FeatureMajor<f64>, sample: usize, c: &FeatureMajor<f64>) -> f64 {
    (0..c.n_items())
        .map(|cluster| brute_squared_distance(x, sample, c, cluster))
        .fold(f64::INFINITY, f64::min)
}

// ============================================================================
// Window Geometry Tests
// ============================================================================

/// Test window counts and partial extents.
///
/// Verifies that the last window in each direction covers only the remainder.
#[test]
fn test_geometry_partial_windows() {
    let geometry = WindowGeometry::new(4, 4, 37, 45);

    assert_eq!(geometry.n_feature_windows(), 10);
    assert_eq!(geometry.n_centroid_windows(), 12);
    assert_eq!(geometry.feature_extent(0), 4);
    assert_eq!(geometry.feature_extent(9), 1);
    assert_eq!(geometry.centroid_extent(0), 4);
    assert_eq!(geometry.centroid_extent(11), 1);
}

/// Test the barrier count of one sweep.
///
/// Verifies two barriers per feature window plus one per centroid window.
#[test]
fn test_geometry_barriers_per_sweep() {
    let geometry = WindowGeometry::new(4, 4, 37, 45);
    assert_eq!(geometry.barriers_per_sweep(), 12 * (2 * 10 + 1));
}

// ============================================================================
// Window Loading Tests
// ============================================================================

/// Test that window cells beyond the matrix are zero.
///
/// Verifies that padded cells contribute nothing to dot products.
#[test]
fn test_window_load_pads_with_zeros() {
    // 3 features × 5 centroids, value = 10 * feature + centroid + 1.
    let mut centroids = FeatureMajor::filled(3, 5, 0.0);
    for f in 0..3 {
        for c in 0..5 {
            centroids.set(f, c, (10 * f + c + 1) as f64);
        }
    }

    let group = WorkGroup::new(0, 4);
    let mut window = CentroidWindow::new(2, 4);

    // Bottom-right window: feature rows 2..4, centroid columns 4..8.
    window.load(&group, &centroids, 2, 4);
    assert_eq!(window.get(0, 0), 25.0);
    assert_eq!(window.get(0, 1), 0.0);
    assert_eq!(window.get(1, 0), 0.0);
    assert_eq!(window.get(1, 3), 0.0);

    // Reloading a full window overwrites the padding.
    window.load(&group, &centroids, 0, 0);
    assert_eq!(window.get(1, 3), 14.0);
}

// ============================================================================
// Label Kernel Tests
// ============================================================================

/// Test labels against brute force on shapes no window divides.
///
/// Verifies that every label reaches the minimal squared distance.
#[test]
fn test_labels_match_brute_force() {
    let shapes = [
        // (n_samples, n_features, n_clusters, width, height, work-group)
        (37, 5, 7, 4, 2, 8),
        (100, 37, 45, 4, 4, 8),
        (101, 17, 33, 8, 4, 16),
        (5, 1, 3, 32, 16, 64),
    ];

    let mut rng = StdRng::seed_from_u64(7);
    for &(n, f, c, width, height, wg) in &shapes {
        let x = random_matrix(&mut rng, f, n);
        let centroids = random_matrix(&mut rng, f, c);
        let mut half_norms = vec![0.0; c];
        half_squared_norms(&centroids, &mut half_norms, wg, false);

        let kernel = LabelKernel {
            geometry: WindowGeometry::new(width, height, f, c),
            work_group_size: wg,
        };

        for parallel in [false, true] {
            let mut labels = vec![usize::MAX; n];
            kernel.run(&x, &centroids, &half_norms, &mut labels, parallel);

            for (sample, &label) in labels.iter().enumerate() {
                assert!(label < c, "label out of range for shape {:?}", (n, f, c));
                let chosen = brute_squared_distance(&x, sample, &centroids, label);
                let best = brute_min_distance(&x, sample, &centroids);
                assert_relative_eq!(chosen, best, max_relative = 1e-9, epsilon = 1e-12);
            }
        }
    }
}

/// Test that exact ties resolve to the lowest centroid index.
///
/// Verifies the tie-break also holds across window boundaries.
#[test]
fn test_labels_tie_break_lowest_index() {
    // Centroids 1 and 5 coincide; window width 4 puts them in different windows.
    let centroids = FeatureMajor::from_rows(
        &[
            9.0, 9.0, //
            1.0, 1.0, //
            -9.0, 9.0, //
            9.0, -9.0, //
            -9.0, -9.0, //
            1.0, 1.0,
        ],
        6,
        2,
    )
    .unwrap();
    let x = FeatureMajor::from_rows(&[1.0, 1.0, 0.9, 1.2], 2, 2).unwrap();

    let mut half_norms = vec![0.0; 6];
    half_squared_norms(&centroids, &mut half_norms, 4, false);
    let kernel = LabelKernel {
        geometry: WindowGeometry::new(4, 1, 2, 6),
        work_group_size: 4,
    };

    let mut labels = vec![0; 2];
    kernel.run(&x, &centroids, &half_norms, &mut labels, false);
    assert_eq!(labels, vec![1, 1]);
}

/// Test the total barrier count of a labelling launch.
///
/// Verifies one sweep per work-group.
#[test]
fn test_label_kernel_barrier_count() {
    let mut rng = StdRng::seed_from_u64(11);
    let (n, f, c, wg) = (100, 37, 45, 8);
    let x = random_matrix(&mut rng, f, n);
    let centroids = random_matrix(&mut rng, f, c);
    let mut half_norms = vec![0.0; c];
    half_squared_norms(&centroids, &mut half_norms, wg, false);

    let geometry = WindowGeometry::new(4, 4, f, c);
    let kernel = LabelKernel {
        geometry,
        work_group_size: wg,
    };

    let mut labels = vec![0; n];
    let barriers = kernel.run(&x, &centroids, &half_norms, &mut labels, false);
    assert_eq!(barriers, n.div_ceil(wg) * geometry.barriers_per_sweep());
}

// ============================================================================
// Pairwise Kernel Tests
// ============================================================================

/// Test pairwise squared distances against brute force.
///
/// Verifies every cell of the row-major output.
#[test]
fn test_pairwise_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(3);
    let (n, f, c, wg) = (29, 11, 9, 8);
    let x = random_matrix(&mut rng, f, n);
    let centroids = random_matrix(&mut rng, f, c);

    let kernel = PairwiseDistanceKernel {
        geometry: WindowGeometry::new(4, 4, f, c),
        work_group_size: wg,
    };

    let mut out = vec![f64::NAN; n * c];
    kernel.run(&x, &centroids, &mut out, true);

    for sample in 0..n {
        for cluster in 0..c {
            let expected = brute_squared_distance(&x, sample, &centroids, cluster);
            assert_relative_eq!(out[sample * c + cluster], expected, max_relative = 1e-12);
        }
    }
}
