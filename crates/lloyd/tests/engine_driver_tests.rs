#![cfg(feature = "dev")]
//! Tests for the Lloyd driver.
//!
//! These tests verify the full iteration loop on the host backend:
//! - Convergence on well-separated blobs
//! - Non-increasing inertia across iterations
//! - Idempotence at a fixed point
//! - Empty-cluster relocation inside the loop
//! - Kernel reuse and precision checks
//!
//! ## Test Organization
//!
//! 1. **Convergence** - Blobs, iteration counts, idempotence
//! 2. **Inertia Trace** - Monotonicity and verbose gating
//! 3. **Empty Clusters** - Relocation inside the loop
//! 4. **Evaluation** - Labels, distances and inertia against fixed centroids
//! 5. **Configuration** - Caching, precision, iteration limits

use approx::assert_relative_eq;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use lloyd::internals::engine::executor::{LloydConfig, LloydDriver};
use lloyd::internals::engine::plan::TilingConfig;
use lloyd::internals::primitives::device::DeviceParams;
use lloyd::internals::primitives::errors::KMeansError;
use lloyd::internals::primitives::matrix::FeatureMajor;

// ============================================================================
// Helper Functions
// ============================================================================

const BLOB_CENTERS: [(f64, f64); 4] = [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)];

/// Gaussian blobs of `per_blob` samples around `BLOB_CENTERS`.
///
/// Returns the samples and their true blob index.
fn blobs(per_blob: usize, sigma: f64, seed: u64) -> (FeatureMajor<f64>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, sigma).unwrap();

    let mut rows = Vec::with_capacity(BLOB_CENTERS.len() * per_blob * 2);
    let mut truth = Vec::with_capacity(BLOB_CENTERS.len() * per_blob);
    for (blob, &(cx, cy)) in BLOB_CENTERS.iter().enumerate() {
        for _ in 0..per_blob {
            rows.push(cx + noise.sample(&mut rng));
            rows.push(cy + noise.sample(&mut rng));
            truth.push(blob);
        }
    }

    let n = truth.len();
    (FeatureMajor::from_rows(&rows, n, 2).unwrap(), truth)
}

fn true_centers() -> FeatureMajor<f64> {
    let rows: Vec<f64> = BLOB_CENTERS.iter().flat_map(|&(x, y)| [x, y]).collect();
    FeatureMajor::from_rows(&rows, 4, 2).unwrap()
}

fn small_tiles() -> TilingConfig {
    TilingConfig {
        preferred_work_group_size_multiple: Some(4),
        work_group_size_multiplier: Some(4),
        centroids_window_height: 1,
        ..TilingConfig::default()
    }
}

fn driver(config: LloydConfig) -> LloydDriver<f64> {
    LloydDriver::new(config)
}

// ============================================================================
// Convergence Tests
// ============================================================================

/// Test convergence on four well-separated blobs.
///
/// Seeded with the true centers, Lloyd recovers the blob labels within a few
/// iterations and the inertia matches 200 samples × 2 features × σ².
#[test]
fn test_blobs_converge() {
    let (x, truth) = blobs(50, 0.1, 42);
    let weights = vec![1.0; x.n_items()];

    let mut lloyd = driver(LloydConfig::default());
    let out = lloyd.run(&x, &weights, &true_centers()).unwrap();

    assert!(out.converged);
    assert!(out.n_iter <= 5, "took {} iterations", out.n_iter);
    assert_eq!(out.assignments, truth);
    assert_relative_eq!(out.inertia, 4.0, max_relative = 0.2);

    for (cluster, &(cx, cy)) in BLOB_CENTERS.iter().enumerate() {
        assert!((out.centroids_t.get(0, cluster) - cx).abs() < 0.1);
        assert!((out.centroids_t.get(1, cluster) - cy).abs() < 0.1);
    }
}

/// Test that small and default tiles agree.
///
/// Verifies the result does not depend on window or work-group sizes.
#[test]
fn test_tiling_does_not_change_result() {
    let (x, _) = blobs(30, 1.5, 8);
    let weights = vec![1.0; x.n_items()];
    let init = FeatureMajor::from_rows(&[1.0, 1.0, 8.0, 1.0, 1.0, 8.0, 8.0, 8.0], 4, 2).unwrap();

    let default = driver(LloydConfig::default()).run(&x, &weights, &init).unwrap();
    let tiled = driver(LloydConfig {
        tiling: small_tiles(),
        ..LloydConfig::default()
    })
    .run(&x, &weights, &init)
    .unwrap();

    assert_eq!(default.assignments, tiled.assignments);
    assert_eq!(default.n_iter, tiled.n_iter);
    assert_relative_eq!(default.inertia, tiled.inertia, max_relative = 1e-9);
    for (a, b) in default.centroids_t.as_slice().iter().zip(tiled.centroids_t.as_slice()) {
        assert_relative_eq!(*a, *b, max_relative = 1e-9, epsilon = 1e-12);
    }
}

/// Test idempotence at a fixed point.
///
/// Restarting from converged centroids changes neither labels nor centroids.
#[test]
fn test_idempotent_at_fixed_point() {
    let (x, _) = blobs(40, 0.5, 3);
    let weights = vec![1.0; x.n_items()];

    let mut lloyd = driver(LloydConfig {
        tolerance: 0.0,
        max_iter: 50,
        ..LloydConfig::default()
    });
    let first = lloyd.run(&x, &weights, &true_centers()).unwrap();

    let mut once = driver(LloydConfig {
        max_iter: 1,
        ..LloydConfig::default()
    });
    let second = once.run(&x, &weights, &first.centroids_t).unwrap();

    assert_eq!(second.assignments, first.assignments);
    assert_eq!(second.n_iter, 1);
    assert!(second.center_shift < 1e-20);
    assert!(second.converged);
}

/// Test that weights pull centroids toward heavy samples.
#[test]
fn test_weighted_centroids() {
    let x = FeatureMajor::from_rows(&[0.0, 0.0, 1.0, 0.0, 10.0, 10.0, 12.0, 10.0], 4, 2).unwrap();
    let init = FeatureMajor::from_rows(&[0.0, 0.0, 10.0, 10.0], 2, 2).unwrap();
    let weights = [3.0, 1.0, 1.0, 1.0];

    let out = driver(LloydConfig::default()).run(&x, &weights, &init).unwrap();
    assert_eq!(out.assignments, vec![0, 0, 1, 1]);
    assert_relative_eq!(out.centroids_t.get(0, 0), 0.25);
    assert_relative_eq!(out.centroids_t.get(0, 1), 11.0);
    // 3 × 0.25² + 0.75² + 1 + 1
    assert_relative_eq!(out.inertia, 2.75, max_relative = 1e-12);
}

// ============================================================================
// Inertia Trace Tests
// ============================================================================

/// Test that the recorded inertia never increases.
///
/// Verifies the trace on overlapping blobs from a poor initialisation.
#[test]
fn test_inertia_trace_non_increasing() {
    let (x, _) = blobs(50, 2.5, 1234);
    let weights = vec![1.0; x.n_items()];
    // One sample of each blob, shifted toward the middle.
    let init = FeatureMajor::from_rows(&[4.0, 4.0, 6.0, 4.0, 4.0, 6.0, 6.0, 6.0], 4, 2).unwrap();

    let mut lloyd = driver(LloydConfig {
        verbose: true,
        tolerance: 1e-10,
        tiling: small_tiles(),
        ..LloydConfig::default()
    });
    let out = lloyd.run(&x, &weights, &init).unwrap();

    let trace = out.inertia_trace.expect("verbose fit records the trace");
    assert_eq!(trace.len(), out.n_iter);
    assert!(trace.len() > 1);
    for pair in trace.windows(2) {
        assert!(pair[1] <= pair[0] * (1.0 + 1e-6), "inertia increased: {:?}", pair);
    }
    assert!(out.inertia <= trace[trace.len() - 1] * (1.0 + 1e-6));
}

/// Test that the trace is only recorded in verbose mode.
#[test]
fn test_trace_requires_verbose() {
    let (x, _) = blobs(10, 0.1, 5);
    let weights = vec![1.0; x.n_items()];
    let out = driver(LloydConfig::default()).run(&x, &weights, &true_centers()).unwrap();
    assert!(out.inertia_trace.is_none());
}

// ============================================================================
// Empty Cluster Tests
// ============================================================================

/// Test relocation of a cluster initialised far from the data.
///
/// Verifies every cluster ends up non-empty.
#[test]
fn test_far_centroid_is_relocated() {
    let (x, _) = blobs(25, 0.2, 77);
    let weights = vec![1.0; x.n_items()];
    // Cluster 3 starts far away and attracts no sample.
    let init = FeatureMajor::from_rows(&[0.0, 0.0, 10.0, 0.0, 5.0, 10.0, 1e4, 1e4], 4, 2).unwrap();

    let out = driver(LloydConfig::default()).run(&x, &weights, &init).unwrap();

    let mut sizes = [0usize; 4];
    for &label in &out.assignments {
        sizes[label] += 1;
    }
    assert!(sizes.iter().all(|&s| s > 0), "sizes: {:?}", sizes);
    assert!(out.centroids_t.get(0, 3) < 100.0);
}

/// Test that zero-weight samples are assigned but do not move centroids.
#[test]
fn test_zero_weight_samples() {
    let x = FeatureMajor::from_rows(&[0.0, 0.0, 2.0, 0.0, 100.0, 0.0, 50.0, 50.0], 4, 2).unwrap();
    let init = FeatureMajor::from_rows(&[1.0, 0.0, 50.0, 50.0], 2, 2).unwrap();
    let weights = [1.0, 1.0, 0.0, 1.0];

    let out = driver(LloydConfig::default()).run(&x, &weights, &init).unwrap();
    assert_eq!(out.assignments[2], 1);
    assert_relative_eq!(out.centroids_t.get(0, 0), 1.0);
    assert_relative_eq!(out.centroids_t.get(0, 1), 50.0);
}

// ============================================================================
// Evaluation Tests
// ============================================================================

/// Test evaluation against fixed centroids.
#[test]
fn test_evaluation_against_fixed_centroids() {
    let x = FeatureMajor::from_rows(&[0.0, 0.0, 3.0, 4.0, 9.0, 9.0], 3, 2).unwrap();
    let centers = FeatureMajor::from_rows(&[0.0, 0.0, 10.0, 10.0], 2, 2).unwrap();
    let mut lloyd = driver(LloydConfig::default());

    assert_eq!(lloyd.labels(&x, &centers).unwrap(), vec![0, 0, 1]);

    let distances = lloyd.squared_distances(&x, &centers).unwrap();
    assert_eq!(distances.len(), 6);
    assert_relative_eq!(distances[2], 25.0);
    assert_relative_eq!(distances[3], 85.0);
    assert_relative_eq!(distances[5], 2.0);

    let inertia = lloyd.inertia(&x, &[1.0, 2.0, 1.0], &centers).unwrap();
    assert_relative_eq!(inertia, 52.0);
}

// ============================================================================
// Configuration Tests
// ============================================================================

/// Test that repeated runs of one shape reuse the kernels.
#[test]
fn test_kernel_cache_reused_across_runs() {
    let (x, _) = blobs(10, 0.1, 9);
    let weights = vec![1.0; x.n_items()];
    let mut lloyd = driver(LloydConfig::default());

    lloyd.run(&x, &weights, &true_centers()).unwrap();
    lloyd.run(&x, &weights, &true_centers()).unwrap();
    assert_eq!(lloyd.cache().len(), 1);
    assert_eq!(lloyd.cache().misses(), 1);

    let (y, _) = blobs(5, 0.1, 9);
    lloyd.labels(&y, &true_centers()).unwrap();
    assert_eq!(lloyd.cache().len(), 2);
}

/// Test that 64-bit floats are refused on devices without fp64.
#[test]
fn test_unsupported_precision() {
    let device = DeviceParams {
        name: "fp32 only".to_string(),
        has_fp64: false,
        ..DeviceParams::cpu()
    };
    let (x, _) = blobs(5, 0.1, 1);
    let weights = vec![1.0; x.n_items()];

    let err = driver(LloydConfig {
        device: device.clone(),
        ..LloydConfig::default()
    })
    .run(&x, &weights, &true_centers())
    .unwrap_err();
    assert_eq!(
        err,
        KMeansError::UnsupportedPrecision {
            dtype: "float64",
            device: "fp32 only".to_string(),
        }
    );

    // Single precision runs on the same device.
    let to_f32 = |m: &FeatureMajor<f64>| m.as_slice().iter().map(|&v| v as f32).collect();
    let x32 = FeatureMajor::from_vec(to_f32(&x), 2, x.n_items()).unwrap();
    let c32 = FeatureMajor::from_vec(to_f32(&true_centers()), 2, 4).unwrap();
    let out = LloydDriver::<f32>::new(LloydConfig {
        device,
        ..LloydConfig::default()
    })
    .run(&x32, &vec![1.0f32; x32.n_items()], &c32)
    .unwrap();
    assert!(out.converged);
}

/// Test that hitting `max_iter` is reported, not an error.
#[test]
fn test_max_iter_reached() {
    let (x, _) = blobs(50, 2.5, 1234);
    let weights = vec![1.0; x.n_items()];
    let init = FeatureMajor::from_rows(&[4.0, 4.0, 6.0, 4.0, 4.0, 6.0, 6.0, 6.0], 4, 2).unwrap();

    let out = driver(LloydConfig {
        max_iter: 1,
        tolerance: 0.0,
        ..LloydConfig::default()
    })
    .run(&x, &weights, &init)
    .unwrap();

    assert_eq!(out.n_iter, 1);
    assert!(!out.converged);
}

/// Test configuration errors.
#[test]
fn test_invalid_configuration() {
    let (x, _) = blobs(5, 0.1, 1);
    let weights = vec![1.0; x.n_items()];

    let err = driver(LloydConfig {
        max_iter: 0,
        ..LloydConfig::default()
    })
    .run(&x, &weights, &true_centers())
    .unwrap_err();
    assert_eq!(err, KMeansError::InvalidIterations(0));

    let err = driver(LloydConfig {
        tiling: TilingConfig {
            centroids_window_height: 3,
            ..TilingConfig::default()
        },
        ..LloydConfig::default()
    })
    .run(&x, &weights, &true_centers())
    .unwrap_err();
    assert_eq!(
        err,
        KMeansError::NotPowerOfTwo {
            parameter: "centroids_window_height",
            value: 3
        }
    );
}
