#![cfg(feature = "dev")]
//! Tests for the primitives layer.
//!
//! These tests verify the building blocks every kernel relies on:
//! - The work-group execution model and its barrier accounting
//! - Feature-major storage and its row-major conversions
//! - Device capability handling
//! - The centroid arena, private copies and empty-cluster list
//!
//! ## Test Organization
//!
//! 1. **Execution Model** - NdRange, WorkGroup, launch helpers
//! 2. **Storage** - FeatureMajor conversions
//! 3. **Device** - Capability caps and fallbacks
//! 4. **Buffers** - Arena, private copies, empty clusters
//! 5. **Errors** - Display formatting

use lloyd::internals::primitives::buffer::{
    CentroidArena, EmptyClusters, LloydBuffer, PrivateCopies,
};
use lloyd::internals::primitives::device::{DEFAULT_GLOBAL_MEM_CACHE_SIZE, DeviceParams};
use lloyd::internals::primitives::errors::KMeansError;
use lloyd::internals::primitives::matrix::FeatureMajor;
use lloyd::internals::primitives::ndrange::{
    NdRange, WorkGroup, launch, launch_groups, launch_privatized,
};

use std::sync::atomic::{AtomicUsize, Ordering};

// ============================================================================
// Execution Model Tests
// ============================================================================

/// Test that the grid is rounded up to whole work-groups.
#[test]
fn test_ndrange_rounds_up() {
    let range = NdRange::new(10, 4);
    assert_eq!(range.global_size, 12);
    assert_eq!(range.n_groups(), 3);

    let exact = NdRange::new(16, 4);
    assert_eq!(exact.n_groups(), 4);

    // An empty problem still launches one group.
    let empty = NdRange::new(0, 8);
    assert_eq!(empty.n_groups(), 1);
}

/// Test work-group id arithmetic.
#[test]
fn test_work_group_ids() {
    let mut group = WorkGroup::new(3, 8);
    assert_eq!(group.first_global_id(), 24);
    assert_eq!(group.global_id(5), 29);
    assert_eq!(group.local_ids().count(), 8);

    group.barrier();
    group.barrier();
    assert_eq!(group.barriers(), 2);
}

/// Test that `launch` hands each group its own output chunk.
#[test]
fn test_launch_writes_global_ids() {
    for parallel in [false, true] {
        let range = NdRange::new(10, 4);
        let mut out = vec![0usize; 10];
        let barriers = launch(&range, &mut out, 4, parallel, |group, chunk| {
            for (local_id, v) in chunk.iter_mut().enumerate() {
                *v = group.global_id(local_id);
            }
            group.barrier();
        });

        assert_eq!(out, (0..10).collect::<Vec<_>>());
        assert_eq!(barriers, 3, "one barrier per group");
    }
}

/// Test that `launch_groups` visits every group exactly once.
#[test]
fn test_launch_groups_visits_all() {
    let range = NdRange::new(100, 16);
    let visited = AtomicUsize::new(0);
    launch_groups(&range, true, |group| {
        visited.fetch_add(group.group_id() + 1, Ordering::Relaxed);
    });
    let n = range.n_groups();
    assert_eq!(visited.load(Ordering::Relaxed), n * (n + 1) / 2);
}

/// Test that privatized launches map group `g` to replica `g mod K`.
#[test]
fn test_launch_privatized_replica_mapping() {
    let range = NdRange::new(40, 4);
    let mut out = vec![0usize; 40];
    let replicas: Vec<Vec<usize>> = vec![Vec::new(); 3];
    let mut seen = replicas.clone();

    {
        let views: Vec<&mut Vec<usize>> = seen.iter_mut().collect();
        launch_privatized(&range, &mut out, 4, views, true, |group, chunk, replica| {
            replica.push(group.group_id());
            chunk.fill(group.group_id());
        });
    }

    for (k, groups) in seen.iter().enumerate() {
        assert!(groups.iter().all(|g| g % 3 == k));
    }
    let total: usize = seen.iter().map(Vec::len).sum();
    assert_eq!(total, 10);
    assert_eq!(out[39], 9);
}

// ============================================================================
// Storage Tests
// ============================================================================

/// Test row-major to feature-major transposition.
#[test]
fn test_feature_major_from_rows() {
    let rows = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let m = FeatureMajor::from_rows(&rows, 3, 2).unwrap();

    assert_eq!(m.n_items(), 3);
    assert_eq!(m.n_features(), 2);
    assert_eq!(m.feature_row(0), &[1.0, 3.0, 5.0]);
    assert_eq!(m.feature_row(1), &[2.0, 4.0, 6.0]);
    assert_eq!(m.item(1), vec![3.0, 4.0]);
    assert_eq!(m.to_rows(), rows);
}

/// Test length checks on construction.
#[test]
fn test_feature_major_length_mismatch() {
    let err = FeatureMajor::from_vec(vec![1.0f64; 5], 2, 3).unwrap_err();
    assert_eq!(
        err,
        KMeansError::MismatchedDimensions {
            what: "feature-major buffer length",
            expected: 6,
            got: 5,
        }
    );
}

// ============================================================================
// Device Tests
// ============================================================================

/// Test the host work-group cap derived from local memory.
#[test]
fn test_cpu_work_group_cap() {
    let device = DeviceParams::cpu();
    // 32 KiB - 4480 B window - 1 KiB reserve, 8 bytes per item.
    assert_eq!(device.capped_work_group_size(8, 4480), 3408);
    // No per-item memory means no cap.
    assert_eq!(device.capped_work_group_size(0, 4480), device.max_work_group_size);
}

/// Test that accelerators are never capped.
#[test]
fn test_accelerator_not_capped() {
    let device = DeviceParams {
        is_cpu: false,
        max_work_group_size: 256,
        ..DeviceParams::cpu()
    };
    assert_eq!(device.capped_work_group_size(8, 1 << 20), 256);
}

/// Test the global memory cache size fallback.
#[test]
fn test_cache_size_fallback() {
    let mut device = DeviceParams::cpu();
    device.global_mem_cache_size = 0;
    assert_eq!(device.resolved_global_mem_cache_size(), DEFAULT_GLOBAL_MEM_CACHE_SIZE);

    device.global_mem_cache_size = 4096;
    assert_eq!(device.resolved_global_mem_cache_size(), 4096);
}

/// Test precision support.
#[test]
fn test_supports_itemsize() {
    let mut device = DeviceParams::cpu();
    assert!(device.supports_itemsize(8));
    device.has_fp64 = false;
    assert!(device.supports_itemsize(4));
    assert!(!device.supports_itemsize(8));
}

// ============================================================================
// Buffer Tests
// ============================================================================

/// Test that the arena swaps roles without copying.
#[test]
fn test_centroid_arena_swap() {
    let initial = FeatureMajor::filled(2, 3, 1.0);
    let mut arena = CentroidArena::new(initial.clone());
    assert_eq!(arena.current(), &initial);

    {
        let (current, next) = arena.split();
        assert_eq!(current, &initial);
        next.set(0, 0, 7.0);
    }
    arena.swap();
    assert_eq!(arena.current().get(0, 0), 7.0);
    assert_eq!(arena.next(), &initial);

    let last = arena.into_current();
    assert_eq!(last.get(0, 0), 7.0);
}

/// Test that replicas are disjoint views.
#[test]
fn test_private_copies_replicas() {
    let x = FeatureMajor::from_rows(&[1.0, 2.0, 3.0, 4.0], 2, 2).unwrap();
    let mut copies = PrivateCopies::new(3, 2, 4);
    {
        let mut replicas = copies.replicas_mut();
        assert_eq!(replicas.len(), 3);
        replicas[1].add_sample(&x, 1, 2.0, 3);
    }

    // Replica 1, cluster 3: sums hold 2 * (3, 4), count holds 2.
    assert_eq!(copies.sums[8 + 3], 6.0);
    assert_eq!(copies.sums[8 + 4 + 3], 8.0);
    assert_eq!(copies.counts[4 + 3], 2.0);
    assert_eq!(copies.sums.iter().filter(|&&v| v != 0.0).count(), 2);
}

/// Test the atomic empty-cluster list.
#[test]
fn test_empty_clusters_list() {
    let empty = EmptyClusters::new(5);
    empty.push(4);
    empty.push(1);
    assert_eq!(empty.count(), 2);
    assert_eq!(empty.indices(), vec![4, 1]);

    empty.reset();
    assert_eq!(empty.count(), 0);
    assert!(empty.indices().is_empty());
}

/// Test scratch buffer sizing.
#[test]
fn test_lloyd_buffer_prepare() {
    let mut buf = LloydBuffer::<f64>::default();
    buf.prepare(10, 3);
    assert_eq!(buf.assignments.len(), 10);
    assert_eq!(buf.per_sample.len(), 10);
    assert_eq!(buf.half_norms.len(), 3);
    assert_eq!(buf.counts.len(), 3);
    assert_eq!(buf.shifts.len(), 3);
}

// ============================================================================
// Error Tests
// ============================================================================

/// Test error messages name the offending parameter.
#[test]
fn test_error_display() {
    let err = KMeansError::NotPowerOfTwo {
        parameter: "centroids_window_height",
        value: 12,
    };
    assert_eq!(
        err.to_string(),
        "Expected a power of 2 for 'centroids_window_height', got 12"
    );

    let err = KMeansError::WorkGroupTooLarge {
        requested: 512,
        max: 256,
    };
    assert!(err.to_string().contains("512"));
    assert!(err.to_string().contains("256"));
}
