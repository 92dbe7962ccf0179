//! Memory management for Lloyd iterations.
//!
//! ## Purpose
//!
//! This module provides the buffers a k-means run allocates once at
//! problem-size granularity and recycles across iterations: the
//! double-buffered centroid arena, the private centroid copies, the
//! empty-cluster list and the per-run scratch space.
//!
//! ## Design notes
//!
//! * **Allocate once**: Buffers are sized by `prepare` and only logically
//!   reset between iterations.
//! * **Explicit roles**: The centroid arena tracks which slot is "current"
//!   with a role flag instead of swapping references.
//! * **Exclusive replicas**: Private copies are handed out as disjoint
//!   mutable views, one per replica.
//!
//! ## Key concepts
//!
//! * **Slot**: A reusable vector wrapper with automatic capacity management.
//! * **CentroidArena**: Current/next centroid matrices.
//! * **PrivateCopies**: `K` replicas of the centroid sums and counts.
//! * **EmptyClusters**: Atomic counter plus list of clusters with zero count.
//! * **LloydBuffer**: Per-run scratch space for the driver.
//!
//! ## Invariants
//!
//! * Exactly one arena slot is current at any instant.
//! * The first `count()` entries of the empty-cluster list are distinct.
//!
//! ## Non-goals
//!
//! * Dynamic shrinking or aggressive memory reclamation.

// External dependencies
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicUsize, Ordering};
use num_traits::Float;

// Internal dependencies
use crate::primitives::matrix::FeatureMajor;

// ============================================================================
// Slot - Unified Vector Abstraction
// ============================================================================

/// A reusable vector slot with automatic capacity management.
#[derive(Debug, Clone)]
pub struct Slot<T>(Vec<T>);

impl<T> Slot<T> {
    /// Get a mutable reference to the underlying vector.
    #[inline]
    pub fn as_vec_mut(&mut self) -> &mut Vec<T> {
        &mut self.0
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> Deref for Slot<T> {
    type Target = Vec<T>;
    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for Slot<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Helper trait to simplify resizing and filling vectors.
pub trait VecExt<T> {
    /// Resize the vector to `n` and fill with `val`.
    fn assign(&mut self, n: usize, val: T);
}

impl<T: Clone> VecExt<T> for Vec<T> {
    fn assign(&mut self, n: usize, val: T) {
        if self.len() != n {
            self.clear();
            self.resize(n, val);
        } else {
            self.fill(val);
        }
    }
}

// ============================================================================
// CentroidArena - Double-Buffered Centroids
// ============================================================================

/// Two centroid matrices whose "current" and "next" roles swap every iteration.
#[derive(Debug, Clone)]
pub struct CentroidArena<T> {
    slots: [FeatureMajor<T>; 2],
    current: usize,
}

impl<T: Float> CentroidArena<T> {
    /// Create an arena whose current slot holds `initial`.
    pub fn new(initial: FeatureMajor<T>) -> Self {
        let next = FeatureMajor::filled(initial.n_features(), initial.n_items(), T::zero());
        Self {
            slots: [initial, next],
            current: 0,
        }
    }

    /// Centroids read during assignment.
    #[inline]
    pub fn current(&self) -> &FeatureMajor<T> {
        &self.slots[self.current]
    }

    /// Centroids written by the update.
    #[inline]
    pub fn next(&self) -> &FeatureMajor<T> {
        &self.slots[1 - self.current]
    }

    /// Borrow both roles at once: `(current, next)`.
    pub fn split(&mut self) -> (&FeatureMajor<T>, &mut FeatureMajor<T>) {
        let (first, second) = self.slots.split_at_mut(1);
        if self.current == 0 {
            (&first[0], &mut second[0])
        } else {
            (&second[0], &mut first[0])
        }
    }

    /// Swap the roles: "next" becomes "current".
    #[inline]
    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }

    /// Consume the arena and return the current centroids.
    pub fn into_current(self) -> FeatureMajor<T> {
        let [first, second] = self.slots;
        if self.current == 0 { first } else { second }
    }
}

// ============================================================================
// PrivateCopies - Privatized Centroid Accumulators
// ============================================================================

/// `K` replicas of the centroid sum matrix and count vector.
///
/// Replica `k` sums live at `sums[k * F * C..(k + 1) * F * C]` in
/// feature-major order; its counts at `counts[k * C..(k + 1) * C]`.
#[derive(Debug, Clone)]
pub struct PrivateCopies<T> {
    /// Sum matrices, `n_copies × n_features × n_clusters`.
    pub sums: Vec<T>,

    /// Count vectors, `n_copies × n_clusters`.
    pub counts: Vec<T>,

    n_copies: usize,
    n_features: usize,
    n_clusters: usize,
}

/// Exclusive mutable view of one private replica.
#[derive(Debug)]
pub struct Replica<'a, T> {
    /// Replica index.
    pub index: usize,

    /// Sum matrix, `n_features × n_clusters`.
    pub sums: &'a mut [T],

    /// Count vector, `n_clusters`.
    pub counts: &'a mut [T],
}

impl<T: Float> PrivateCopies<T> {
    /// Allocate zeroed replicas.
    pub fn new(n_copies: usize, n_features: usize, n_clusters: usize) -> Self {
        let n_copies = n_copies.max(1);
        Self {
            sums: vec![T::zero(); n_copies * n_features * n_clusters],
            counts: vec![T::zero(); n_copies * n_clusters],
            n_copies,
            n_features,
            n_clusters,
        }
    }

    /// Number of replicas.
    #[inline]
    pub fn n_copies(&self) -> usize {
        self.n_copies
    }

    /// Number of features per replica.
    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of clusters per replica.
    #[inline]
    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Disjoint mutable views, one per replica.
    pub fn replicas_mut(&mut self) -> Vec<Replica<'_, T>> {
        let matrix_len = (self.n_features * self.n_clusters).max(1);
        let counts_len = self.n_clusters.max(1);
        self.sums
            .chunks_mut(matrix_len)
            .zip(self.counts.chunks_mut(counts_len))
            .enumerate()
            .map(|(index, (sums, counts))| Replica {
                index,
                sums,
                counts,
            })
            .collect()
    }
}

impl<T: Float> Replica<'_, T> {
    /// Add a weighted sample to `cluster`: `sums[:, cluster] += w·x`, `counts[cluster] += w`.
    #[inline]
    pub fn add_sample(&mut self, x: &FeatureMajor<T>, sample: usize, weight: T, cluster: usize) {
        let n_clusters = self.counts.len();
        self.counts[cluster] = self.counts[cluster] + weight;
        for feature in 0..x.n_features() {
            let idx = feature * n_clusters + cluster;
            self.sums[idx] = self.sums[idx] + weight * x.get(feature, sample);
        }
    }
}

// ============================================================================
// EmptyClusters - Atomic Empty-Cluster List
// ============================================================================

/// Clusters whose reduced count is zero, appended concurrently.
#[derive(Debug)]
pub struct EmptyClusters {
    counter: AtomicUsize,
    list: Vec<AtomicUsize>,
}

impl EmptyClusters {
    /// List with room for every cluster.
    pub fn new(n_clusters: usize) -> Self {
        Self {
            counter: AtomicUsize::new(0),
            list: (0..n_clusters).map(|_| AtomicUsize::new(0)).collect(),
        }
    }

    /// Reset the counter before an iteration.
    pub fn reset(&self) {
        self.counter.store(0, Ordering::Relaxed);
    }

    /// Append `cluster` at a slot reserved by the atomic counter.
    pub fn push(&self, cluster: usize) {
        let pos = self.counter.fetch_add(1, Ordering::Relaxed);
        self.list[pos].store(cluster, Ordering::Relaxed);
    }

    /// Number of empty clusters recorded.
    pub fn count(&self) -> usize {
        self.counter.load(Ordering::Relaxed)
    }

    /// Recorded clusters in list order.
    pub fn indices(&self) -> Vec<usize> {
        self.list[..self.count()]
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }
}

// ============================================================================
// LloydBuffer - Working Memory for the Driver
// ============================================================================

/// Per-run scratch space of the Lloyd driver.
#[derive(Debug, Clone)]
pub struct LloydBuffer<T> {
    /// Half squared norm of every centroid.
    pub half_norms: Slot<T>,

    /// Cluster index of every sample.
    pub assignments: Slot<usize>,

    /// Reduced cluster counts (sum of weights).
    pub counts: Slot<T>,

    /// Squared shift of every centroid.
    pub shifts: Slot<T>,

    /// Per-sample scratch (inertia or relocation distances).
    pub per_sample: Slot<T>,
}

impl<T> Default for LloydBuffer<T> {
    fn default() -> Self {
        Self {
            half_norms: Slot::default(),
            assignments: Slot::default(),
            counts: Slot::default(),
            shifts: Slot::default(),
            per_sample: Slot::default(),
        }
    }
}

impl<T: Float> LloydBuffer<T> {
    /// Prepare buffers for `n_samples` samples and `n_clusters` clusters.
    pub fn prepare(&mut self, n_samples: usize, n_clusters: usize) {
        self.half_norms.as_vec_mut().assign(n_clusters, T::zero());
        self.assignments.as_vec_mut().assign(n_samples, 0);
        self.counts.as_vec_mut().assign(n_clusters, T::zero());
        self.shifts.as_vec_mut().assign(n_clusters, T::zero());
        self.per_sample.as_vec_mut().assign(n_samples, T::zero());
    }
}
