//! Lloyd iteration driver.
//!
//! ## Purpose
//!
//! This module runs the Lloyd loop: per iteration it launches the fused
//! assignment+update kernel, reduces the private copies, repairs empty
//! clusters, divides sums by counts and measures the centroid shift, until
//! the shift falls below the tolerance or the iteration budget is spent.
//!
//! ## Design notes
//!
//! * **Double buffering**: Centroids live in a two-slot arena; the update
//!   writes "next" while assignment reads "current", then the roles swap.
//! * **Kernel cache**: Plans and kernels are built once per problem shape
//!   and owned by the driver.
//! * **Backends**: The fused step runs on the work-group executor or, with
//!   the `gpu` feature, on a wgpu device. Every other step runs on the host.
//!
//! ## Key concepts
//!
//! * **Center shift**: Sum over clusters of the squared centroid movement.
//! * **Inertia**: Weighted sum of squared distances to the assigned centroid.
//!
//! ## Invariants
//!
//! * All validation happens before the first launch.
//! * The returned centroids are the last iterate; the returned labels and
//!   inertia are computed against them.
//!
//! ## Non-goals
//!
//! * This module does not choose initial centroids.
//! * This module does not keep the best iterate across iterations.

// External dependencies
use core::marker::PhantomData;
use core::mem::size_of;
use log::{debug, info};
use num_traits::Float;

// Internal dependencies
use crate::engine::cache::{KernelCache, KernelSet};
use crate::engine::plan::{KernelPlan, ShapeKey, TilingConfig};
use crate::engine::validator::Validator;
use crate::kernels::elementwise::{
    broadcast_divide, centroid_shifts, distances_to_assigned, fill, half_squared_norms,
};
use crate::kernels::fused::FusedLloydKernel;
use crate::kernels::reduce_copies::reduce_private_copies;
use crate::kernels::relocate::{RelocationInput, relocate_empty_clusters};
use crate::primitives::backend::Backend;
use crate::primitives::buffer::{CentroidArena, EmptyClusters, LloydBuffer, PrivateCopies};
use crate::primitives::device::DeviceParams;
use crate::primitives::errors::KMeansError;
use crate::primitives::matrix::FeatureMajor;

#[cfg(feature = "gpu")]
use crate::engine::gpu::GpuExecutor;

// ============================================================================
// Output
// ============================================================================

/// Output from one Lloyd run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorOutput<T> {
    /// Cluster index of every sample against the final centroids.
    pub assignments: Vec<usize>,

    /// Weighted inertia against the final centroids.
    pub inertia: T,

    /// Final centroids, `n_features × n_clusters`.
    pub centroids_t: FeatureMajor<T>,

    /// Number of iterations performed.
    pub n_iter: usize,

    /// Summed squared centroid shift of the last iteration.
    pub center_shift: T,

    /// Whether the shift fell below the tolerance.
    pub converged: bool,

    /// Inertia of every iteration against its input centroids (verbose only).
    pub inertia_trace: Option<Vec<T>>,
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration of the Lloyd driver.
#[derive(Debug, Clone, PartialEq)]
pub struct LloydConfig {
    /// Maximum number of iterations (at least 1).
    pub max_iter: usize,

    /// Tolerance on the summed squared centroid shift.
    pub tolerance: f64,

    /// Log and record the inertia of every iteration.
    pub verbose: bool,

    /// Tiling and privatization knobs.
    pub tiling: TilingConfig,

    /// Capabilities of the host device.
    pub device: DeviceParams,

    // ++++++++++++++++++++++++++++++++++++++
    // +               DEV                  +
    // ++++++++++++++++++++++++++++++++++++++
    /// Backend executing the fused step.
    #[doc(hidden)]
    pub backend: Backend,

    /// Whether work-groups are dispatched in parallel.
    #[doc(hidden)]
    pub parallel: bool,
}

impl Default for LloydConfig {
    fn default() -> Self {
        Self {
            max_iter: 300,
            tolerance: 1e-4,
            verbose: false,
            tiling: TilingConfig::default(),
            device: DeviceParams::cpu(),
            backend: Backend::default(),
            parallel: cfg!(feature = "cpu"),
        }
    }
}

impl LloydConfig {
    /// Validate the device-independent configuration.
    pub fn validate(&self) -> Result<(), KMeansError> {
        Validator::validate_iterations(self.max_iter)?;
        Validator::validate_tolerance(self.tolerance)?;
        self.tiling.validate()
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Lloyd k-means driver owning the kernel cache.
#[derive(Debug)]
pub struct LloydDriver<T> {
    config: LloydConfig,
    cache: KernelCache,
    #[cfg(feature = "gpu")]
    gpu: Option<GpuExecutor>,
    _marker: PhantomData<T>,
}

impl<T: Float + Send + Sync + 'static> LloydDriver<T> {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Driver with the given configuration.
    pub fn new(config: LloydConfig) -> Self {
        Self {
            config,
            cache: KernelCache::new(),
            #[cfg(feature = "gpu")]
            gpu: None,
            _marker: PhantomData,
        }
    }

    /// Driver configuration.
    pub fn config(&self) -> &LloydConfig {
        &self.config
    }

    /// Kernel cache.
    pub fn cache(&self) -> &KernelCache {
        &self.cache
    }

    /// Cached kernels for `shape`, resolving the plan on a miss.
    pub fn kernels(&mut self, shape: ShapeKey) -> Result<KernelSet, KMeansError> {
        let device = self.device()?;
        check_precision::<T>(&device)?;

        let tiling = &self.config.tiling;
        self.cache.get_or_build(shape, || {
            let plan = KernelPlan::resolve(&device, tiling, &shape, size_of::<T>())?;
            Ok(KernelSet::build(plan, &shape))
        })
    }

    // ========================================================================
    // Main Entry Points
    // ========================================================================

    /// Run Lloyd iterations from `centers` until convergence.
    pub fn run(
        &mut self,
        x: &FeatureMajor<T>,
        weights: &[T],
        centers: &FeatureMajor<T>,
    ) -> Result<ExecutorOutput<T>, KMeansError> {
        self.config.validate()?;
        Validator::validate_inputs(x, weights, centers)?;

        let kernels = self.kernels(shape_of(x, centers))?;
        debug!(
            "fitting {} samples × {} features into {} clusters on the {} backend",
            x.n_items(),
            x.n_features(),
            centers.n_items(),
            self.config.backend.name()
        );
        self.run_with_kernels(&kernels, x, weights, centers)
    }

    /// Run Lloyd iterations with explicitly provided kernels.
    ///
    /// Inputs are assumed validated.
    pub fn run_with_kernels(
        &mut self,
        kernels: &KernelSet,
        x: &FeatureMajor<T>,
        weights: &[T],
        centers: &FeatureMajor<T>,
    ) -> Result<ExecutorOutput<T>, KMeansError> {
        let wg = kernels.plan.work_group_size;
        let parallel = self.config.parallel;
        let verbose = self.config.verbose;
        let max_iter = self.config.max_iter;
        let tol = T::from(self.config.tolerance)
            .ok_or(KMeansError::InvalidTolerance(self.config.tolerance))?;

        let n_samples = x.n_items();
        let n_features = x.n_features();
        let n_clusters = centers.n_items();

        let mut arena = CentroidArena::new(centers.clone());
        let mut copies = PrivateCopies::new(kernels.fused.n_copies, n_features, n_clusters);
        let empty = EmptyClusters::new(n_clusters);
        let mut buf = LloydBuffer::default();
        buf.prepare(n_samples, n_clusters);

        let mut trace = Vec::new();
        let mut n_iter = 0;
        let mut shift = T::infinity();

        while n_iter < max_iter && shift >= tol {
            half_squared_norms(arena.current(), &mut buf.half_norms, wg, parallel);
            fill(&mut copies.sums, T::zero(), wg, parallel);
            fill(&mut copies.counts, T::zero(), wg, parallel);

            self.fused_step(
                &kernels.fused,
                x,
                weights,
                arena.current(),
                &buf.half_norms,
                &mut buf.assignments,
                &mut copies,
            )?;

            let inertia = if verbose {
                distances_to_assigned(
                    x,
                    arena.current(),
                    &buf.assignments,
                    Some(weights),
                    &mut buf.per_sample,
                    wg,
                    parallel,
                );
                let inertia = kernels.reduction.sum(&buf.per_sample, parallel);
                trace.push(inertia);
                Some(inertia)
            } else {
                None
            };

            empty.reset();
            let (current, next) = arena.split();
            reduce_private_copies(
                &copies,
                next.as_mut_slice(),
                &mut buf.counts,
                &empty,
                wg,
                parallel,
            );

            if empty.count() > 0 {
                let empty_clusters = empty.indices();
                let input = RelocationInput {
                    x,
                    weights,
                    centroids: current,
                    empty_clusters: &empty_clusters,
                };
                relocate_empty_clusters(
                    &input,
                    &mut buf.assignments,
                    next,
                    &mut buf.counts,
                    &mut buf.per_sample,
                    wg,
                    parallel,
                );
            }

            broadcast_divide(next, &buf.counts, current, wg, parallel);
            centroid_shifts(current, next, &mut buf.shifts, wg, parallel);
            shift = kernels.reduction.sum(&buf.shifts, parallel);

            if let Some(inertia) = inertia {
                info!(
                    "iteration {}: inertia {:.6e}, center shift {:.6e}",
                    n_iter + 1,
                    inertia.to_f64().unwrap_or(f64::NAN),
                    shift.to_f64().unwrap_or(f64::NAN)
                );
            }

            arena.swap();
            n_iter += 1;
        }

        let converged = shift < tol;
        if converged {
            debug!("converged after {} iterations", n_iter);
        } else {
            debug!(
                "stopped after {} iterations without converging (center shift {:.6e})",
                n_iter,
                shift.to_f64().unwrap_or(f64::NAN)
            );
        }

        half_squared_norms(arena.current(), &mut buf.half_norms, wg, parallel);
        kernels
            .labels
            .run(x, arena.current(), &buf.half_norms, &mut buf.assignments, parallel);
        distances_to_assigned(
            x,
            arena.current(),
            &buf.assignments,
            Some(weights),
            &mut buf.per_sample,
            wg,
            parallel,
        );
        let inertia = kernels.reduction.sum(&buf.per_sample, parallel);

        Ok(ExecutorOutput {
            assignments: buf.assignments.to_vec(),
            inertia,
            centroids_t: arena.into_current(),
            n_iter,
            center_shift: shift,
            converged,
            inertia_trace: verbose.then_some(trace),
        })
    }

    // ========================================================================
    // Evaluation Against Fixed Centroids
    // ========================================================================

    /// Nearest centroid of every sample.
    pub fn labels(
        &mut self,
        x: &FeatureMajor<T>,
        centers: &FeatureMajor<T>,
    ) -> Result<Vec<usize>, KMeansError> {
        Validator::validate_samples(x, centers)?;
        let kernels = self.kernels(shape_of(x, centers))?;
        let wg = kernels.plan.work_group_size;
        let parallel = self.config.parallel;

        let mut half_norms = vec![T::zero(); centers.n_items()];
        half_squared_norms(centers, &mut half_norms, wg, parallel);

        let mut labels = vec![0; x.n_items()];
        kernels.labels.run(x, centers, &half_norms, &mut labels, parallel);
        Ok(labels)
    }

    /// Squared distances from every sample to every centroid, row-major.
    pub fn squared_distances(
        &mut self,
        x: &FeatureMajor<T>,
        centers: &FeatureMajor<T>,
    ) -> Result<Vec<T>, KMeansError> {
        Validator::validate_samples(x, centers)?;
        let kernels = self.kernels(shape_of(x, centers))?;

        let mut out = vec![T::zero(); x.n_items() * centers.n_items()];
        kernels.pairwise.run(x, centers, &mut out, self.config.parallel);
        Ok(out)
    }

    /// Weighted inertia of `x` against `centers`.
    pub fn inertia(
        &mut self,
        x: &FeatureMajor<T>,
        weights: &[T],
        centers: &FeatureMajor<T>,
    ) -> Result<T, KMeansError> {
        if weights.len() != x.n_items() {
            return Err(KMeansError::MismatchedDimensions {
                what: "sample_weight length",
                expected: x.n_items(),
                got: weights.len(),
            });
        }
        Validator::validate_finite(weights, "sample_weight")?;

        let labels = self.labels(x, centers)?;
        let kernels = self.kernels(shape_of(x, centers))?;
        let wg = kernels.plan.work_group_size;
        let parallel = self.config.parallel;

        let mut per_sample = vec![T::zero(); x.n_items()];
        distances_to_assigned(x, centers, &labels, Some(weights), &mut per_sample, wg, parallel);
        Ok(kernels.reduction.sum(&per_sample, parallel))
    }

    // ========================================================================
    // Backend Dispatch
    // ========================================================================

    #[allow(clippy::too_many_arguments)]
    fn fused_step(
        &mut self,
        kernel: &FusedLloydKernel,
        x: &FeatureMajor<T>,
        weights: &[T],
        centroids: &FeatureMajor<T>,
        half_norms: &[T],
        assignments: &mut [usize],
        copies: &mut PrivateCopies<T>,
    ) -> Result<(), KMeansError> {
        match self.config.backend {
            Backend::CPU => {
                let parallel = self.config.parallel;
                kernel.run(x, weights, centroids, half_norms, assignments, copies, parallel);
                Ok(())
            }
            Backend::GPU => {
                self.fused_step_gpu(kernel, x, weights, centroids, half_norms, assignments, copies)
            }
        }
    }

    #[cfg(feature = "gpu")]
    #[allow(clippy::too_many_arguments)]
    fn fused_step_gpu(
        &mut self,
        kernel: &FusedLloydKernel,
        x: &FeatureMajor<T>,
        weights: &[T],
        centroids: &FeatureMajor<T>,
        half_norms: &[T],
        assignments: &mut [usize],
        copies: &mut PrivateCopies<T>,
    ) -> Result<(), KMeansError> {
        self.gpu_executor()?
            .run_fused(kernel, x, weights, centroids, half_norms, assignments, copies)
    }

    #[cfg(not(feature = "gpu"))]
    #[allow(clippy::too_many_arguments)]
    fn fused_step_gpu(
        &mut self,
        _kernel: &FusedLloydKernel,
        _x: &FeatureMajor<T>,
        _weights: &[T],
        _centroids: &FeatureMajor<T>,
        _half_norms: &[T],
        _assignments: &mut [usize],
        _copies: &mut PrivateCopies<T>,
    ) -> Result<(), KMeansError> {
        Err(gpu_disabled())
    }

    fn device(&mut self) -> Result<DeviceParams, KMeansError> {
        match self.config.backend {
            Backend::CPU => Ok(self.config.device.clone()),
            #[cfg(feature = "gpu")]
            Backend::GPU => Ok(self.gpu_executor()?.device_params().clone()),
            #[cfg(not(feature = "gpu"))]
            Backend::GPU => Err(gpu_disabled()),
        }
    }

    #[cfg(feature = "gpu")]
    fn gpu_executor(&mut self) -> Result<&mut GpuExecutor, KMeansError> {
        if self.gpu.is_none() {
            self.gpu = Some(GpuExecutor::new()?);
        }
        self.gpu.as_mut().ok_or_else(|| {
            KMeansError::DeviceUnavailable("wgpu executor was not initialised".to_string())
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn shape_of<T: Float>(x: &FeatureMajor<T>, centers: &FeatureMajor<T>) -> ShapeKey {
    ShapeKey {
        n_samples: x.n_items(),
        n_features: x.n_features(),
        n_clusters: centers.n_items(),
    }
}

/// Name of a floating-point type of `itemsize` bytes.
pub fn dtype_name(itemsize: usize) -> &'static str {
    match itemsize {
        2 => "float16",
        4 => "float32",
        8 => "float64",
        _ => "unknown",
    }
}

fn check_precision<T>(device: &DeviceParams) -> Result<(), KMeansError> {
    let itemsize = size_of::<T>();
    if !device.supports_itemsize(itemsize) {
        return Err(KMeansError::UnsupportedPrecision {
            dtype: dtype_name(itemsize),
            device: device.name.clone(),
        });
    }
    Ok(())
}

#[cfg(not(feature = "gpu"))]
fn gpu_disabled() -> KMeansError {
    KMeansError::DeviceUnavailable("the `gpu` feature is not enabled".to_string())
}
