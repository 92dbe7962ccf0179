//! High-level API for Lloyd k-means.
//!
//! ## Purpose
//!
//! This module provides the primary user-facing entry point. It implements a
//! fluent builder for the iteration and tiling parameters and a `Lloyd`
//! model with `fit`, `predict`, `transform` and `score`.
//!
//! ## Design notes
//!
//! * **Ergonomic**: Fluent builder with sensible defaults for all parameters.
//! * **Validated**: Parameters are validated when `.build()` is called; the
//!   device-dependent checks run on the first fit.
//! * **Type-Safe**: Generic over `Float` types for flexible precision.
//!
//! ### Configuration Flow
//!
//! 1. Create a [`KMeansBuilder`] via `KMeans::new()`.
//! 2. Chain configuration methods (`.max_iter()`, `.tolerance()`, etc.).
//! 3. Call `.build()` to obtain a [`Lloyd`] model.
//! 4. Call `.fit(&x, &initial_centroids, None)`.

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::engine::executor::{LloydConfig, LloydDriver};
use crate::engine::plan::TilingConfig;
use crate::engine::validator::Validator;
use crate::input::SampleMatrix;
use crate::primitives::matrix::FeatureMajor;

// Publicly re-exported types
pub use crate::engine::output::KMeansResult;
pub use crate::primitives::backend::Backend;
pub use crate::primitives::device::DeviceParams;
pub use crate::primitives::errors::KMeansError;

/// Fluent builder for configuring Lloyd k-means.
#[derive(Debug, Clone)]
pub struct KMeansBuilder<T> {
    /// Maximum number of iterations.
    pub max_iter: Option<usize>,

    /// Tolerance on the summed squared centroid shift.
    pub tolerance: Option<T>,

    /// Log and record the per-iteration inertia.
    pub verbose: Option<bool>,

    /// Work-group size as a multiple of the preferred multiple.
    pub work_group_size_multiplier: Option<usize>,

    /// Override of the device's preferred work-group size multiple.
    pub preferred_work_group_size_multiple: Option<usize>,

    /// Window width as a multiple of the preferred multiple.
    pub centroids_window_width_multiplier: Option<usize>,

    /// Window height.
    pub centroids_window_height: Option<usize>,

    /// Fraction of the cache the private copies may occupy.
    pub private_copies_max_cache_occupancy: Option<f64>,

    /// Override of the device's global memory cache size in bytes.
    pub global_mem_cache_size: Option<usize>,

    /// Device capabilities.
    pub device: Option<DeviceParams>,

    // ======================================
    // DEV
    // ======================================
    /// Execution backend hint.
    #[doc(hidden)]
    pub backend: Option<Backend>,

    /// Parallel execution hint.
    #[doc(hidden)]
    pub parallel: Option<bool>,

    /// Tracks if any parameter was set multiple times (for validation).
    #[doc(hidden)]
    pub duplicate_param: Option<&'static str>,
}

impl<T: Float + Send + Sync + 'static> Default for KMeansBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float + Send + Sync + 'static> KMeansBuilder<T> {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            max_iter: None,
            tolerance: None,
            verbose: None,
            work_group_size_multiplier: None,
            preferred_work_group_size_multiple: None,
            centroids_window_width_multiplier: None,
            centroids_window_height: None,
            private_copies_max_cache_occupancy: None,
            global_mem_cache_size: None,
            device: None,
            backend: None,
            parallel: None,
            duplicate_param: None,
        }
    }

    /// Set the maximum number of Lloyd iterations.
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        if self.max_iter.is_some() {
            self.duplicate_param = Some("max_iter");
        }
        self.max_iter = Some(max_iter);
        self
    }

    /// Set the tolerance on the summed squared centroid shift.
    pub fn tolerance(mut self, tol: T) -> Self {
        if self.tolerance.is_some() {
            self.duplicate_param = Some("tolerance");
        }
        self.tolerance = Some(tol);
        self
    }

    /// Log and record the inertia of every iteration.
    pub fn verbose(mut self, verbose: bool) -> Self {
        if self.verbose.is_some() {
            self.duplicate_param = Some("verbose");
        }
        self.verbose = Some(verbose);
        self
    }

    /// Set the work-group size multiplier (power of two).
    pub fn work_group_size_multiplier(mut self, multiplier: usize) -> Self {
        if self.work_group_size_multiplier.is_some() {
            self.duplicate_param = Some("work_group_size_multiplier");
        }
        self.work_group_size_multiplier = Some(multiplier);
        self
    }

    /// Override the preferred work-group size multiple (power of two).
    pub fn preferred_work_group_size_multiple(mut self, multiple: usize) -> Self {
        if self.preferred_work_group_size_multiple.is_some() {
            self.duplicate_param = Some("preferred_work_group_size_multiple");
        }
        self.preferred_work_group_size_multiple = Some(multiple);
        self
    }

    /// Set the centroid window width multiplier (power of two).
    pub fn centroids_window_width_multiplier(mut self, multiplier: usize) -> Self {
        if self.centroids_window_width_multiplier.is_some() {
            self.duplicate_param = Some("centroids_window_width_multiplier");
        }
        self.centroids_window_width_multiplier = Some(multiplier);
        self
    }

    /// Set the centroid window height (power of two).
    pub fn centroids_window_height(mut self, height: usize) -> Self {
        if self.centroids_window_height.is_some() {
            self.duplicate_param = Some("centroids_window_height");
        }
        self.centroids_window_height = Some(height);
        self
    }

    /// Set the fraction of the cache the private copies may occupy.
    pub fn private_copies_max_cache_occupancy(mut self, occupancy: f64) -> Self {
        if self.private_copies_max_cache_occupancy.is_some() {
            self.duplicate_param = Some("private_copies_max_cache_occupancy");
        }
        self.private_copies_max_cache_occupancy = Some(occupancy);
        self
    }

    /// Override the global memory cache size in bytes.
    pub fn global_mem_cache_size(mut self, bytes: usize) -> Self {
        if self.global_mem_cache_size.is_some() {
            self.duplicate_param = Some("global_mem_cache_size");
        }
        self.global_mem_cache_size = Some(bytes);
        self
    }

    /// Set the device capabilities used to resolve kernel plans.
    pub fn device(mut self, device: DeviceParams) -> Self {
        if self.device.is_some() {
            self.duplicate_param = Some("device");
        }
        self.device = Some(device);
        self
    }

    /// Set the execution backend hint (only for dev)
    #[doc(hidden)]
    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set parallel execution hint (only for dev)
    #[doc(hidden)]
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }

    /// Validate the configuration and build the model.
    pub fn build(self) -> Result<Lloyd<T>, KMeansError> {
        // Check for duplicate parameter configuration
        Validator::validate_no_duplicates(self.duplicate_param)?;

        let defaults = LloydConfig::default();
        let tiling_defaults = TilingConfig::default();

        let tolerance = match self.tolerance {
            Some(tol) => tol.to_f64().unwrap_or(f64::NAN),
            None => defaults.tolerance,
        };

        let config = LloydConfig {
            max_iter: self.max_iter.unwrap_or(defaults.max_iter),
            tolerance,
            verbose: self.verbose.unwrap_or(defaults.verbose),
            tiling: TilingConfig {
                preferred_work_group_size_multiple: self.preferred_work_group_size_multiple,
                work_group_size_multiplier: self.work_group_size_multiplier,
                centroids_window_width_multiplier: self
                    .centroids_window_width_multiplier
                    .unwrap_or(tiling_defaults.centroids_window_width_multiplier),
                centroids_window_height: self
                    .centroids_window_height
                    .unwrap_or(tiling_defaults.centroids_window_height),
                private_copies_max_cache_occupancy: self
                    .private_copies_max_cache_occupancy
                    .unwrap_or(tiling_defaults.private_copies_max_cache_occupancy),
                global_mem_cache_size: self.global_mem_cache_size,
            },
            device: self.device.unwrap_or(defaults.device),
            // ++++++++++++++++++++++++++++++++++++++
            // +               DEV                  +
            // ++++++++++++++++++++++++++++++++++++++
            backend: self.backend.unwrap_or(defaults.backend),
            parallel: self.parallel.unwrap_or(defaults.parallel),
        };

        config.validate()?;

        Ok(Lloyd {
            driver: LloydDriver::new(config),
            centroids: None,
        })
    }
}

// ============================================================================
// Model
// ============================================================================

/// Lloyd k-means model.
#[derive(Debug)]
pub struct Lloyd<T> {
    driver: LloydDriver<T>,
    centroids: Option<FeatureMajor<T>>,
}

impl<T: Float + Send + Sync + 'static> Lloyd<T> {
    /// Run Lloyd iterations on `x` starting from `init`.
    ///
    /// `x` holds one sample per row and `init` one centroid per row. Missing
    /// `sample_weight` means unit weights.
    pub fn fit<X, C>(
        &mut self,
        x: &X,
        init: &C,
        sample_weight: Option<&[T]>,
    ) -> Result<KMeansResult<T>, KMeansError>
    where
        X: SampleMatrix<T> + ?Sized,
        C: SampleMatrix<T> + ?Sized,
    {
        let x_t = x.to_feature_major()?;
        let centers_t = init.to_feature_major()?;
        let weights = match sample_weight {
            Some(w) => w.to_vec(),
            None => vec![T::one(); x_t.n_items()],
        };

        let output = self.driver.run(&x_t, &weights, &centers_t)?;
        self.centroids = Some(output.centroids_t.clone());
        Ok(KMeansResult::from_output(output))
    }

    /// Index of the nearest fitted centroid for every sample.
    pub fn predict<X>(&mut self, x: &X) -> Result<Vec<usize>, KMeansError>
    where
        X: SampleMatrix<T> + ?Sized,
    {
        let centers = self.fitted()?.clone();
        self.driver.labels(&x.to_feature_major()?, &centers)
    }

    /// Euclidean distance from every sample to every fitted centroid.
    ///
    /// Returned row-major, `n_samples × n_clusters`.
    pub fn transform<X>(&mut self, x: &X) -> Result<Vec<T>, KMeansError>
    where
        X: SampleMatrix<T> + ?Sized,
    {
        let centers = self.fitted()?.clone();
        let squared = self.driver.squared_distances(&x.to_feature_major()?, &centers)?;
        Ok(squared.into_iter().map(|d| d.max(T::zero()).sqrt()).collect())
    }

    /// Negative weighted inertia of `x` against the fitted centroids.
    pub fn score<X>(&mut self, x: &X, sample_weight: Option<&[T]>) -> Result<T, KMeansError>
    where
        X: SampleMatrix<T> + ?Sized,
    {
        let centers = self.fitted()?.clone();
        let x_t = x.to_feature_major()?;
        let weights = match sample_weight {
            Some(w) => w.to_vec(),
            None => vec![T::one(); x_t.n_items()],
        };
        Ok(-self.driver.inertia(&x_t, &weights, &centers)?)
    }

    /// Fitted centroids, row-major `n_clusters × n_features`.
    pub fn cluster_centers(&self) -> Option<Vec<T>> {
        self.centroids.as_ref().map(FeatureMajor::to_rows)
    }

    /// Driver configuration.
    pub fn config(&self) -> &LloydConfig {
        self.driver.config()
    }

    fn fitted(&self) -> Result<&FeatureMajor<T>, KMeansError> {
        self.centroids.as_ref().ok_or_else(|| {
            KMeansError::InvalidInput("model is not fitted; call fit first".to_string())
        })
    }
}
