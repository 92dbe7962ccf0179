//! Device capability parameters.
//!
//! ## Purpose
//!
//! This module describes the capabilities of the device the kernels are
//! sized for: work-group limits, preferred SIMD width, local (shared) memory
//! capacity and global memory cache size. The kernel plan derives every
//! tiling and privatization decision from these values.
//!
//! ## Design notes
//!
//! * **Probe failures are recoverable**: An unknown (zero) cache size is
//!   replaced by a conservative default and a warning is logged.
//! * **CPU oversubscription**: Host devices advertise very large work-groups.
//!   Kernels whose local memory scales with the group size cap it with
//!   [`DeviceParams::capped_work_group_size`].
//!
//! ## Invariants
//!
//! * `preferred_work_group_size_multiple` and `max_work_group_size` are non-zero.
//!
//! ## Non-goals
//!
//! * This module does not enumerate or select among several devices.

// External dependencies
use log::warn;

// ============================================================================
// Constants
// ============================================================================

/// Cache size assumed when the device cannot report one (1 MiB).
pub const DEFAULT_GLOBAL_MEM_CACHE_SIZE: usize = 1 << 20;

/// Local memory kept free when capping host work-group sizes.
pub const MIN_UNALLOCATED_LOCAL_MEM: usize = 1024;

// ============================================================================
// Device Parameters
// ============================================================================

/// Capabilities of the device executing the kernels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceParams {
    /// Human-readable device name.
    pub name: String,

    /// Maximum number of work items in one work-group.
    pub max_work_group_size: usize,

    /// Preferred multiple of the work-group size (SIMD / warp width).
    pub preferred_work_group_size_multiple: usize,

    /// Local (shared) memory available to one work-group, in bytes.
    pub local_mem_size: usize,

    /// Global memory cache size in bytes (0 when unknown).
    pub global_mem_cache_size: usize,

    /// Whether 64-bit floating point arithmetic is supported.
    pub has_fp64: bool,

    /// Whether the device is a host CPU.
    pub is_cpu: bool,
}

impl Default for DeviceParams {
    fn default() -> Self {
        Self::cpu()
    }
}

impl DeviceParams {
    /// Probe the host CPU.
    pub fn cpu() -> Self {
        Self {
            name: format!("host cpu ({} threads)", host_threads()),
            max_work_group_size: 8192,
            preferred_work_group_size_multiple: 32,
            local_mem_size: 32 * 1024,
            global_mem_cache_size: 0,
            has_fp64: true,
            is_cpu: true,
        }
    }

    /// Global memory cache size, falling back to 1 MiB when the probe failed.
    pub fn resolved_global_mem_cache_size(&self) -> usize {
        if self.global_mem_cache_size > 0 {
            return self.global_mem_cache_size;
        }

        warn!(
            "cannot inspect the global memory cache size of device '{}'; \
             continuing with a default of {} bytes",
            self.name, DEFAULT_GLOBAL_MEM_CACHE_SIZE
        );
        DEFAULT_GLOBAL_MEM_CACHE_SIZE
    }

    /// Whether the device computes with items of `itemsize` bytes.
    pub fn supports_itemsize(&self, itemsize: usize) -> bool {
        itemsize <= 4 || self.has_fp64
    }

    /// Largest work-group size whose local memory fits on this device.
    ///
    /// Only host devices are capped; accelerators return `max_work_group_size`.
    pub fn capped_work_group_size(
        &self,
        local_bytes_per_item: usize,
        local_bytes_constant: usize,
    ) -> usize {
        if !self.is_cpu || local_bytes_per_item == 0 {
            return self.max_work_group_size;
        }

        let available = self
            .local_mem_size
            .saturating_sub(local_bytes_constant)
            .saturating_sub(MIN_UNALLOCATED_LOCAL_MEM);
        (available / local_bytes_per_item).min(self.max_work_group_size)
    }
}

fn host_threads() -> usize {
    #[cfg(feature = "cpu")]
    {
        rayon::current_num_threads()
    }
    #[cfg(not(feature = "cpu"))]
    {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}
