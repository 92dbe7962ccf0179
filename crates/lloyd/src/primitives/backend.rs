//! Execution backend selection.
//!
//! ## Purpose
//!
//! This module defines the `Backend` enum used to select where the fused
//! assignment+update kernel runs. All other kernels always run through the
//! work-group execution model on the host.
//!
//! ## Key concepts
//!
//! * **CPU**: Work-groups dispatched across host threads (rayon when `cpu` is enabled).
//! * **GPU**: The fused kernel is compiled to WGSL and dispatched through wgpu
//!   (requires the `gpu` feature, f32 only).
//!
//! ## Invariants
//!
//! * The default backend is always `CPU`.

/// Execution backend for the fused Lloyd kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum Backend {
    /// Host execution of the work-group model.
    #[default]
    CPU,

    /// wgpu execution of the fused kernel.
    GPU,
}

impl Backend {
    /// Human-readable backend name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CPU => "CPU",
            Self::GPU => "GPU",
        }
    }
}
