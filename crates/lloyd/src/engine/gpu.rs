//! wgpu execution of the fused assignment+update kernel.
//!
//! ## Purpose
//!
//! This module compiles the fused Lloyd kernel to WGSL and dispatches it on a
//! wgpu device. The kernel writes assignments and fills the private centroid
//! copies; the host then continues with the reduction, relocation and
//! division steps exactly as on the CPU backend.
//!
//! ## Design notes
//!
//! * **Specialization**: Work-group size and window dimensions are baked
//!   into the shader as constants; the pipeline is rebuilt when they change.
//! * **Privatization**: Group `g` accumulates into copy `g mod K` with a
//!   compare-exchange float add on 32-bit atomics.
//!
//! ## Invariants
//!
//! * Only 32-bit floats are supported; the reported device has no fp64.
//! * The number of work-groups fits in one dispatch dimension.

// External dependencies
use bytemuck::{Pod, Zeroable};
use core::mem::size_of;
use log::debug;
use num_traits::Float;
use pollster::block_on;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingType, Buffer, BufferBindingType, BufferDescriptor, BufferUsages,
    CommandEncoderDescriptor, ComputePassDescriptor, ComputePipeline, ComputePipelineDescriptor,
    Device, DeviceType, Instance, InstanceDescriptor, MapMode, PipelineLayoutDescriptor, PollType,
    Queue, RequestAdapterOptions, ShaderModuleDescriptor, ShaderSource, ShaderStages,
};

// Internal dependencies
use crate::kernels::fused::FusedLloydKernel;
use crate::primitives::buffer::PrivateCopies;
use crate::primitives::device::DeviceParams;
use crate::primitives::errors::KMeansError;
use crate::primitives::matrix::FeatureMajor;

/// Preferred work-group size multiple reported for wgpu devices.
const PREFERRED_MULTIPLE: usize = 32;

// -----------------------------------------------------------------------------
// Shader Source (WGSL)
// -----------------------------------------------------------------------------
const SHADER_TEMPLATE: &str = r#"
struct Params {
    n_samples: u32,
    n_features: u32,
    n_clusters: u32,
    n_copies: u32,
}

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var<storage, read> x_t: array<f32>;
@group(0) @binding(2) var<storage, read> weights: array<f32>;
@group(0) @binding(3) var<storage, read> centroids_t: array<f32>;
@group(0) @binding(4) var<storage, read> half_norms: array<f32>;
@group(0) @binding(5) var<storage, read_write> assignments: array<u32>;
@group(0) @binding(6) var<storage, read_write> sums: array<atomic<u32>>;
@group(0) @binding(7) var<storage, read_write> counts: array<atomic<u32>>;

const WG_SIZE: u32 = $WG_SIZEu;
const WINDOW_C: u32 = $WINDOW_Cu;
const WINDOW_F: u32 = $WINDOW_Fu;
const STRIDE: u32 = WINDOW_C + 1u;

var<workgroup> window: array<f32, WINDOW_F * STRIDE>;
var<workgroup> half_norm_window: array<f32, WINDOW_C>;

fn atomic_add_sum(idx: u32, value: f32) {
    var old = atomicLoad(&sums[idx]);
    loop {
        let updated = bitcast<u32>(bitcast<f32>(old) + value);
        let result = atomicCompareExchangeWeak(&sums[idx], old, updated);
        if (result.exchanged) {
            break;
        }
        old = result.old_value;
    }
}

fn atomic_add_count(idx: u32, value: f32) {
    var old = atomicLoad(&counts[idx]);
    loop {
        let updated = bitcast<u32>(bitcast<f32>(old) + value);
        let result = atomicCompareExchangeWeak(&counts[idx], old, updated);
        if (result.exchanged) {
            break;
        }
        old = result.old_value;
    }
}

@compute @workgroup_size(WG_SIZE)
fn fused_lloyd_step(
    @builtin(local_invocation_id) local_id: vec3<u32>,
    @builtin(workgroup_id) group_id: vec3<u32>,
) {
    let lid = local_id.x;
    let sample = group_id.x * WG_SIZE + lid;
    let valid = sample < params.n_samples;
    let n_samples = params.n_samples;
    let n_features = params.n_features;
    let n_clusters = params.n_clusters;
    let n_centroid_windows = (n_clusters + WINDOW_C - 1u) / WINDOW_C;
    let n_feature_windows = (n_features + WINDOW_F - 1u) / WINDOW_F;

    var best_idx = 0u;
    var best = 3.4e38;
    var dots: array<f32, WINDOW_C>;

    for (var cw = 0u; cw < n_centroid_windows; cw++) {
        let c0 = cw * WINDOW_C;
        for (var col = 0u; col < WINDOW_C; col++) {
            dots[col] = 0.0;
        }
        for (var col = lid; col < WINDOW_C; col += WG_SIZE) {
            var v = 0.0;
            if (c0 + col < n_clusters) {
                v = half_norms[c0 + col];
            }
            half_norm_window[col] = v;
        }

        for (var fw = 0u; fw < n_feature_windows; fw++) {
            let f0 = fw * WINDOW_F;
            for (var cell = lid; cell < WINDOW_F * WINDOW_C; cell += WG_SIZE) {
                let row = cell / WINDOW_C;
                let col = cell % WINDOW_C;
                var v = 0.0;
                if (f0 + row < n_features && c0 + col < n_clusters) {
                    v = centroids_t[(f0 + row) * n_clusters + c0 + col];
                }
                window[row * STRIDE + col] = v;
            }
            workgroupBarrier();

            if (valid) {
                let f_ext = min(WINDOW_F, n_features - f0);
                for (var row = 0u; row < f_ext; row++) {
                    let xv = x_t[(f0 + row) * n_samples + sample];
                    for (var col = 0u; col < WINDOW_C; col++) {
                        dots[col] += window[row * STRIDE + col] * xv;
                    }
                }
            }
            workgroupBarrier();
        }

        if (valid) {
            let c_ext = min(WINDOW_C, n_clusters - c0);
            for (var col = 0u; col < c_ext; col++) {
                let pseudo = half_norm_window[col] - dots[col];
                if (pseudo < best) {
                    best = pseudo;
                    best_idx = c0 + col;
                }
            }
        }
        workgroupBarrier();
    }

    if (valid) {
        assignments[sample] = best_idx;
        let copy = group_id.x % params.n_copies;
        let w = weights[sample];
        atomic_add_count(copy * n_clusters + best_idx, w);
        let base = copy * n_features * n_clusters;
        for (var f = 0u; f < n_features; f++) {
            atomic_add_sum(base + f * n_clusters + best_idx, w * x_t[f * n_samples + sample]);
        }
    }
}
"#;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct FusedParams {
    n_samples: u32,
    n_features: u32,
    n_clusters: u32,
    n_copies: u32,
}

/// Shader specialization constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    work_group_size: usize,
    window_n_centroids: usize,
    window_n_features: usize,
}

impl PipelineKey {
    fn shader_source(&self) -> String {
        SHADER_TEMPLATE
            .replace("$WG_SIZE", &self.work_group_size.to_string())
            .replace("$WINDOW_C", &self.window_n_centroids.to_string())
            .replace("$WINDOW_F", &self.window_n_features.to_string())
    }

    fn local_bytes(&self) -> usize {
        4 * (self.window_n_features * (self.window_n_centroids + 1) + self.window_n_centroids)
    }
}

// ============================================================================
// GPU Executor
// ============================================================================

/// wgpu device, fused pipeline and device-side buffers.
#[derive(Debug)]
pub struct GpuExecutor {
    device: Device,
    queue: Queue,
    params: DeviceParams,
    max_dispatch: usize,

    layout: BindGroupLayout,
    pipeline: Option<(PipelineKey, ComputePipeline)>,
    bind_group: Option<BindGroup>,

    // Inputs
    config_buffer: Option<Buffer>,
    x_buffer: Option<Buffer>,
    weights_buffer: Option<Buffer>,
    centroids_buffer: Option<Buffer>,
    half_norms_buffer: Option<Buffer>,

    // Outputs
    assignments_buffer: Option<Buffer>,
    sums_buffer: Option<Buffer>,
    counts_buffer: Option<Buffer>,

    // Staging
    staging_buffer: Option<Buffer>,
}

impl GpuExecutor {
    /// Open the default adapter.
    pub fn new() -> Result<Self, KMeansError> {
        block_on(Self::request())
    }

    async fn request() -> Result<Self, KMeansError> {
        let instance = Instance::new(&InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&RequestAdapterOptions::default())
            .await
            .map_err(|e| KMeansError::DeviceUnavailable(format!("no GPU adapter found: {}", e)))?;

        let (device, queue): (Device, Queue) = adapter
            .request_device(&Default::default())
            .await
            .map_err(|e| KMeansError::DeviceUnavailable(format!("device error: {:?}", e)))?;

        let info = adapter.get_info();
        let limits = device.limits();
        let max_work_group_size = limits
            .max_compute_invocations_per_workgroup
            .min(limits.max_compute_workgroup_size_x) as usize;
        let params = DeviceParams {
            name: info.name.clone(),
            max_work_group_size,
            preferred_work_group_size_multiple: PREFERRED_MULTIPLE.min(max_work_group_size),
            local_mem_size: limits.max_compute_workgroup_storage_size as usize,
            global_mem_cache_size: 0,
            has_fp64: false,
            is_cpu: info.device_type == DeviceType::Cpu,
        };
        debug!("opened wgpu device {:?}", params);

        let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Fused Lloyd Layout"),
            entries: &[
                layout_entry(0, BufferBindingType::Uniform),
                layout_entry(1, BufferBindingType::Storage { read_only: true }),
                layout_entry(2, BufferBindingType::Storage { read_only: true }),
                layout_entry(3, BufferBindingType::Storage { read_only: true }),
                layout_entry(4, BufferBindingType::Storage { read_only: true }),
                layout_entry(5, BufferBindingType::Storage { read_only: false }),
                layout_entry(6, BufferBindingType::Storage { read_only: false }),
                layout_entry(7, BufferBindingType::Storage { read_only: false }),
            ],
        });

        Ok(Self {
            max_dispatch: limits.max_compute_workgroups_per_dimension as usize,
            device,
            queue,
            params,
            layout,
            pipeline: None,
            config_buffer: None,
            x_buffer: None,
            weights_buffer: None,
            centroids_buffer: None,
            half_norms_buffer: None,
            assignments_buffer: None,
            sums_buffer: None,
            counts_buffer: None,
            staging_buffer: None,
            bind_group: None,
        })
    }

    /// Capabilities of the opened device.
    pub fn device_params(&self) -> &DeviceParams {
        &self.params
    }

    /// Run one fused step and download assignments and private copies.
    #[allow(clippy::too_many_arguments)]
    pub fn run_fused<T: Float>(
        &mut self,
        kernel: &FusedLloydKernel,
        x: &FeatureMajor<T>,
        weights: &[T],
        centroids: &FeatureMajor<T>,
        half_norms: &[T],
        assignments: &mut [usize],
        copies: &mut PrivateCopies<T>,
    ) -> Result<(), KMeansError> {
        let key = PipelineKey {
            work_group_size: kernel.work_group_size,
            window_n_centroids: kernel.geometry.window_n_centroids,
            window_n_features: kernel.geometry.window_n_features,
        };
        let n_samples = x.n_items();
        let n_groups = n_samples.div_ceil(key.work_group_size);
        if n_groups > self.max_dispatch {
            return Err(KMeansError::KernelLaunch(format!(
                "{} work-groups exceed the dispatch limit of {}",
                n_groups, self.max_dispatch
            )));
        }
        if key.local_bytes() > self.params.local_mem_size {
            return Err(KMeansError::KernelLaunch(format!(
                "centroid window needs {} bytes of workgroup memory, device offers {}",
                key.local_bytes(),
                self.params.local_mem_size
            )));
        }

        self.ensure_pipeline(key);
        let reallocated = self.upload(
            FusedParams {
                n_samples: n_samples as u32,
                n_features: x.n_features() as u32,
                n_clusters: centroids.n_items() as u32,
                n_copies: copies.n_copies() as u32,
            },
            &to_f32(x.as_slice())?,
            &to_f32(weights)?,
            &to_f32(centroids.as_slice())?,
            &to_f32(half_norms)?,
            copies.sums.len(),
            copies.counts.len(),
        );

        if reallocated || self.bind_group.is_none() {
            self.bind_group = Some(self.create_bind_group()?);
        }

        let (Some((_, pipeline)), Some(bind_group), Some(sums), Some(counts)) = (
            self.pipeline.as_ref(),
            self.bind_group.as_ref(),
            self.sums_buffer.as_ref(),
            self.counts_buffer.as_ref(),
        ) else {
            return Err(KMeansError::KernelLaunch("fused pipeline is not initialised".to_string()));
        };

        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Fused Lloyd Step"),
        });
        encoder.clear_buffer(sums, 0, None);
        encoder.clear_buffer(counts, 0, None);
        {
            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor::default());
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(n_groups as u32, 1, 1);
        }
        self.queue.submit(Some(encoder.finish()));

        let labels: Vec<u32> = block_on(self.download(&self.assignments_buffer, n_samples))?;
        for (out, label) in assignments.iter_mut().zip(labels) {
            *out = label as usize;
        }

        let sums: Vec<f32> = block_on(self.download(&self.sums_buffer, copies.sums.len()))?;
        from_f32(&sums, &mut copies.sums)?;
        let counts: Vec<f32> = block_on(self.download(&self.counts_buffer, copies.counts.len()))?;
        from_f32(&counts, &mut copies.counts)?;

        Ok(())
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) {
        if matches!(&self.pipeline, Some((cached, _)) if *cached == key) {
            return;
        }

        debug!("compiling fused Lloyd shader for {:?}", key);
        let shader = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Fused Lloyd Shader"),
            source: ShaderSource::Wgsl(key.shader_source().into()),
        });
        let pipeline_layout = self.device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Fused Lloyd Pipeline Layout"),
            bind_group_layouts: &[&self.layout],
            ..Default::default()
        });
        let pipeline = self.device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("fused_lloyd_step"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("fused_lloyd_step"),
            compilation_options: Default::default(),
            cache: None,
        });
        self.pipeline = Some((key, pipeline));
    }

    #[allow(clippy::too_many_arguments)]
    fn upload(
        &mut self,
        config: FusedParams,
        x: &[f32],
        weights: &[f32],
        centroids: &[f32],
        half_norms: &[f32],
        sums_len: usize,
        counts_len: usize,
    ) -> bool {
        let input = BufferUsages::STORAGE | BufferUsages::COPY_DST;
        let output = BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST;
        let uniform = BufferUsages::UNIFORM | BufferUsages::COPY_DST;
        let bytes = |len: usize| (len.max(1) * 4) as u64;
        let device = &self.device;

        let mut reallocated = false;
        reallocated |= Self::ensure_buffer_capacity(
            device,
            "Config",
            &mut self.config_buffer,
            size_of::<FusedParams>() as u64,
            uniform,
        );
        reallocated |=
            Self::ensure_buffer_capacity(device, "X", &mut self.x_buffer, bytes(x.len()), input);
        reallocated |= Self::ensure_buffer_capacity(
            device,
            "Weights",
            &mut self.weights_buffer,
            bytes(weights.len()),
            input,
        );
        reallocated |= Self::ensure_buffer_capacity(
            device,
            "Centroids",
            &mut self.centroids_buffer,
            bytes(centroids.len()),
            input,
        );
        reallocated |= Self::ensure_buffer_capacity(
            device,
            "Half Norms",
            &mut self.half_norms_buffer,
            bytes(half_norms.len()),
            input,
        );
        reallocated |= Self::ensure_buffer_capacity(
            device,
            "Assignments",
            &mut self.assignments_buffer,
            bytes(weights.len()),
            output,
        );
        reallocated |= Self::ensure_buffer_capacity(
            device,
            "Sums",
            &mut self.sums_buffer,
            bytes(sums_len),
            output,
        );
        reallocated |= Self::ensure_buffer_capacity(
            device,
            "Counts",
            &mut self.counts_buffer,
            bytes(counts_len),
            output,
        );

        // The staging buffer is not bound, so it never invalidates the bind group.
        let staging_len = weights.len().max(sums_len).max(counts_len);
        Self::ensure_buffer_capacity(
            device,
            "Staging",
            &mut self.staging_buffer,
            bytes(staging_len),
            BufferUsages::MAP_READ | BufferUsages::COPY_DST,
        );

        let write = |buffer: &Option<Buffer>, data: &[u8]| {
            if let Some(buffer) = buffer {
                self.queue.write_buffer(buffer, 0, data);
            }
        };
        write(&self.config_buffer, bytemuck::bytes_of(&config));
        write(&self.x_buffer, bytemuck::cast_slice(x));
        write(&self.weights_buffer, bytemuck::cast_slice(weights));
        write(&self.centroids_buffer, bytemuck::cast_slice(centroids));
        write(&self.half_norms_buffer, bytemuck::cast_slice(half_norms));
        reallocated
    }

    /// Bind every device buffer to the fused pipeline layout.
    fn create_bind_group(&self) -> Result<BindGroup, KMeansError> {
        Ok(self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("Fused Lloyd Bind Group"),
            layout: &self.layout,
            entries: &[
                bind_entry(0, &self.config_buffer)?,
                bind_entry(1, &self.x_buffer)?,
                bind_entry(2, &self.weights_buffer)?,
                bind_entry(3, &self.centroids_buffer)?,
                bind_entry(4, &self.half_norms_buffer)?,
                bind_entry(5, &self.assignments_buffer)?,
                bind_entry(6, &self.sums_buffer)?,
                bind_entry(7, &self.counts_buffer)?,
            ],
        }))
    }

    /// Grow `buffer_opt` to `size_required` bytes; `true` when it was recreated.
    fn ensure_buffer_capacity(
        device: &Device,
        label: &str,
        buffer_opt: &mut Option<Buffer>,
        size_required: u64,
        usage: BufferUsages,
    ) -> bool {
        if buffer_opt.as_ref().is_some_and(|buffer| buffer.size() >= size_required) {
            return false;
        }
        *buffer_opt = Some(device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size: size_required,
            usage,
            mapped_at_creation: false,
        }));
        true
    }

    async fn download<P: Pod>(
        &self,
        buffer: &Option<Buffer>,
        len: usize,
    ) -> Result<Vec<P>, KMeansError> {
        let (Some(buffer), Some(staging)) = (buffer.as_ref(), self.staging_buffer.as_ref()) else {
            return Err(KMeansError::KernelLaunch(
                "download from an unallocated buffer".to_string(),
            ));
        };
        let size = (len * size_of::<P>()) as u64;

        let mut encoder = self.device.create_command_encoder(&Default::default());
        encoder.copy_buffer_to_buffer(buffer, 0, staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..size);
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        slice.map_async(MapMode::Read, move |v| {
            let _ = tx.send(v);
        });
        let _ = self.device.poll(PollType::Wait {
            submission_index: None,
            timeout: None,
        });

        match rx.receive().await {
            Some(Ok(())) => {
                let data = slice.get_mapped_range();
                let ret = bytemuck::cast_slice(&data).to_vec();
                drop(data);
                staging.unmap();
                Ok(ret)
            }
            Some(Err(e)) => Err(KMeansError::KernelLaunch(format!("buffer mapping failed: {}", e))),
            None => Err(KMeansError::KernelLaunch("buffer mapping was cancelled".to_string())),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn layout_entry(binding: u32, ty: BufferBindingType) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::COMPUTE,
        ty: BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn bind_entry(binding: u32, buffer: &Option<Buffer>) -> Result<BindGroupEntry<'_>, KMeansError> {
    let buffer = buffer
        .as_ref()
        .ok_or_else(|| KMeansError::KernelLaunch(format!("binding {} has no buffer", binding)))?;
    Ok(BindGroupEntry {
        binding,
        resource: buffer.as_entire_binding(),
    })
}

fn to_f32<T: Float>(values: &[T]) -> Result<Vec<f32>, KMeansError> {
    values
        .iter()
        .map(|v| {
            v.to_f32().ok_or_else(|| {
                KMeansError::InvalidNumericValue("value not representable as f32".to_string())
            })
        })
        .collect()
}

fn from_f32<T: Float>(values: &[f32], out: &mut [T]) -> Result<(), KMeansError> {
    for (o, &v) in out.iter_mut().zip(values) {
        *o = T::from(v)
            .ok_or_else(|| KMeansError::InvalidNumericValue(format!("{} not representable", v)))?;
    }
    Ok(())
}
