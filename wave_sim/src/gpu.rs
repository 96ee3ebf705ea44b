//! wgpu compute backend for field evaluation
//!
//! Each launch writes the snapshot's coefficients into a uniform block,
//! dispatches `evaluate_field`, copies the result into a per-job staging
//! buffer and maps it asynchronously. The map callback only signals; the
//! bytes are read and forwarded from `maintain`, which the dispatcher calls on
//! every poll.

use crate::dispatch::{CompletionSink, ComputeBackend, FieldCompletion, FieldJob, FieldRequest};
use crate::error::EngineError;
use crate::params::SimulationParameters;
use crate::physics::{FieldCoefficients, FieldShape};
use crate::snapshot::FieldSnapshot;
use std::sync::{mpsc, Arc};

/// Compute entry point in `shaders/field.wgsl`
pub const FIELD_ENTRY_POINT: &str = "evaluate_field";

const WORKGROUP_SIZE: u32 = 64;
/// One vec2<f32> per grid point
const FIELD_STRIDE: usize = std::mem::size_of::<[f32; 2]>();

pub const SHAPE_PACKET: u32 = 0;
pub const SHAPE_WELL: u32 = 1;
pub const SHAPE_OSCILLATOR: u32 = 2;
pub const SHAPE_RADIAL: u32 = 3;
pub const SHAPE_VANISHING: u32 = 4;

/// Uniform block consumed by `evaluate_field`
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuFieldUniforms {
    pub shape: u32,
    pub grid_points: u32,
    /// Well quantum number, Hermite degree or Laguerre degree
    pub degree: u32,
    /// Laguerre order 2l+1
    pub order: u32,
    pub x_start: f32,
    pub dx: f32,
    pub amplitude: f32,
    pub phase: f32,
    pub center: f32,
    pub spread: f32,
    pub wave_number: f32,
    pub angular: u32,
    pub barrier_start: f32,
    pub barrier_end: f32,
    pub barrier_decay: f32,
    pub barrier_transmitted: f32,
    pub barrier_enabled: u32,
    pub _pad: [u32; 3],
}

impl GpuFieldUniforms {
    pub fn new(coefficients: &FieldCoefficients, params: &SimulationParameters) -> Self {
        let scale = coefficients.length_scale;
        let mut uniforms = Self {
            grid_points: params.grid_points,
            x_start: (params.domain.0 / scale) as f32,
            dx: (params.grid_spacing() / scale) as f32,
            amplitude: coefficients.amplitude as f32,
            phase: coefficients.phase as f32,
            ..Default::default()
        };

        match coefficients.shape {
            FieldShape::WavePacket {
                center,
                spread,
                wave_number,
                barrier,
            } => {
                uniforms.shape = SHAPE_PACKET;
                uniforms.center = center as f32;
                uniforms.spread = spread as f32;
                uniforms.wave_number = wave_number as f32;
                if let Some(barrier) = barrier {
                    uniforms.barrier_enabled = 1;
                    uniforms.barrier_start = barrier.start as f32;
                    uniforms.barrier_end = barrier.end as f32;
                    uniforms.barrier_decay = barrier.decay as f32;
                    uniforms.barrier_transmitted = barrier.transmitted as f32;
                }
            }
            FieldShape::Well { quantum_number } => {
                uniforms.shape = SHAPE_WELL;
                uniforms.degree = quantum_number;
            }
            FieldShape::Oscillator { degree } => {
                uniforms.shape = SHAPE_OSCILLATOR;
                uniforms.degree = degree;
            }
            FieldShape::Radial {
                degree,
                order,
                angular,
            } => {
                uniforms.shape = SHAPE_RADIAL;
                uniforms.degree = degree;
                uniforms.order = order;
                uniforms.angular = angular;
            }
            FieldShape::Vanishing => uniforms.shape = SHAPE_VANISHING,
        }
        uniforms
    }
}

struct InFlight {
    job: FieldJob,
    staging: wgpu::Buffer,
    sink: CompletionSink,
}

type MapSignal = (u64, Result<(), wgpu::BufferAsyncError>);

pub struct GpuFieldBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::ComputePipeline,
    bind_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    field_buffer: wgpu::Buffer,
    /// Grid points `field_buffer` can hold
    field_capacity: usize,
    in_flight: Vec<InFlight>,
    mapped_tx: mpsc::Sender<MapSignal>,
    mapped_rx: mpsc::Receiver<MapSignal>,
}

impl GpuFieldBackend {
    /// Build on a dedicated headless device
    pub fn headless() -> Result<Self, EngineError> {
        let ctx = pollster::block_on(common::ComputeContext::new())?;
        log::info!("headless field compute on {}", ctx.adapter_name);
        Self::new(ctx.device, ctx.queue)
    }

    /// Build on an existing device, e.g. the one the renderer draws with
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Result<Self, EngineError> {
        Self::with_kernel(device, queue, include_str!("shaders/field.wgsl"), FIELD_ENTRY_POINT)
    }

    /// Build from explicit WGSL source and entry point.
    ///
    /// Compilation or entry-point failures are reported as
    /// `EngineError::KernelUnavailable` instead of reaching the device's
    /// uncaptured-error handler.
    pub fn with_kernel(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        source: &str,
        entry_point: &str,
    ) -> Result<Self, EngineError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("field.wgsl"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bind.field"),
            entries: &[
                // coefficients
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<GpuFieldUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
                // out field
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pipe.field"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(entry_point),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point,
            compilation_options: Default::default(),
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(EngineError::KernelUnavailable {
                entry_point: entry_point.to_string(),
                reason: err.to_string(),
            });
        }

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("field.uniforms"),
            size: std::mem::size_of::<GpuFieldUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let field_capacity = crate::params::DEFAULT_GRID_POINTS as usize;
        let field_buffer = create_field_buffer(&device, field_capacity);
        let (mapped_tx, mapped_rx) = mpsc::channel();

        log::info!("field kernel `{entry_point}` ready");

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_layout,
            uniform_buffer,
            field_buffer,
            field_capacity,
            in_flight: Vec::new(),
            mapped_tx,
            mapped_rx,
        })
    }

    /// Evaluate one snapshot and wait for it. Intended for tools and tests;
    /// the render loop goes through the dispatcher instead.
    pub fn evaluate_blocking(
        &mut self,
        params: &SimulationParameters,
        time: f64,
    ) -> Result<FieldSnapshot, EngineError> {
        let (sink, results) = mpsc::channel();
        let request = FieldRequest {
            params: params.clone(),
            time,
            revision: 0,
        };
        self.launch(FieldJob { id: u64::MAX, request }, sink)?;
        self.device.poll(wgpu::Maintain::Wait);
        self.maintain();
        results
            .recv()
            .map_err(|e| EngineError::ComputeFailed(e.to_string()))?
            .result
    }

    /// Grow the output buffer with headroom; buffers still referenced by
    /// submitted work stay alive until the GPU is done with them.
    fn ensure_capacity(&mut self, points: usize) {
        if points <= self.field_capacity {
            return;
        }
        let capacity = points + points / 2;
        log::debug!("growing field buffer {} -> {capacity} points", self.field_capacity);
        self.field_buffer = create_field_buffer(&self.device, capacity);
        self.field_capacity = capacity;
    }
}

impl ComputeBackend for GpuFieldBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn launch(&mut self, job: FieldJob, sink: CompletionSink) -> Result<(), EngineError> {
        let params = &job.request.params;
        let points = params.grid_points as usize;
        self.ensure_capacity(points);

        let coefficients = FieldCoefficients::new(params, job.request.time);
        let uniforms = GpuFieldUniforms::new(&coefficients, params);
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("bg.field"),
            layout: &self.bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.field_buffer.as_entire_binding(),
                },
            ],
        });

        let size = (points * FIELD_STRIDE) as u64;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("field.staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("enc.field") });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("cpass.field"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups((points as u32).div_ceil(WORKGROUP_SIZE), 1, 1);
        }
        encoder.copy_buffer_to_buffer(&self.field_buffer, 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let signal = self.mapped_tx.clone();
        let job_id = job.id;
        staging.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            let _ = signal.send((job_id, result));
        });

        self.in_flight.push(InFlight { job, staging, sink });
        Ok(())
    }

    fn maintain(&mut self) {
        self.device.poll(wgpu::Maintain::Poll);

        while let Ok((job_id, mapped)) = self.mapped_rx.try_recv() {
            let Some(index) = self.in_flight.iter().position(|f| f.job.id == job_id) else {
                continue;
            };
            let flight = self.in_flight.swap_remove(index);
            let result = match mapped {
                Ok(()) => Ok(read_field(&flight)),
                Err(err) => Err(EngineError::ComputeFailed(err.to_string())),
            };
            let _ = flight.sink.send(FieldCompletion {
                job_id,
                request: flight.job.request,
                result,
            });
        }
    }
}

fn read_field(flight: &InFlight) -> FieldSnapshot {
    let (real, imag): (Vec<f64>, Vec<f64>) = {
        let data = flight.staging.slice(..).get_mapped_range();
        let values: &[[f32; 2]] = bytemuck::cast_slice(&data);
        values.iter().map(|v| (v[0] as f64, v[1] as f64)).unzip()
    };
    flight.staging.unmap();
    FieldSnapshot::from_components(flight.job.request.time, real, imag)
}

fn create_field_buffer(device: &wgpu::Device, points: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("field.values"),
        size: (points * FIELD_STRIDE) as u64,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    })
}
