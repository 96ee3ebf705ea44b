//! Ribbon renderer
//!
//! Draws whatever frame `MeshExchange` currently publishes. The GPU vertex
//! buffer grows with headroom like the CPU staging frames; if the device runs
//! out of memory while growing, the upload is skipped and the previous
//! buffer keeps drawing.

use crate::error::EngineError;
use crate::mesh::{MeshExchange, MeshVertex};
use common::{Camera2D, CameraUniform, GraphicsContext};

const VERTEX_SIZE: u64 = std::mem::size_of::<MeshVertex>() as u64;

pub struct MeshRenderer {
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    /// Vertices `vertex_buffer` can hold
    capacity: usize,
    vertex_count: u32,
    uploaded_generation: u64,
    growth_factor: f32,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
}

impl MeshRenderer {
    pub fn new(ctx: &GraphicsContext, initial_vertices: usize, growth_factor: f32) -> Self {
        let device = &ctx.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("mesh.wgsl"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/mesh.wgsl").into()),
        });

        let camera = Camera2D::new(ctx.aspect_ratio());
        let camera_buffer = common::create_uniform_buffer(
            device,
            "Camera Buffer",
            &CameraUniform::from_camera_2d(&camera),
        );

        let camera_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Camera Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[&camera_bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Mesh Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[MeshVertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let capacity = initial_vertices.max(1);
        let vertex_buffer = create_vertex_buffer(device, capacity);

        Self {
            pipeline,
            vertex_buffer,
            capacity,
            vertex_count: 0,
            uploaded_generation: 0,
            growth_factor,
            camera_buffer,
            camera_bind_group,
        }
    }

    pub fn update_camera(&self, queue: &wgpu::Queue, camera: &Camera2D) {
        let uniform = CameraUniform::from_camera_2d(camera);
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    /// Upload the published frame if it is newer than the last upload.
    ///
    /// Returns `Ok(true)` when new vertices were uploaded. A failed buffer
    /// reallocation leaves the previous vertices in place.
    pub fn sync(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        exchange: &MeshExchange,
    ) -> Result<bool, EngineError> {
        if exchange.generation() == self.uploaded_generation {
            return Ok(false);
        }

        exchange.read(|frame| -> Result<bool, EngineError> {
            let needed = frame.vertices.len();
            if needed > self.capacity {
                self.grow(device, needed)?;
            }
            if needed > 0 {
                queue.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&frame.vertices));
            }
            self.vertex_count = needed as u32;
            self.uploaded_generation = frame.generation;
            Ok(true)
        })
    }

    fn grow(&mut self, device: &wgpu::Device, needed: usize) -> Result<(), EngineError> {
        let target = ((needed as f64) * self.growth_factor as f64).ceil() as usize;

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = create_vertex_buffer(device, target);
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            log::warn!("vertex buffer growth to {target} failed: {err}");
            return Err(EngineError::MeshAllocation { vertices: target });
        }

        log::debug!("vertex buffer grown {} -> {target}", self.capacity);
        self.vertex_buffer = buffer;
        self.capacity = target;
        Ok(())
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView, clear: bool) {
        let load_op = if clear {
            wgpu::LoadOp::Clear(wgpu::Color {
                r: 0.02,
                g: 0.02,
                b: 0.08,
                a: 1.0,
            })
        } else {
            wgpu::LoadOp::Load
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Mesh Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: load_op,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if self.vertex_count == 0 {
            return;
        }
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.draw(0..self.vertex_count, 0..1);
    }
}

fn create_vertex_buffer(device: &wgpu::Device, vertices: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Mesh Vertex Buffer"),
        size: vertices as u64 * VERTEX_SIZE,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
