//! Headless rendering for capture runs without a window

use wgpu::util::DeviceExt;

use crate::anim::particles::ParticleVertex;
use crate::anim::scene::{Scene, Surface};
use crate::anim::surface::SurfaceVertex;
use crate::capture::FrameImage;
use crate::config::{SimulationConfig, SurfaceKind};
use crate::render::camera::Camera;
use crate::render::pipeline::{RenderPipeline, WaveUniform};
use crate::runloop::{DrawError, DrawTarget};

/// Offscreen render pipeline. Renders the same scene as the windowed
/// pipeline into an RGBA texture that can be read back directly.
pub struct HeadlessRenderPipeline {
    device: wgpu::Device,
    queue: wgpu::Queue,
    texture: wgpu::Texture,
    depth_texture: wgpu::TextureView,
    width: u32,
    height: u32,
    surface_pipeline: wgpu::RenderPipeline,
    particle_pipeline: wgpu::RenderPipeline,
    surface_vertex: wgpu::Buffer,
    surface_index: wgpu::Buffer,
    surface_index_count: u32,
    grid_surface: bool,
    particle_buffer: wgpu::Buffer,
    particle_count: u32,
    camera_buffer: wgpu::Buffer,
    wave_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    pub camera: Camera,
}

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

impl HeadlessRenderPipeline {
    /// Create a headless pipeline, or None when no adapter is available.
    /// Callers (tests in particular) skip gracefully on None.
    pub async fn new(
        width: u32,
        height: u32,
        sim_config: &SimulationConfig,
        scene: &Scene,
    ) -> Option<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    label: Some("Headless Device"),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .ok()?;

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Headless Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth_texture = Self::create_depth_texture(&device, width, height);

        let camera = Camera::new(width as f32 / height as f32);

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera.uniform()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let wave_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Wave Buffer"),
            contents: bytemuck::cast_slice(&[WaveUniform::from_scene(scene)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = RenderPipeline::bind_group_layout(&device);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wave_buffer.as_entire_binding(),
                },
            ],
            label: Some("headless_bind_group"),
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Headless Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let grid_surface = matches!(sim_config.surface.kind, SurfaceKind::Grid);
        let surface_pipeline = if grid_surface {
            RenderPipeline::build_pipeline(
                &device,
                &pipeline_layout,
                &shader,
                TARGET_FORMAT,
                "vs_grid",
                "fs_grid",
                wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        offset: 0,
                        shader_location: 0,
                        format: wgpu::VertexFormat::Float32x3,
                    }],
                },
                wgpu::PrimitiveTopology::LineList,
            )
        } else {
            RenderPipeline::build_pipeline(
                &device,
                &pipeline_layout,
                &shader,
                TARGET_FORMAT,
                "vs_surface",
                "fs_surface",
                SurfaceVertex::buffer_layout(),
                wgpu::PrimitiveTopology::TriangleList,
            )
        };
        let particle_pipeline = RenderPipeline::build_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            TARGET_FORMAT,
            "vs_particle",
            "fs_particle",
            ParticleVertex::buffer_layout(),
            wgpu::PrimitiveTopology::PointList,
        );

        let (surface_vertex, surface_index, surface_index_count) = match &scene.surface {
            Surface::Plane(mesh) => (
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Plane Vertex Buffer"),
                    contents: mesh.vertex_bytes(),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Plane Index Buffer"),
                    contents: mesh.index_bytes(),
                    usage: wgpu::BufferUsages::INDEX,
                }),
                mesh.indices.len() as u32,
            ),
            Surface::Grid(grid) => (
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Grid Vertex Buffer"),
                    contents: grid.position_bytes(),
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                }),
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Grid Index Buffer"),
                    contents: grid.index_bytes(),
                    usage: wgpu::BufferUsages::INDEX,
                }),
                grid.indices.len() as u32,
            ),
        };

        let particle_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Buffer"),
            contents: scene.particles.vertex_bytes(),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        Some(Self {
            device,
            queue,
            texture,
            depth_texture,
            width,
            height,
            surface_pipeline,
            particle_pipeline,
            surface_vertex,
            surface_index,
            surface_index_count,
            grid_surface,
            particle_buffer,
            particle_count: scene.particles.count() as u32,
            camera_buffer,
            wave_buffer,
            bind_group,
            camera,
        })
    }

    fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Headless Depth Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn read_back(&self) -> Result<FrameImage, DrawError> {
        let bytes_per_pixel = 4u32;
        let unpadded_bytes_per_row = self.width * bytes_per_pixel;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: u64::from(padded_bytes_per_row * self.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(DrawError::Readback(format!("map failed: {:?}", e))),
            Err(_) => return Err(DrawError::Readback("map callback dropped".to_string())),
        }

        let data = buffer_slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((self.width * self.height * bytes_per_pixel) as usize);
        for row in 0..self.height {
            let start = (row * padded_bytes_per_row) as usize;
            let end = start + (self.width * bytes_per_pixel) as usize;
            pixels.extend_from_slice(&data[start..end]);
        }
        drop(data);
        staging_buffer.unmap();

        Ok(FrameImage::new(self.width, self.height, pixels))
    }
}

impl DrawTarget for HeadlessRenderPipeline {
    fn draw(
        &mut self,
        scene: &mut Scene,
        capture: bool,
    ) -> Result<Option<FrameImage>, DrawError> {
        self.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::cast_slice(&[self.camera.uniform()]),
        );
        self.queue.write_buffer(
            &self.wave_buffer,
            0,
            bytemuck::cast_slice(&[WaveUniform::from_scene(scene)]),
        );
        if scene.is_dirty() {
            if let Surface::Grid(grid) = &scene.surface {
                if self.grid_surface {
                    self.queue
                        .write_buffer(&self.surface_vertex, 0, grid.position_bytes());
                }
            }
            self.queue
                .write_buffer(&self.particle_buffer, 0, scene.particles.vertex_bytes());
            scene.mark_uploaded();
        }

        let view = self
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Headless Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Headless Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.0,
                            g: 0.0,
                            b: 0.02,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(&self.surface_pipeline);
            render_pass.set_bind_group(0, &self.bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.surface_vertex.slice(..));
            render_pass.set_index_buffer(self.surface_index.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..self.surface_index_count, 0, 0..1);

            render_pass.set_pipeline(&self.particle_pipeline);
            render_pass.set_bind_group(0, &self.bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.particle_buffer.slice(..));
            render_pass.draw(0..self.particle_count, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        if capture {
            self.read_back().map(Some)
        } else {
            Ok(None)
        }
    }

    fn set_viewport_size(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 && (width, height) != (self.width, self.height) {
            self.width = width;
            self.height = height;
            self.texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Headless Target"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: TARGET_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            });
            self.depth_texture = Self::create_depth_texture(&self.device, width, height);
            self.camera.set_aspect(width as f32 / height as f32);
        }
    }

    fn viewport_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
