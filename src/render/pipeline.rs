//! wgpu render pipeline for the windowed wavefield view

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::anim::particles::ParticleVertex;
use crate::anim::scene::{Scene, Surface};
use crate::anim::surface::SurfaceVertex;
use crate::anim::Deformation;
use crate::capture::FrameImage;
use crate::config::{SimulationConfig, SurfaceKind};
use crate::render::camera::Camera;
use crate::runloop::{DrawError, DrawTarget};

/// Wave uniform: the scalar time plus the traveling-wave parameters the
/// vertex shader needs. Time is the only value that changes per frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct WaveUniform {
    pub time: f32,
    pub amplitude: f32,
    pub frequency: f32,
    pub _padding: f32,
}

impl WaveUniform {
    pub(crate) fn from_scene(scene: &Scene) -> Self {
        let (amplitude, frequency) = match scene.surface_wave {
            Deformation::Travelling {
                amplitude,
                frequency,
            } => (amplitude, frequency),
            // Grid variants deform CPU-side; the uniform is inert
            Deformation::CrossWave { .. } => (0.0, 0.0),
        };
        Self {
            time: scene.time,
            amplitude,
            frequency,
            _padding: 0.0,
        }
    }
}

/// GPU buffers for whichever surface variant the scene uses.
enum SurfaceBuffers {
    /// Static plane geometry; deformation happens in the vertex shader
    Plane {
        vertex: wgpu::Buffer,
        index: wgpu::Buffer,
        index_count: u32,
    },
    /// Grid positions rewritten from the CPU every frame
    Grid {
        vertex: wgpu::Buffer,
        index: wgpu::Buffer,
        index_count: u32,
    },
}

/// Main render pipeline for the windowed view
pub struct RenderPipeline {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    surface_pipeline: wgpu::RenderPipeline,
    particle_pipeline: wgpu::RenderPipeline,
    surface_buffers: SurfaceBuffers,
    particle_buffer: wgpu::Buffer,
    particle_count: u32,
    camera_buffer: wgpu::Buffer,
    wave_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    depth_texture: wgpu::TextureView,
    /// Swapchain formats are commonly BGRA; readback converts to RGBA
    swap_bgra: bool,
    pub camera: Camera,
}

impl RenderPipeline {
    /// Create a new render pipeline for a window
    pub async fn new(
        window: std::sync::Arc<winit::window::Window>,
        sim_config: &SimulationConfig,
        scene: &Scene,
    ) -> Self {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone()).unwrap();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .unwrap();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    label: Some("Wavefield Device"),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .unwrap();

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);
        let swap_bgra = matches!(
            surface_format,
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
        );

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let camera = Camera::new(config.width as f32 / config.height as f32);

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

        let bind_group_layout = Self::bind_group_layout(&device);
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
            label: Some("scene_bind_group"),
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let surface_pipeline = match sim_config.surface.kind {
            SurfaceKind::Plane => Self::build_pipeline(
                &device,
                &pipeline_layout,
                &shader,
                surface_format,
                "vs_surface",
                "fs_surface",
                SurfaceVertex::buffer_layout(),
                wgpu::PrimitiveTopology::TriangleList,
            ),
            SurfaceKind::Grid => Self::build_pipeline(
                &device,
                &pipeline_layout,
                &shader,
                surface_format,
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
            ),
        };

        let particle_pipeline = Self::build_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            surface_format,
            "vs_particle",
            "fs_particle",
            ParticleVertex::buffer_layout(),
            wgpu::PrimitiveTopology::PointList,
        );

        let surface_buffers = match &scene.surface {
            Surface::Plane(mesh) => {
                let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Plane Vertex Buffer"),
                    contents: mesh.vertex_bytes(),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Plane Index Buffer"),
                    contents: mesh.index_bytes(),
                    usage: wgpu::BufferUsages::INDEX,
                });
                SurfaceBuffers::Plane {
                    vertex,
                    index,
                    index_count: mesh.indices.len() as u32,
                }
            }
            Surface::Grid(grid) => {
                let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Grid Vertex Buffer"),
                    contents: grid.position_bytes(),
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                });
                let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Grid Index Buffer"),
                    contents: grid.index_bytes(),
                    usage: wgpu::BufferUsages::INDEX,
                });
                SurfaceBuffers::Grid {
                    vertex,
                    index,
                    index_count: grid.indices.len() as u32,
                }
            }
        };

        let particle_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Buffer"),
            contents: scene.particles.vertex_bytes(),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        let depth_texture = Self::create_depth_texture(&device, &config);

        Self {
            surface,
            device,
            queue,
            config,
            surface_pipeline,
            particle_pipeline,
            surface_buffers,
            particle_buffer,
            particle_count: scene.particles.count() as u32,
            camera_buffer,
            wave_buffer,
            bind_group,
            depth_texture,
            swap_bgra,
            camera,
        }
    }

    pub(crate) fn bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
            label: Some("scene_bind_group_layout"),
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn build_pipeline(
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        shader: &wgpu::ShaderModule,
        format: wgpu::TextureFormat,
        vs_entry: &str,
        fs_entry: &str,
        vertex_layout: wgpu::VertexBufferLayout<'_>,
        topology: wgpu::PrimitiveTopology,
    ) -> wgpu::RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(vs_entry),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some(vs_entry),
                buffers: &[vertex_layout],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some(fs_entry),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        })
    }

    fn create_depth_texture(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
    ) -> wgpu::TextureView {
        let size = wgpu::Extent3d {
            width: config.width.max(1),
            height: config.height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    /// Upload every buffer the scene marked dirty this tick
    fn upload(&mut self, scene: &mut Scene) {
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
            if let (SurfaceBuffers::Grid { vertex, .. }, Surface::Grid(grid)) =
                (&self.surface_buffers, &scene.surface)
            {
                self.queue.write_buffer(vertex, 0, grid.position_bytes());
            }
            self.queue
                .write_buffer(&self.particle_buffer, 0, scene.particles.vertex_bytes());
            scene.mark_uploaded();
        }
    }

    /// Read the rendered texture back as tightly packed RGBA pixels
    fn read_frame(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        texture: &wgpu::Texture,
    ) -> (wgpu::Buffer, u32) {
        let bytes_per_pixel = 4u32;
        let unpadded_bytes_per_row = self.config.width * bytes_per_pixel;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;
        let buffer_size = u64::from(padded_bytes_per_row * self.config.height);

        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Capture Staging Buffer"),
            size: buffer_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(self.config.height),
                },
            },
            wgpu::Extent3d {
                width: self.config.width,
                height: self.config.height,
                depth_or_array_layers: 1,
            },
        );

        (staging_buffer, padded_bytes_per_row)
    }

    fn map_frame(
        &self,
        staging_buffer: wgpu::Buffer,
        padded_bytes_per_row: u32,
    ) -> Result<FrameImage, DrawError> {
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
        let width = self.config.width;
        let height = self.config.height;
        let bytes_per_pixel = 4u32;

        // Strip the row padding wgpu requires for copies
        let mut pixels = Vec::with_capacity((width * height * bytes_per_pixel) as usize);
        for row in 0..height {
            let start = (row * padded_bytes_per_row) as usize;
            let end = start + (width * bytes_per_pixel) as usize;
            pixels.extend_from_slice(&data[start..end]);
        }

        drop(data);
        staging_buffer.unmap();

        if self.swap_bgra {
            for chunk in pixels.chunks_exact_mut(4) {
                chunk.swap(0, 2);
            }
        }

        Ok(FrameImage::new(width, height, pixels))
    }
}

impl DrawTarget for RenderPipeline {
    fn draw(
        &mut self,
        scene: &mut Scene,
        capture: bool,
    ) -> Result<Option<FrameImage>, DrawError> {
        self.upload(scene);

        let output = self
            .surface
            .get_current_texture()
            .map_err(DrawError::Surface)?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
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
            match &self.surface_buffers {
                SurfaceBuffers::Plane {
                    vertex,
                    index,
                    index_count,
                }
                | SurfaceBuffers::Grid {
                    vertex,
                    index,
                    index_count,
                } => {
                    render_pass.set_vertex_buffer(0, vertex.slice(..));
                    render_pass.set_index_buffer(index.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..*index_count, 0, 0..1);
                }
            }

            render_pass.set_pipeline(&self.particle_pipeline);
            render_pass.set_bind_group(0, &self.bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.particle_buffer.slice(..));
            render_pass.draw(0..self.particle_count, 0..1);
        }

        // Queue the readback copy before present; the capture pipeline must
        // observe exactly the frame being shown
        let staging = if capture {
            Some(self.read_frame(&mut encoder, &output.texture))
        } else {
            None
        };

        self.queue.submit(std::iter::once(encoder.finish()));

        let frame = match staging {
            Some((buffer, padded)) => Some(self.map_frame(buffer, padded)?),
            None => None,
        };

        output.present();
        Ok(frame)
    }

    fn set_viewport_size(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.depth_texture = Self::create_depth_texture(&self.device, &self.config);
            self.camera.set_aspect(width as f32 / height as f32);
        }
    }

    fn viewport_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }
}
