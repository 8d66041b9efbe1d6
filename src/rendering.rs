//! Rendering system with wgpu pipelines and the persistent trail canvas.
//!
//! Each frame draws into an offscreen canvas that is never cleared:
//! 1. Backdrop pass: the fade color (or background image) at low opacity
//! 2. Geometry pass: flash and line quads from the compositor
//! 3. Present pass: the canvas copied onto the window surface

use bytemuck::{Pod, Zeroable};
use image::imageops::FilterType;
use std::path::Path;
use std::sync::Arc;
use winit::window::Window;

use crate::error::RenderError;
use crate::visual::ColorVertex;

/// Canvas texture format (trails accumulate here)
const CANVAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Vertex capacity of the initial geometry buffer
const INITIAL_VERTEX_CAPACITY: usize = 16 * 1024;

/// Uniform buffer shared by all passes
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Uniforms {
    /// Canvas size in pixels (geometry is submitted in pixels)
    pub resolution: [f32; 2],
    pub _padding: [f32; 2],
    /// Backdrop multiplier: rgb scales the backdrop texel, a is the fade opacity
    pub tint: [f32; 4],
}

/// Decode an image file and stretch it to `width`x`height` for use as the backdrop
///
/// Scaling at load time keeps the texture within the device's size limits
/// whatever the source resolution.
pub fn load_background(
    path: &Path,
    width: u32,
    height: u32,
) -> Result<image::RgbaImage, image::ImageError> {
    let image = image::open(path)?;
    Ok(image
        .resize_exact(width.max(1), height.max(1), FilterType::Triangle)
        .to_rgba8())
}

/// Rendering system managing wgpu device, pipelines, and the canvas
pub struct RenderSystem {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,

    backdrop_pipeline: wgpu::RenderPipeline,
    geometry_pipeline: wgpu::RenderPipeline,
    present_pipeline: wgpu::RenderPipeline,

    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    uniforms: Uniforms,

    /// Backdrop texture (1x1 fade color or the background image)
    backdrop_bind_group: wgpu::BindGroup,

    canvas_view: wgpu::TextureView,
    present_bind_group: wgpu::BindGroup,
    /// Canvas must be cleared to black before its first use
    canvas_fresh: bool,

    vertex_buffer: wgpu::Buffer,
    vertex_capacity: usize,
}

impl RenderSystem {
    /// Create new rendering system
    ///
    /// `fade` is the straight RGBA of the fade layer. With a background image
    /// the image replaces the fade color and keeps the fade opacity.
    pub async fn new(
        window: Arc<Window>,
        fade: [f32; 4],
        background: Option<&image::RgbaImage>,
    ) -> Result<Self, RenderError> {
        let size = window.inner_size();
        let (width, height) = (size.width.max(1), size.height.max(1));

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // Window must have 'static lifetime via Arc
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Main Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        log::info!("GPU adapter: {}", adapter.get_info().name);

        // Colors are authored as plain 8-bit values, so present without sRGB encoding
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .unwrap_or(wgpu::TextureFormat::Bgra8Unorm);
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Visualizer Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texture Bind Group Layout"),
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
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Linear Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let uniforms = Uniforms {
            resolution: [width as f32, height as f32],
            _padding: [0.0; 2],
            tint: match background {
                Some(_) => [1.0, 1.0, 1.0, fade[3]],
                None => fade,
            },
        };
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Uniform Buffer"),
            size: std::mem::size_of::<Uniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        // Backdrop texture: the image, or a white texel tinted by the fade color
        let backdrop_view = match background {
            Some(image) => {
                log::info!("Background image: {}x{}", image.width(), image.height());
                upload_rgba(&device, &queue, image.width(), image.height(), image.as_raw())
            }
            None => upload_rgba(&device, &queue, 1, 1, &[255, 255, 255, 255]),
        };
        let backdrop_bind_group = create_texture_bind_group(
            &device,
            &bind_group_layout,
            &uniform_buffer,
            &backdrop_view,
            &sampler,
            "Backdrop Bind Group",
        );

        let canvas_view = create_canvas(&device, width, height);
        let present_bind_group = create_texture_bind_group(
            &device,
            &bind_group_layout,
            &uniform_buffer,
            &canvas_view,
            &sampler,
            "Present Bind Group",
        );

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Visualizer Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let backdrop_pipeline = create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            "Backdrop Pipeline",
            ("vs_fullscreen", "fs_backdrop"),
            &[],
            CANVAS_FORMAT,
            Some(wgpu::BlendState::ALPHA_BLENDING),
        );

        let geometry_pipeline = create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            "Geometry Pipeline",
            ("vs_geometry", "fs_geometry"),
            &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<ColorVertex>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[
                    wgpu::VertexAttribute {
                        offset: 0,
                        shader_location: 0,
                        format: wgpu::VertexFormat::Float32x2,
                    },
                    wgpu::VertexAttribute {
                        offset: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                        shader_location: 1,
                        format: wgpu::VertexFormat::Float32x4,
                    },
                ],
            }],
            CANVAS_FORMAT,
            Some(wgpu::BlendState::ALPHA_BLENDING),
        );

        let present_pipeline = create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            "Present Pipeline",
            ("vs_fullscreen", "fs_present"),
            &[],
            config.format,
            None,
        );

        let vertex_buffer = create_vertex_buffer(&device, INITIAL_VERTEX_CAPACITY);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            backdrop_pipeline,
            geometry_pipeline,
            present_pipeline,
            bind_group_layout,
            sampler,
            uniform_buffer,
            uniforms,
            backdrop_bind_group,
            canvas_view,
            present_bind_group,
            canvas_fresh: true,
            vertex_buffer,
            vertex_capacity: INITIAL_VERTEX_CAPACITY,
        })
    }

    /// Current surface size in pixels
    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Reconfigure the surface and start a fresh canvas at the new size
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return; // Minimized
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);

        self.canvas_view = create_canvas(&self.device, width, height);
        self.present_bind_group = create_texture_bind_group(
            &self.device,
            &self.bind_group_layout,
            &self.uniform_buffer,
            &self.canvas_view,
            &self.sampler,
            "Present Bind Group",
        );
        self.canvas_fresh = true;

        self.uniforms.resolution = [width as f32, height as f32];
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[self.uniforms]));
    }

    /// Reconfigure after the surface was lost or outdated
    pub fn reconfigure(&mut self) {
        let (width, height) = self.size();
        self.resize(width, height);
    }

    /// Fade the canvas, draw `vertices` onto it and present
    pub fn render(&mut self, vertices: &[ColorVertex]) -> Result<(), wgpu::SurfaceError> {
        self.upload_vertices(vertices);

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let load = if self.canvas_fresh {
                wgpu::LoadOp::Clear(wgpu::Color::BLACK)
            } else {
                wgpu::LoadOp::Load
            };
            let mut canvas_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Canvas Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.canvas_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            // Fade previous frames toward the backdrop
            canvas_pass.set_pipeline(&self.backdrop_pipeline);
            canvas_pass.set_bind_group(0, &self.backdrop_bind_group, &[]);
            canvas_pass.draw(0..3, 0..1); // Fullscreen triangle

            if !vertices.is_empty() {
                canvas_pass.set_pipeline(&self.geometry_pipeline);
                canvas_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                canvas_pass.draw(0..vertices.len() as u32, 0..1);
            }
        }
        self.canvas_fresh = false;

        {
            let mut present_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Present Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            present_pass.set_pipeline(&self.present_pipeline);
            present_pass.set_bind_group(0, &self.present_bind_group, &[]);
            present_pass.draw(0..3, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }

    /// Write the draw list, growing the vertex buffer when it no longer fits
    fn upload_vertices(&mut self, vertices: &[ColorVertex]) {
        if vertices.len() > self.vertex_capacity {
            self.vertex_capacity = vertices.len().next_power_of_two();
            self.vertex_buffer = create_vertex_buffer(&self.device, self.vertex_capacity);
            log::debug!("Vertex buffer grown to {} vertices", self.vertex_capacity);
        }
        if !vertices.is_empty() {
            self.queue
                .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(vertices));
        }
    }
}

fn create_vertex_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Vertex Buffer"),
        size: (capacity * std::mem::size_of::<ColorVertex>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_canvas(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Canvas Texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: CANVAS_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn upload_rgba(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Backdrop Texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: CANVAS_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width), // RGBA8
            rows_per_image: Some(height),
        },
        size,
    );

    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniform_buffer: &wgpu::Buffer,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

#[allow(clippy::too_many_arguments)]
fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    label: &str,
    (vertex_entry, fragment_entry): (&str, &str),
    buffers: &[wgpu::VertexBufferLayout],
    format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(vertex_entry),
            buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None, // Line quads are emitted with either winding
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
