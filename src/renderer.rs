use std::sync::Arc;
use wgpu::*;

use image::RgbaImage;
use winit::window::Window;

use crate::camera::{CameraPose, CameraUniform};
use crate::config::WormholeConfig;
use crate::environment::{CubeFace, EnvironmentMap};
use crate::error::{Result, WormholeError};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct WormholeUniform {
    rho: f32,
    a: f32,
    mass: f32,
    time: f32,
    dt: f32,
    boundary: f32,
    flow_speed: f32,
    max_steps: u32,
}

impl WormholeUniform {
    fn new(config: &WormholeConfig, time: f32) -> Self {
        Self {
            rho: config.metric.rho,
            a: config.metric.a,
            mass: config.metric.mass,
            time,
            dt: config.integrator.dt,
            boundary: config.integrator.boundary,
            flow_speed: config.flow_speed,
            max_steps: config.integrator.max_steps,
        }
    }
}

/// Live GPU path: the geodesic pass runs as a compute shader into a storage
/// texture which is then blitted to the window surface.
pub struct Renderer {
    surface: Surface<'static>,
    device: Device,
    queue: Queue,
    config: SurfaceConfiguration,
    wormhole: WormholeConfig,
    compute_pipeline: ComputePipeline,
    compute_bind_group_layout: BindGroupLayout,
    compute_bind_group: BindGroup,
    render_pipeline: RenderPipeline,
    render_bind_group_layout: BindGroupLayout,
    render_bind_group: BindGroup,
    render_texture: Texture,
    render_texture_view: TextureView,
    skybox_a_view: TextureView,
    skybox_b_view: TextureView,
    skybox_sampler: Sampler,
    blit_sampler: Sampler,
    camera_buffer: Buffer,
    wormhole_buffer: Buffer,
    width: u32,
    height: u32,
}

impl Renderer {
    pub async fn new(
        window: Arc<Window>,
        width: u32,
        height: u32,
        wormhole: WormholeConfig,
        skybox_a: &EnvironmentMap,
        skybox_b: &EnvironmentMap,
    ) -> Result<Self> {
        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| WormholeError::Gpu(e.to_string()))?;

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| WormholeError::Gpu("no compatible adapter".into()))?;

        let info = adapter.get_info();
        log::info!("Selected GPU: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    required_features: Features::empty(),
                    required_limits: Limits::downlevel_defaults().using_resolution(adapter.limits()),
                    label: None,
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| WormholeError::Gpu(e.to_string()))?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Skybox bytes are already display-encoded; avoid a second sRGB encode.
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let (render_texture, render_texture_view) = Self::create_render_texture(&device, width, height);
        let skybox_a_view = Self::upload_cubemap(&device, &queue, "Skybox A", skybox_a);
        let skybox_b_view = Self::upload_cubemap(&device, &queue, "Skybox B", skybox_b);

        let skybox_sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("Skybox Sampler"),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Nearest,
            ..Default::default()
        });
        let blit_sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("Blit Sampler"),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            mipmap_filter: FilterMode::Nearest,
            ..Default::default()
        });

        let camera_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("Camera Buffer"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let wormhole_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("Wormhole Buffer"),
            size: std::mem::size_of::<WormholeUniform>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let compute_shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Wormhole Shader"),
            source: ShaderSource::Wgsl(include_str!("shaders/wormhole.wgsl").into()),
        });

        let uniform_entry = |binding| BindGroupLayoutEntry {
            binding,
            visibility: ShaderStages::COMPUTE,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let cube_entry = |binding| BindGroupLayoutEntry {
            binding,
            visibility: ShaderStages::COMPUTE,
            ty: BindingType::Texture {
                sample_type: TextureSampleType::Float { filterable: true },
                view_dimension: TextureViewDimension::Cube,
                multisampled: false,
            },
            count: None,
        };

        let compute_bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Compute Bind Group Layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::StorageTexture {
                        access: StorageTextureAccess::WriteOnly,
                        format: TextureFormat::Rgba8Unorm,
                        view_dimension: TextureViewDimension::D2,
                    },
                    count: None,
                },
                uniform_entry(1),
                uniform_entry(2),
                cube_entry(3),
                cube_entry(4),
                BindGroupLayoutEntry {
                    binding: 5,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let compute_bind_group = Self::create_compute_bind_group(
            &device,
            &compute_bind_group_layout,
            &render_texture_view,
            &camera_buffer,
            &wormhole_buffer,
            [&skybox_a_view, &skybox_b_view],
            &skybox_sampler,
        );

        let compute_pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Compute Pipeline Layout"),
            bind_group_layouts: &[&compute_bind_group_layout],
            push_constant_ranges: &[],
        });

        let compute_pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("Compute Pipeline"),
            layout: Some(&compute_pipeline_layout),
            module: &compute_shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let render_shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Blit Shader"),
            source: ShaderSource::Wgsl(include_str!("shaders/blit.wgsl").into()),
        });

        let render_bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Render Bind Group Layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let render_bind_group =
            Self::create_render_bind_group(&device, &render_bind_group_layout, &render_texture_view, &blit_sampler);

        let render_pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[&render_bind_group_layout],
            push_constant_ranges: &[],
        });

        let render_pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Render Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: VertexState {
                module: &render_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(FragmentState {
                module: &render_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format: surface_format,
                    blend: Some(BlendState::REPLACE),
                    write_mask: ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            surface,
            device,
            queue,
            config,
            wormhole,
            compute_pipeline,
            compute_bind_group_layout,
            compute_bind_group,
            render_pipeline,
            render_bind_group_layout,
            render_bind_group,
            render_texture,
            render_texture_view,
            skybox_a_view,
            skybox_b_view,
            skybox_sampler,
            blit_sampler,
            camera_buffer,
            wormhole_buffer,
            width,
            height,
        })
    }

    fn create_render_texture(device: &Device, width: u32, height: u32) -> (Texture, TextureView) {
        let texture = device.create_texture(&TextureDescriptor {
            label: Some("Render Texture"),
            size: Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsages::STORAGE_BINDING | TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&TextureViewDescriptor::default());
        (texture, view)
    }

    /// Upload six faces as one cube texture; layer order is +X, -X, +Y, -Y, +Z, -Z.
    fn upload_cubemap(device: &Device, queue: &Queue, label: &str, map: &EnvironmentMap) -> TextureView {
        let (width, height) = map.dimensions();
        let texture = device.create_texture(&TextureDescriptor {
            label: Some(label),
            size: Extent3d { width, height, depth_or_array_layers: 6 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (layer, face) in CubeFace::ALL.into_iter().enumerate() {
            queue.write_texture(
                ImageCopyTexture {
                    texture: &texture,
                    mip_level: 0,
                    origin: Origin3d { x: 0, y: 0, z: layer as u32 },
                    aspect: TextureAspect::All,
                },
                map.face(face).as_raw(),
                ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * width),
                    rows_per_image: Some(height),
                },
                Extent3d { width, height, depth_or_array_layers: 1 },
            );
        }

        texture.create_view(&TextureViewDescriptor {
            label: Some(label),
            dimension: Some(TextureViewDimension::Cube),
            ..Default::default()
        })
    }

    fn create_compute_bind_group(
        device: &Device,
        layout: &BindGroupLayout,
        texture_view: &TextureView,
        camera_buffer: &Buffer,
        wormhole_buffer: &Buffer,
        skyboxes: [&TextureView; 2],
        skybox_sampler: &Sampler,
    ) -> BindGroup {
        device.create_bind_group(&BindGroupDescriptor {
            label: Some("Compute Bind Group"),
            layout,
            entries: &[
                BindGroupEntry { binding: 0, resource: BindingResource::TextureView(texture_view) },
                BindGroupEntry { binding: 1, resource: camera_buffer.as_entire_binding() },
                BindGroupEntry { binding: 2, resource: wormhole_buffer.as_entire_binding() },
                BindGroupEntry { binding: 3, resource: BindingResource::TextureView(skyboxes[0]) },
                BindGroupEntry { binding: 4, resource: BindingResource::TextureView(skyboxes[1]) },
                BindGroupEntry { binding: 5, resource: BindingResource::Sampler(skybox_sampler) },
            ],
        })
    }

    fn create_render_bind_group(
        device: &Device,
        layout: &BindGroupLayout,
        texture_view: &TextureView,
        sampler: &Sampler,
    ) -> BindGroup {
        device.create_bind_group(&BindGroupDescriptor {
            label: Some("Render Bind Group"),
            layout,
            entries: &[
                BindGroupEntry { binding: 0, resource: BindingResource::TextureView(texture_view) },
                BindGroupEntry { binding: 1, resource: BindingResource::Sampler(sampler) },
            ],
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 { return; }

        self.width = width;
        self.height = height;
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);

        let (render_texture, render_texture_view) = Self::create_render_texture(&self.device, width, height);
        self.render_texture = render_texture;
        self.render_texture_view = render_texture_view;

        self.compute_bind_group = Self::create_compute_bind_group(
            &self.device,
            &self.compute_bind_group_layout,
            &self.render_texture_view,
            &self.camera_buffer,
            &self.wormhole_buffer,
            [&self.skybox_a_view, &self.skybox_b_view],
            &self.skybox_sampler,
        );
        self.render_bind_group = Self::create_render_bind_group(
            &self.device,
            &self.render_bind_group_layout,
            &self.render_texture_view,
            &self.blit_sampler,
        );
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Run the geodesic pass for this frame's pose and time, then present.
    pub fn render(&mut self, pose: &CameraPose, time: f32) -> std::result::Result<(), SurfaceError> {
        let camera_uniform = pose.uniform_data(self.width, self.height, self.wormhole.zoom);
        self.queue.write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[camera_uniform]));

        let wormhole_uniform = WormholeUniform::new(&self.wormhole, time);
        self.queue.write_buffer(&self.wormhole_buffer, 0, bytemuck::cast_slice(&[wormhole_uniform]));

        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        {
            let mut compute_pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("Compute Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.compute_pipeline);
            compute_pass.set_bind_group(0, &self.compute_bind_group, &[]);
            compute_pass.dispatch_workgroups(self.width.div_ceil(8), self.height.div_ceil(8), 1);
        }

        {
            let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color::BLACK),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_pipeline(&self.render_pipeline);
            render_pass.set_bind_group(0, &self.render_bind_group, &[]);
            render_pass.draw(0..6, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }

    /// Read the last rendered frame back into CPU memory, top row first.
    pub fn capture(&self) -> Result<RgbaImage> {
        let (width, height) = (self.width, self.height);
        let unpadded_bytes_per_row = width * 4;
        let align = COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let output_buffer = self.device.create_buffer(&BufferDescriptor {
            label: Some("Capture Buffer"),
            size: (padded_bytes_per_row * height) as u64,
            usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Capture Encoder"),
        });
        encoder.copy_texture_to_buffer(
            ImageCopyTexture {
                texture: &self.render_texture,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            ImageCopyBuffer {
                buffer: &output_buffer,
                layout: ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            Extent3d { width, height, depth_or_array_layers: 1 },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(Maintain::Wait);
        rx.recv()
            .map_err(|e| WormholeError::Gpu(e.to_string()))?
            .map_err(|e| WormholeError::Gpu(e.to_string()))?;

        let data = buffer_slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        for row in data.chunks_exact(padded_bytes_per_row as usize) {
            pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
        }
        drop(data);
        output_buffer.unmap();

        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| WormholeError::Gpu("capture buffer size mismatch".into()))
    }
}
