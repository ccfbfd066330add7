use std::{cell::RefCell, future::Future, pin::Pin, rc::Rc};

use lib_geometry::{Camera, Projection};
use lib_mesh_model::ModelRenderer;
use tracing::{debug, error, info, trace, warn};
use wgpu::PresentMode;

use crate::{renderer::Renderer, Scene, SurfaceSize, ViewerConfig, ViewerError, ViewerResult};

/// A future the host has to drive to completion on its event loop.
pub type SetupFuture = Pin<Box<dyn Future<Output = ()>>>;

const MSAA_SAMPLES: u32 = 4;

/// A wgpu backed [`Renderer`] drawing into a platform surface (e.g. a canvas).
///
/// Adapter and device are requested asynchronously. Until they are available every frame is
/// skipped, and resizes are only recorded.
pub struct RenderSurface {
    state: Rc<RefCell<SurfaceState>>,
}

enum SurfaceState {
    Initializing { size: SurfaceSize, antialias: bool },
    Ready(Box<GpuContext>),
    Failed,
    Disposed,
}

impl RenderSurface {
    /// Creates the wgpu surface for `target` right away and hands the remaining device setup to
    /// `spawn`.
    pub fn new(
        target: wgpu::SurfaceTarget<'static>,
        size: SurfaceSize,
        config: &ViewerConfig,
        spawn: impl FnOnce(SetupFuture),
    ) -> ViewerResult<Self> {
        info!("Creating new render surface of size {size:?}");

        let instance_descriptor = wgpu::InstanceDescriptor {
            backends: if cfg!(target_family = "wasm") {
                wgpu::Backends::GL
            } else {
                wgpu::Backends::all()
            },
            flags: wgpu::InstanceFlags::from_build_config(),
            dx12_shader_compiler: wgpu::Dx12Compiler::default(),
            gles_minor_version: wgpu::Gles3MinorVersion::Automatic,
        };
        let instance = wgpu::Instance::new(instance_descriptor);

        debug!("create wgpu surface");
        let surface = instance.create_surface(target)?;

        let state = Rc::new(RefCell::new(SurfaceState::Initializing {
            size,
            antialias: config.antialias,
        }));

        let weak_state = Rc::downgrade(&state);
        spawn(Box::pin(async move {
            let setup = request_device(&instance, &surface).await;

            let Some(state) = weak_state.upgrade() else {
                debug!("render surface dropped during setup");
                if let Ok((_, device, _)) = setup {
                    device.destroy();
                }
                return;
            };
            let mut state = state.borrow_mut();

            let SurfaceState::Initializing { size, antialias } = *state else {
                debug!("render surface disposed during setup");
                if let Ok((_, device, _)) = setup {
                    device.destroy();
                }
                return;
            };

            match setup.and_then(|(adapter, device, queue)| {
                GpuContext::new(surface, &adapter, device, queue, size, antialias)
            }) {
                Ok(context) => *state = SurfaceState::Ready(Box::new(context)),
                Err(error) => {
                    error!("failed to set up graphics: {error}");
                    *state = SurfaceState::Failed;
                }
            }
        }));

        Ok(Self { state })
    }
}

impl Renderer for RenderSurface {
    fn resize(&mut self, new_size: SurfaceSize) {
        if new_size.is_empty() {
            trace!("surface would be empty");
            return;
        }
        match *self.state.borrow_mut() {
            SurfaceState::Initializing { ref mut size, .. } => *size = new_size,
            SurfaceState::Ready(ref mut context) => context.resize(new_size),
            SurfaceState::Failed | SurfaceState::Disposed => {}
        }
    }

    fn render(&mut self, scene: &Scene, camera: &Camera, projection: &Projection) {
        if let SurfaceState::Ready(ref mut context) = *self.state.borrow_mut() {
            context.render(scene, camera, projection);
        }
    }

    fn dispose(&mut self) {
        let previous = std::mem::replace(&mut *self.state.borrow_mut(), SurfaceState::Disposed);
        if let SurfaceState::Ready(mut context) = previous {
            context.dispose();
            info!("render surface disposed");
        }
    }
}

impl Drop for RenderSurface {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn request_device(
    instance: &wgpu::Instance,
    surface: &wgpu::Surface<'static>,
) -> ViewerResult<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
    debug!("get an adapter responsible for drawing on the surface");
    let request_adapter_options = wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        force_fallback_adapter: false,
        compatible_surface: Some(surface),
    };
    let adapter = instance
        .request_adapter(&request_adapter_options)
        .await
        .ok_or_else(|| ViewerError::Graphics("no suitable graphics adapter found".to_owned()))?;

    let adapter_info = adapter.get_info();
    info!("Using {} ({:?})", adapter_info.name, adapter_info.backend);

    // Make sure we use the texture resolution limits from the adapter, so we can support images the size of the swapchain.
    let required_limits =
        wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits());
    let device_descriptor = wgpu::DeviceDescriptor {
        label: Some("model viewer device"),
        required_features: wgpu::Features::empty(),
        required_limits,
        memory_hints: wgpu::MemoryHints::MemoryUsage,
    };
    let (device, queue) = adapter.request_device(&device_descriptor, None).await?;

    Ok((adapter, device, queue))
}

struct GpuContext {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    /// this may change over time (e.g. for resizing)
    config: wgpu::SurfaceConfiguration,
    sample_count: u32,
    depth_map: DepthTexture,
    multisampled: Option<ColorTarget>,
    model_renderer: ModelRenderer,
    /// scene revision currently uploaded to the GPU
    uploaded_revision: Option<u64>,
}

impl GpuContext {
    fn new(
        surface: wgpu::Surface<'static>,
        adapter: &wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        size: SurfaceSize,
        antialias: bool,
    ) -> ViewerResult<Self> {
        debug!("create the start configuration of the surface");
        let mut config = surface
            .get_default_config(adapter, size.width.max(1), size.height.max(1))
            .ok_or_else(|| ViewerError::Surface("surface isn't supported by the adapter".to_owned()))?;
        // Not all platforms support sRGB swapchains, so we need to use view formats
        let view_format = config.format.add_srgb_suffix();
        config.view_formats.push(view_format);
        config.present_mode = PresentMode::AutoVsync;
        surface.configure(&device, &config);

        let sample_count = if antialias
            && adapter
                .get_texture_format_features(view_format)
                .flags
                .sample_count_supported(MSAA_SAMPLES)
        {
            MSAA_SAMPLES
        } else {
            1
        };
        debug!("rendering with {sample_count} sample(s) per pixel");

        let depth_map = DepthTexture::new(&device, &config, sample_count);
        let multisampled = (sample_count > 1)
            .then(|| ColorTarget::new(&device, &config, view_format, sample_count));
        let model_renderer = ModelRenderer::new(
            &device,
            view_format,
            DepthTexture::depth_stencil_state(),
            sample_count,
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            sample_count,
            depth_map,
            multisampled,
            model_renderer,
            uploaded_revision: None,
        })
    }

    fn view_format(&self) -> wgpu::TextureFormat {
        self.config
            .view_formats
            .first()
            .copied()
            .unwrap_or(self.config.format)
    }

    fn resize(&mut self, size: SurfaceSize) {
        if self.config.width == size.width && self.config.height == size.height {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        debug!("setting changed surface configuration: {:?}", self.config);
        self.surface.configure(&self.device, &self.config);

        self.depth_map.destroy();
        self.depth_map = DepthTexture::new(&self.device, &self.config, self.sample_count);
        if let Some(previous) = self.multisampled.take() {
            previous.destroy();
            self.multisampled = Some(ColorTarget::new(
                &self.device,
                &self.config,
                self.view_format(),
                self.sample_count,
            ));
        }
    }

    fn render(&mut self, scene: &Scene, camera: &Camera, projection: &Projection) {
        if self.uploaded_revision != Some(scene.revision()) {
            self.model_renderer.upload(&self.device, scene.model());
            self.uploaded_revision = Some(scene.revision());
        }

        let surface_texture = match self.surface.get_current_texture() {
            Ok(surface_texture) => surface_texture,
            Err(wgpu::SurfaceError::Timeout) => {
                trace!("timeout while acquiring the next frame");
                return;
            }
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                // skip this frame, the next one uses the fresh configuration
                debug!("surface outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return;
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                warn!("out of memory while acquiring the next frame");
                return;
            }
        };

        let texture_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor {
                format: Some(self.view_format()),
                ..wgpu::TextureViewDescriptor::default()
            });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });

        let clear = scene.clear_color();
        let clear_color = wgpu::Color {
            r: f64::from(clear.x),
            g: f64::from(clear.y),
            b: f64::from(clear.z),
            a: f64::from(clear.w),
        };
        let render_pass_color_attachment = match self.multisampled {
            Some(ref target) => wgpu::RenderPassColorAttachment {
                view: &target.view,
                resolve_target: Some(&texture_view),
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color),
                    store: wgpu::StoreOp::Discard,
                },
            },
            None => wgpu::RenderPassColorAttachment {
                view: &texture_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color),
                    store: wgpu::StoreOp::Store,
                },
            },
        };
        let color_attachments = [Some(render_pass_color_attachment)];
        let render_pass_depth_stencil_attachment = wgpu::RenderPassDepthStencilAttachment {
            view: &self.depth_map.view,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(1.0),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        };
        let render_pass_descriptor = wgpu::RenderPassDescriptor {
            label: None,
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(render_pass_depth_stencil_attachment),
            timestamp_writes: None,
            occlusion_query_set: None,
        };
        {
            let mut render_pass = encoder.begin_render_pass(&render_pass_descriptor);
            self.model_renderer.render(
                &self.queue,
                &mut render_pass,
                camera,
                projection,
                &scene.lighting(),
            );
        }

        self.queue.submit(Some(encoder.finish()));
        surface_texture.present();
    }

    fn dispose(&mut self) {
        self.model_renderer.dispose();
        self.depth_map.destroy();
        if let Some(target) = self.multisampled.take() {
            target.destroy();
        }
        self.device.destroy();
    }
}

struct DepthTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthTexture {
    const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    fn new(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration, sample_count: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth_map"),
            size: wgpu::Extent3d {
                width: config.width.max(1),
                height: config.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    fn depth_stencil_state() -> wgpu::DepthStencilState {
        wgpu::DepthStencilState {
            format: Self::DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }
    }

    fn destroy(&self) {
        self.texture.destroy();
    }
}

/// Multisampled color buffer that gets resolved into the surface texture.
struct ColorTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl ColorTarget {
    fn new(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
        format: wgpu::TextureFormat,
        sample_count: u32,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("multisampled color"),
            size: wgpu::Extent3d {
                width: config.width.max(1),
                height: config.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    fn destroy(&self) {
        self.texture.destroy();
    }
}
