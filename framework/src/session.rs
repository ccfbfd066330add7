use std::{
    cell::RefCell,
    rc::{Rc, Weak},
    time::Duration,
};

use glam::Vec3;
use lib_geometry::{Aabb, Camera, OrbitController, Projection};
use lib_mesh_model::{load_model, LoadError, Material, ModelFormat, ModelSource};
use tracing::{debug, info, trace, warn};
use web_time::Instant;

use crate::{
    host::{FrameLoopHandle, Host, ListenerId, PointerInput, SurfaceSize},
    scene::frame_model,
    status::StatusSink,
    Renderer, Scene, ViewerConfig, ViewerResult, ViewerStatus,
};

/// One mounted model: scene, camera, surface, subscriptions and the pending load.
///
/// A session never changes its model. Showing another model means tearing this session down and
/// starting a new one.
pub(crate) struct Session<H: Host> {
    host: Rc<H>,
    state: Rc<RefCell<SessionState<H>>>,
}

struct SessionState<H: Host> {
    /// cleared on teardown; callbacks that still fire afterwards must not touch anything
    alive: bool,
    source: ModelSource,
    config: ViewerConfig,
    scene: Scene,
    camera: Camera,
    projection: Projection,
    controller: OrbitController,
    /// CSS pixels
    region_size: (u32, u32),
    surface: Option<H::Surface>,
    renderer: Option<H::Renderer>,
    frame_loop: Option<FrameLoopHandle>,
    resize_listener: Option<ListenerId>,
    input_listener: Option<ListenerId>,
    status: ViewerStatus,
    status_sink: StatusSink,
    frame_counter: FrameCounter,
}

impl<H: Host> Session<H> {
    /// Builds the scene, attaches a fresh surface and starts both the render loop and the load.
    ///
    /// If any step fails, everything set up so far is released again.
    pub(crate) fn start(
        host: Rc<H>,
        source: ModelSource,
        config: ViewerConfig,
        status_sink: StatusSink,
    ) -> ViewerResult<Self> {
        info!("starting viewer session for {}", source.locator());

        let region_size = host.region_size();
        let surface_size = SurfaceSize::from_region(region_size, host.pixel_ratio());

        let scene = Scene::new(&config);
        let camera = Camera::new(Vec3::new(0.0, 0.0, config.initial_distance), Vec3::ZERO);
        let projection = Projection::new_perspective(
            region_size,
            config.field_of_view_radians(),
            config.near..config.far,
        );
        let mut controller = OrbitController::new(Vec3::ZERO);
        if config.enable_damping {
            controller = controller.with_damping(config.damping_factor);
        }
        controller.rotate_speed = config.rotate_speed;
        controller.zoom_speed = config.zoom_speed;
        controller.pan_speed = config.pan_speed;

        let state = Rc::new(RefCell::new(SessionState {
            alive: true,
            source,
            config,
            scene,
            camera,
            projection,
            controller,
            region_size,
            surface: None,
            renderer: None,
            frame_loop: None,
            resize_listener: None,
            input_listener: None,
            status: ViewerStatus::Loading,
            status_sink,
            frame_counter: FrameCounter::new(),
        }));

        let session = Self { host, state };
        // dropping the half-built session on error tears it down
        session.attach(surface_size)?;
        session.subscribe()?;
        session.start_frame_loop()?;
        session.start_load();
        Ok(session)
    }

    fn attach(&self, surface_size: SurfaceSize) -> ViewerResult<()> {
        let surface = self.host.create_surface(surface_size)?;
        let renderer = {
            let state = self.state.borrow();
            self.host
                .create_renderer(&surface, surface_size, &state.config)?
        };
        let attached = self.host.attach_surface(&surface);

        let mut state = self.state.borrow_mut();
        state.surface = Some(surface);
        state.renderer = Some(renderer);
        attached
    }

    fn subscribe(&self) -> ViewerResult<()> {
        let on_resize = {
            let state = Rc::downgrade(&self.state);
            let host = Rc::downgrade(&self.host);
            move || {
                if let (Some(state), Some(host)) = (state.upgrade(), host.upgrade()) {
                    handle_resize(&state, &*host);
                }
            }
        };
        let resize_listener = self.host.subscribe_resize(Box::new(on_resize))?;
        self.state.borrow_mut().resize_listener = Some(resize_listener);

        let on_input = {
            let state = Rc::downgrade(&self.state);
            move |input| {
                if let Some(state) = state.upgrade() {
                    handle_input(&state, input);
                }
            }
        };
        let input_listener = {
            let state = self.state.borrow();
            match state.surface {
                Some(ref surface) => Some(self.host.subscribe_input(surface, Box::new(on_input))?),
                None => None,
            }
        };
        self.state.borrow_mut().input_listener = input_listener;
        Ok(())
    }

    fn start_frame_loop(&self) -> ViewerResult<()> {
        let state = Rc::downgrade(&self.state);
        let handle = self.host.start_frame_loop(Box::new(move || {
            if let Some(state) = state.upgrade() {
                render_frame(&state);
            }
        }))?;
        self.state.borrow_mut().frame_loop = Some(handle);
        Ok(())
    }

    fn start_load(&self) {
        let (source, sink) = {
            let state = self.state.borrow();
            (state.source.clone(), state.status_sink.clone())
        };

        if source.format() == ModelFormat::Unrecognized {
            let error = source.unsupported_error();
            warn!("not loading {}: {error}", source.locator());
            let status = ViewerStatus::Failed(error);
            self.state.borrow_mut().status = status.clone();
            sink.notify(&status);
            return;
        }

        sink.notify(&ViewerStatus::Loading);

        let state = Rc::downgrade(&self.state);
        let format = source.format();
        self.host.fetch(
            source.locator(),
            Box::new(move |result| {
                let Some(state) = state.upgrade() else {
                    debug!("discarding model that finished loading after its viewer was unmounted");
                    return;
                };
                finish_load(&state, format, result);
            }),
        );
    }

    /// Cancels the frame loop, removes all subscriptions, detaches the surface and releases all
    /// GPU resources. Calling it again has no effect.
    pub(crate) fn teardown(&self) {
        let mut state = self.state.borrow_mut();
        let state = &mut *state;

        if let Some(handle) = state.frame_loop.take() {
            self.host.cancel_frame_loop(handle);
        }
        if !state.alive {
            return;
        }
        state.alive = false;
        debug!("tearing down viewer session for {}", state.source.locator());

        if let Some(id) = state.resize_listener.take() {
            self.host.unsubscribe_resize(id);
        }
        if let Some(id) = state.input_listener.take() {
            self.host.unsubscribe_input(id);
        }
        if let Some(surface) = state.surface.take() {
            self.host.detach_surface(&surface);
        }
        if let Some(mut renderer) = state.renderer.take() {
            renderer.dispose();
        }
        state.scene.clear_model();
    }

    pub(crate) fn source(&self) -> ModelSource {
        self.state.borrow().source.clone()
    }

    pub(crate) fn status(&self) -> ViewerStatus {
        self.state.borrow().status.clone()
    }

    pub(crate) fn camera(&self) -> Camera {
        self.state.borrow().camera.clone()
    }

    pub(crate) fn projection(&self) -> Projection {
        self.state.borrow().projection.clone()
    }

    /// Bounding box of the loaded model in scene space, `None` while nothing is loaded.
    pub(crate) fn model_bounds(&self) -> Option<Aabb> {
        self.state.borrow().scene.model().map(|model| model.bounds())
    }

    pub(crate) fn model_materials(&self) -> Vec<Material> {
        self.state
            .borrow()
            .scene
            .model()
            .map(|model| model.materials())
            .unwrap_or_default()
    }

    /// Re-reads the region size and adapts camera and surface to it.
    pub(crate) fn resize(&self) {
        handle_resize(&self.state, &*self.host);
    }
}

impl<H: Host> Drop for Session<H> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn handle_resize<H: Host>(state: &RefCell<SessionState<H>>, host: &H) {
    let mut state = state.borrow_mut();
    if !state.alive {
        return;
    }

    let region_size = host.region_size();
    if region_size.0 == 0 || region_size.1 == 0 {
        trace!("ignoring resize to an empty region");
        return;
    }
    let surface_size = SurfaceSize::from_region(region_size, host.pixel_ratio());
    debug!("resizing viewer to {region_size:?} ({surface_size:?} physical)");

    state.region_size = region_size;
    state.projection.set_surface_dimensions(region_size);
    if let Some(ref surface) = state.surface {
        host.resize_surface(surface, surface_size);
    }
    if let Some(ref mut renderer) = state.renderer {
        renderer.resize(surface_size);
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "region sizes are far below the precision limit of f32"
)]
fn handle_input<H: Host>(state: &RefCell<SessionState<H>>, input: PointerInput) {
    let mut state = state.borrow_mut();
    if !state.alive {
        return;
    }
    let state = &mut *state;
    let viewport_height = state.region_size.1 as f32;

    match input {
        PointerInput::Rotate { delta_x, delta_y } => {
            state.controller.rotate(delta_x, delta_y, viewport_height);
        }
        PointerInput::Pan { delta_x, delta_y } => {
            state.controller.pan(
                delta_x,
                delta_y,
                &state.camera,
                viewport_height,
                state.projection.fov(),
            );
        }
        PointerInput::Zoom { delta } => state.controller.zoom(delta),
    }
}

fn render_frame<H: Host>(state: &RefCell<SessionState<H>>) {
    let mut state = state.borrow_mut();
    if !state.alive {
        return;
    }
    let state = &mut *state;

    state.controller.update(&mut state.camera);
    if let Some(ref mut renderer) = state.renderer {
        renderer.render(&state.scene, &state.camera, &state.projection);
    }
    state.frame_counter.tick();
}

/// Runs once the model data arrived (or failed to arrive).
fn finish_load<H: Host>(
    state: &RefCell<SessionState<H>>,
    format: ModelFormat,
    result: Result<Vec<u8>, LoadError>,
) {
    let (status, sink) = {
        let mut state = state.borrow_mut();
        if !state.alive {
            debug!("discarding model that finished loading after teardown");
            return;
        }
        let state = &mut *state;

        let status = match result.and_then(|data| load_model(format, &data)) {
            Ok(mut model) => {
                frame_model(
                    &mut model,
                    &mut state.camera,
                    &mut state.controller,
                    state.config.fit_factor,
                );
                let triangles = model.triangle_count();
                state.scene.insert_model(model);
                info!("loaded {} with {triangles} triangles", state.source.locator());
                ViewerStatus::Loaded { triangles }
            }
            Err(error) => {
                warn!("failed to load {}: {error}", state.source.locator());
                ViewerStatus::Failed(error)
            }
        };
        state.status = status.clone();
        (status, state.status_sink.clone())
    };

    sink.notify(&status);
}

struct FrameCounter {
    frames: u32,
    since: Instant,
}

impl FrameCounter {
    fn new() -> Self {
        Self {
            frames: 0,
            since: Instant::now(),
        }
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "frame counts per second are small"
    )]
    fn tick(&mut self) {
        self.frames += 1;
        let span = self.since.elapsed();
        if span >= Duration::from_secs(1) {
            trace!(
                "{} fps",
                ((self.frames as f32) / span.as_secs_f32()).round()
            );
            self.frames = 0;
            self.since += span;
        }
    }
}
