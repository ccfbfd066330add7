//! In-memory host and renderer for exercising viewer sessions without a browser or GPU.

use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use lib_geometry::{Camera, Projection};
use lib_mesh_model::LoadError;

use crate::{
    host::{FetchCallback, FrameLoopHandle, Host, ListenerId, PointerInput, SurfaceSize},
    Length, Renderer, Scene, ViewerConfig, ViewerError, ViewerResult,
};

type SharedCallback = Rc<RefCell<Box<dyn FnMut()>>>;
type SharedInputCallback = Rc<RefCell<Box<dyn FnMut(PointerInput)>>>;

/// What the renderers created by a [`TestHost`] were asked to do.
#[derive(Debug, Default)]
pub(crate) struct RenderLog {
    pub(crate) created: usize,
    pub(crate) disposed: usize,
    pub(crate) frames: usize,
    pub(crate) sizes: Vec<SurfaceSize>,
    /// triangle count of the model drawn in the most recent frame
    pub(crate) last_triangles: Option<usize>,
}

pub(crate) struct RecordingRenderer {
    log: Rc<RefCell<RenderLog>>,
    disposed: bool,
}

impl Renderer for RecordingRenderer {
    fn resize(&mut self, size: SurfaceSize) {
        if !self.disposed {
            self.log.borrow_mut().sizes.push(size);
        }
    }

    fn render(&mut self, scene: &Scene, _camera: &Camera, _projection: &Projection) {
        if self.disposed {
            return;
        }
        let mut log = self.log.borrow_mut();
        log.frames += 1;
        log.last_triangles = scene.model().map(lib_mesh_model::ModelNode::triangle_count);
    }

    fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.log.borrow_mut().disposed += 1;
        }
    }
}

#[derive(Debug)]
pub(crate) struct TestSurface {
    id: u64,
}

struct PendingFetch {
    locator: String,
    done: Option<FetchCallback>,
}

#[derive(Default)]
struct HostState {
    region_size: (u32, u32),
    pixel_ratio: f64,
    applied_size: Option<(String, String)>,
    next_id: u64,
    surfaces_created: usize,
    attached: Vec<u64>,
    surface_sizes: BTreeMap<u64, SurfaceSize>,
    resize_listeners: BTreeMap<ListenerId, SharedCallback>,
    input_listeners: BTreeMap<ListenerId, SharedInputCallback>,
    frame_loops: BTreeMap<u64, SharedCallback>,
    fetches: Vec<PendingFetch>,
    fail_attach: bool,
}

impl HostState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

pub(crate) struct TestHost {
    state: RefCell<HostState>,
    log: Rc<RefCell<RenderLog>>,
}

impl TestHost {
    pub(crate) fn new(width: u32, height: u32) -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(HostState {
                region_size: (width, height),
                pixel_ratio: 1.0,
                ..HostState::default()
            }),
            log: Rc::default(),
        })
    }

    pub(crate) fn log(&self) -> std::cell::Ref<'_, RenderLog> {
        self.log.borrow()
    }

    pub(crate) fn set_region_size(&self, width: u32, height: u32) {
        self.state.borrow_mut().region_size = (width, height);
    }

    pub(crate) fn set_pixel_ratio(&self, pixel_ratio: f64) {
        self.state.borrow_mut().pixel_ratio = pixel_ratio;
    }

    pub(crate) fn fail_attach(&self) {
        self.state.borrow_mut().fail_attach = true;
    }

    pub(crate) fn applied_size(&self) -> Option<(String, String)> {
        self.state.borrow().applied_size.clone()
    }

    pub(crate) fn surfaces_created(&self) -> usize {
        self.state.borrow().surfaces_created
    }

    pub(crate) fn attached_surfaces(&self) -> usize {
        self.state.borrow().attached.len()
    }

    /// Backing size of the most recently attached surface.
    pub(crate) fn attached_surface_size(&self) -> Option<SurfaceSize> {
        let state = self.state.borrow();
        let id = state.attached.last()?;
        state.surface_sizes.get(id).copied()
    }

    pub(crate) fn resize_listeners(&self) -> usize {
        self.state.borrow().resize_listeners.len()
    }

    pub(crate) fn input_listeners(&self) -> usize {
        self.state.borrow().input_listeners.len()
    }

    pub(crate) fn frame_loops(&self) -> usize {
        self.state.borrow().frame_loops.len()
    }

    pub(crate) fn fetched_locators(&self) -> Vec<String> {
        self.state
            .borrow()
            .fetches
            .iter()
            .map(|fetch| fetch.locator.clone())
            .collect()
    }

    /// Simulates a window resize event.
    pub(crate) fn fire_resize(&self) {
        let listeners: Vec<_> = self.state.borrow().resize_listeners.values().cloned().collect();
        for listener in listeners {
            (listener.borrow_mut())();
        }
    }

    pub(crate) fn fire_input(&self, input: PointerInput) {
        let listeners: Vec<_> = self.state.borrow().input_listeners.values().cloned().collect();
        for listener in listeners {
            (listener.borrow_mut())(input);
        }
    }

    /// Runs every active frame loop `count` times.
    pub(crate) fn run_frames(&self, count: usize) {
        for _ in 0..count {
            let loops: Vec<_> = self.state.borrow().frame_loops.values().cloned().collect();
            for frame in loops {
                (frame.borrow_mut())();
            }
        }
    }

    /// Completes the fetch with the given index.
    pub(crate) fn resolve_fetch(&self, index: usize, result: Result<Vec<u8>, LoadError>) {
        let done = self
            .state
            .borrow_mut()
            .fetches
            .get_mut(index)
            .and_then(|fetch| fetch.done.take());
        let done = done.expect("fetch exists and is still pending");
        done(result);
    }
}

impl Host for TestHost {
    type Surface = TestSurface;
    type Renderer = RecordingRenderer;

    fn region_size(&self) -> (u32, u32) {
        self.state.borrow().region_size
    }

    fn pixel_ratio(&self) -> f64 {
        self.state.borrow().pixel_ratio
    }

    fn apply_region_size(&self, width: &Length, height: &Length) {
        self.state.borrow_mut().applied_size = Some((width.to_string(), height.to_string()));
    }

    fn create_surface(&self, size: SurfaceSize) -> ViewerResult<Self::Surface> {
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        state.surfaces_created += 1;
        state.surface_sizes.insert(id, size);
        Ok(TestSurface { id })
    }

    fn resize_surface(&self, surface: &Self::Surface, size: SurfaceSize) {
        self.state.borrow_mut().surface_sizes.insert(surface.id, size);
    }

    fn create_renderer(
        &self,
        _surface: &Self::Surface,
        size: SurfaceSize,
        _config: &ViewerConfig,
    ) -> ViewerResult<Self::Renderer> {
        let mut log = self.log.borrow_mut();
        log.created += 1;
        log.sizes.push(size);
        Ok(RecordingRenderer {
            log: Rc::clone(&self.log),
            disposed: false,
        })
    }

    fn attach_surface(&self, surface: &Self::Surface) -> ViewerResult<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_attach {
            return Err(ViewerError::Surface("region is gone".to_owned()));
        }
        state.attached.push(surface.id);
        Ok(())
    }

    fn detach_surface(&self, surface: &Self::Surface) {
        self.state.borrow_mut().attached.retain(|&id| id != surface.id);
    }

    fn subscribe_resize(&self, callback: Box<dyn FnMut()>) -> ViewerResult<ListenerId> {
        let mut state = self.state.borrow_mut();
        let id = ListenerId(state.next_id());
        state
            .resize_listeners
            .insert(id, Rc::new(RefCell::new(callback)));
        Ok(id)
    }

    fn unsubscribe_resize(&self, id: ListenerId) {
        self.state.borrow_mut().resize_listeners.remove(&id);
    }

    fn subscribe_input(
        &self,
        _surface: &Self::Surface,
        callback: Box<dyn FnMut(PointerInput)>,
    ) -> ViewerResult<ListenerId> {
        let mut state = self.state.borrow_mut();
        let id = ListenerId(state.next_id());
        state
            .input_listeners
            .insert(id, Rc::new(RefCell::new(callback)));
        Ok(id)
    }

    fn unsubscribe_input(&self, id: ListenerId) {
        self.state.borrow_mut().input_listeners.remove(&id);
    }

    fn start_frame_loop(&self, callback: Box<dyn FnMut()>) -> ViewerResult<FrameLoopHandle> {
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        state.frame_loops.insert(id, Rc::new(RefCell::new(callback)));
        Ok(FrameLoopHandle(id))
    }

    fn cancel_frame_loop(&self, handle: FrameLoopHandle) {
        self.state.borrow_mut().frame_loops.remove(&handle.0);
    }

    fn fetch(&self, locator: &str, done: FetchCallback) {
        self.state.borrow_mut().fetches.push(PendingFetch {
            locator: locator.to_owned(),
            done: Some(done),
        });
    }
}
