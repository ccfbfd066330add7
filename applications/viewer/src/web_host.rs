use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    rc::Rc,
};

use js_sys::Uint8Array;
use tracing::{debug, trace, warn};
use viewer_framework::{
    FetchCallback, FrameLoopHandle, Host, Length, ListenerId, LoadError, PointerInput,
    RenderSurface, SurfaceSize, ViewerConfig, ViewerError, ViewerResult,
};
use wasm_bindgen::{closure::Closure, JsCast};
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{
    Document, Event, EventTarget, HtmlCanvasElement, HtmlElement, PointerEvent, Response,
    WheelEvent, Window,
};

use crate::error::{describe_js_error, ApplicationError, ApplicationResult};

/// A DOM event listener that is removed again when dropped.
struct EventListener {
    target: EventTarget,
    kind: &'static str,
    closure: Closure<dyn FnMut(Event)>,
}

impl EventListener {
    fn add(
        target: &EventTarget,
        kind: &'static str,
        handler: impl FnMut(Event) + 'static,
    ) -> ViewerResult<Self> {
        let closure = Closure::<dyn FnMut(Event)>::new(handler);
        target
            .add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())
            .map_err(|error| {
                ViewerError::Subscription(format!(
                    "cannot listen to {kind} events: {}",
                    describe_js_error(&error)
                ))
            })?;
        Ok(Self {
            target: target.clone(),
            kind,
            closure,
        })
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        let removed = self
            .target
            .remove_event_listener_with_callback(self.kind, self.closure.as_ref().unchecked_ref());
        if let Err(error) = removed {
            warn!(
                "failed to remove {} listener: {}",
                self.kind,
                describe_js_error(&error)
            );
        }
    }
}

/// A `requestAnimationFrame` chain. The closure re-schedules itself until it is taken out of its
/// slot.
struct FrameLoop {
    request_id: Rc<Cell<Option<i32>>>,
    closure: Rc<RefCell<Option<Closure<dyn FnMut()>>>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DragMode {
    Rotate,
    Pan,
}

#[derive(Clone, Copy, Debug)]
struct Drag {
    mode: DragMode,
    pointer_id: i32,
    x: i32,
    y: i32,
}

/// Hosts viewers inside a DOM element of the current page.
pub(crate) struct WebHost {
    window: Window,
    document: Document,
    container: HtmlElement,
    next_id: Cell<u64>,
    listeners: RefCell<BTreeMap<ListenerId, Vec<EventListener>>>,
    frame_loops: RefCell<BTreeMap<u64, FrameLoop>>,
}

impl WebHost {
    pub(crate) fn new(container: HtmlElement) -> ApplicationResult<Self> {
        let window = web_sys::window().ok_or(ApplicationError::NoWindow)?;
        let document = window.document().ok_or(ApplicationError::NoDocument)?;
        Ok(Self {
            window,
            document,
            container,
            next_id: Cell::new(0),
            listeners: RefCell::default(),
            frame_loops: RefCell::default(),
        })
    }

    fn next_id(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    fn register(&self, listeners: Vec<EventListener>) -> ListenerId {
        let id = ListenerId(self.next_id());
        self.listeners.borrow_mut().insert(id, listeners);
        id
    }

    fn unregister(&self, id: ListenerId) {
        // dropped outside the borrow, removing a listener may run arbitrary code
        let listeners = self.listeners.borrow_mut().remove(&id);
        drop(listeners);
    }
}

fn set_style(element: &HtmlElement, property: &str, value: &str) {
    if let Err(error) = element.style().set_property(property, value) {
        warn!(
            "failed to set {property} to {value}: {}",
            describe_js_error(&error)
        );
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "pointer movements between two events are small"
)]
fn pointer_delta(from: i32, to: i32) -> f32 {
    to.saturating_sub(from) as f32
}

impl Host for WebHost {
    type Surface = HtmlCanvasElement;
    type Renderer = RenderSurface;

    fn region_size(&self) -> (u32, u32) {
        let width = u32::try_from(self.container.client_width()).unwrap_or_default();
        let height = u32::try_from(self.container.client_height()).unwrap_or_default();
        (width, height)
    }

    fn pixel_ratio(&self) -> f64 {
        self.window.device_pixel_ratio()
    }

    fn apply_region_size(&self, width: &Length, height: &Length) {
        set_style(&self.container, "width", &width.to_string());
        set_style(&self.container, "height", &height.to_string());
    }

    fn create_surface(&self, size: SurfaceSize) -> ViewerResult<Self::Surface> {
        let canvas = self
            .document
            .create_element("canvas")
            .map_err(|error| ViewerError::Surface(describe_js_error(&error)))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|element| ViewerError::Surface(format!("not a canvas: {element:?}")))?;

        canvas.set_width(size.width);
        canvas.set_height(size.height);
        set_style(&canvas, "display", "block");
        set_style(&canvas, "width", "100%");
        set_style(&canvas, "height", "100%");
        // pointer gestures belong to the orbit controls, not to page scrolling
        set_style(&canvas, "touch-action", "none");
        Ok(canvas)
    }

    fn resize_surface(&self, surface: &Self::Surface, size: SurfaceSize) {
        surface.set_width(size.width);
        surface.set_height(size.height);
    }

    fn create_renderer(
        &self,
        surface: &Self::Surface,
        size: SurfaceSize,
        config: &ViewerConfig,
    ) -> ViewerResult<Self::Renderer> {
        RenderSurface::new(
            wgpu::SurfaceTarget::Canvas(surface.clone()),
            size,
            config,
            spawn_local,
        )
    }

    fn attach_surface(&self, surface: &Self::Surface) -> ViewerResult<()> {
        self.container
            .append_child(surface)
            .map_err(|error| ViewerError::Surface(describe_js_error(&error)))?;
        Ok(())
    }

    fn detach_surface(&self, surface: &Self::Surface) {
        if surface.parent_node().is_some() {
            surface.remove();
        }
    }

    fn subscribe_resize(&self, mut callback: Box<dyn FnMut()>) -> ViewerResult<ListenerId> {
        let target: EventTarget = self.window.clone().into();
        let listener = EventListener::add(&target, "resize", move |_| callback())?;
        Ok(self.register(vec![listener]))
    }

    fn unsubscribe_resize(&self, id: ListenerId) {
        self.unregister(id);
    }

    fn subscribe_input(
        &self,
        surface: &Self::Surface,
        callback: Box<dyn FnMut(PointerInput)>,
    ) -> ViewerResult<ListenerId> {
        let callback = Rc::new(RefCell::new(callback));
        let drag = Rc::new(Cell::new(None::<Drag>));
        let target: EventTarget = surface.clone().into();

        let on_down = {
            let drag = Rc::clone(&drag);
            let canvas = surface.clone();
            move |event: Event| {
                let Some(event) = event.dyn_ref::<PointerEvent>() else {
                    return;
                };
                let mode = match event.button() {
                    0 if event.shift_key() || event.ctrl_key() || event.meta_key() => DragMode::Pan,
                    0 => DragMode::Rotate,
                    2 => DragMode::Pan,
                    _ => return,
                };
                if let Err(error) = canvas.set_pointer_capture(event.pointer_id()) {
                    trace!("pointer capture refused: {}", describe_js_error(&error));
                }
                drag.set(Some(Drag {
                    mode,
                    pointer_id: event.pointer_id(),
                    x: event.client_x(),
                    y: event.client_y(),
                }));
            }
        };

        let on_move = {
            let drag = Rc::clone(&drag);
            let callback = Rc::clone(&callback);
            move |event: Event| {
                let (Some(event), Some(mut current)) = (event.dyn_ref::<PointerEvent>(), drag.get())
                else {
                    return;
                };
                if event.pointer_id() != current.pointer_id {
                    return;
                }
                let delta_x = pointer_delta(current.x, event.client_x());
                let delta_y = pointer_delta(current.y, event.client_y());
                current.x = event.client_x();
                current.y = event.client_y();
                drag.set(Some(current));

                let input = match current.mode {
                    DragMode::Rotate => PointerInput::Rotate { delta_x, delta_y },
                    DragMode::Pan => PointerInput::Pan { delta_x, delta_y },
                };
                (callback.borrow_mut())(input);
            }
        };

        let on_up = {
            let drag = Rc::clone(&drag);
            let canvas = surface.clone();
            move |event: Event| {
                if let Some(event) = event.dyn_ref::<PointerEvent>() {
                    if let Err(error) = canvas.release_pointer_capture(event.pointer_id()) {
                        trace!("no pointer capture to release: {}", describe_js_error(&error));
                    }
                }
                drag.set(None);
            }
        };

        let on_wheel = {
            let callback = Rc::clone(&callback);
            move |event: Event| {
                let Some(wheel) = event.dyn_ref::<WheelEvent>() else {
                    return;
                };
                event.prevent_default();
                let delta_y = wheel.delta_y();
                let delta = if delta_y > 0.0 {
                    1.0
                } else if delta_y < 0.0 {
                    -1.0
                } else {
                    return;
                };
                (callback.borrow_mut())(PointerInput::Zoom { delta });
            }
        };

        let listeners = vec![
            EventListener::add(&target, "pointerdown", on_down)?,
            EventListener::add(&target, "pointermove", on_move)?,
            EventListener::add(&target, "pointerup", on_up.clone())?,
            EventListener::add(&target, "pointercancel", on_up)?,
            EventListener::add(&target, "wheel", on_wheel)?,
            EventListener::add(&target, "contextmenu", |event: Event| event.prevent_default())?,
        ];
        Ok(self.register(listeners))
    }

    fn unsubscribe_input(&self, id: ListenerId) {
        self.unregister(id);
    }

    fn start_frame_loop(&self, mut callback: Box<dyn FnMut()>) -> ViewerResult<FrameLoopHandle> {
        let frame_loop = FrameLoop {
            request_id: Rc::default(),
            closure: Rc::default(),
        };

        let slot = Rc::downgrade(&frame_loop.closure);
        let request_id = Rc::clone(&frame_loop.request_id);
        let window = self.window.clone();
        let closure = Closure::<dyn FnMut()>::new(move || {
            request_id.set(None);
            callback();

            // the slot is emptied when the loop is cancelled
            let Some(slot) = slot.upgrade() else {
                return;
            };
            let slot = slot.borrow();
            let Some(ref closure) = *slot else {
                return;
            };
            match window.request_animation_frame(closure.as_ref().unchecked_ref()) {
                Ok(id) => request_id.set(Some(id)),
                Err(error) => warn!("failed to request animation frame: {}", describe_js_error(&error)),
            }
        });

        let first_request = self
            .window
            .request_animation_frame(closure.as_ref().unchecked_ref())
            .map_err(|error| {
                ViewerError::Subscription(format!(
                    "cannot request animation frames: {}",
                    describe_js_error(&error)
                ))
            })?;
        frame_loop.request_id.set(Some(first_request));
        *frame_loop.closure.borrow_mut() = Some(closure);

        let id = self.next_id();
        self.frame_loops.borrow_mut().insert(id, frame_loop);
        debug!("started frame loop {id}");
        Ok(FrameLoopHandle(id))
    }

    fn cancel_frame_loop(&self, handle: FrameLoopHandle) {
        let Some(frame_loop) = self.frame_loops.borrow_mut().remove(&handle.0) else {
            return;
        };
        if let Some(request_id) = frame_loop.request_id.take() {
            if let Err(error) = self.window.cancel_animation_frame(request_id) {
                warn!("failed to cancel animation frame: {}", describe_js_error(&error));
            }
        }
        let closure = frame_loop.closure.borrow_mut().take();
        drop(closure);
        debug!("cancelled frame loop {}", handle.0);
    }

    fn fetch(&self, locator: &str, done: FetchCallback) {
        let window = self.window.clone();
        let locator = locator.to_owned();
        spawn_local(async move {
            let result = fetch_bytes(&window, &locator)
                .await
                .map_err(|message| LoadError::Fetch {
                    locator: locator.clone(),
                    message,
                });
            done(result);
        });
    }
}

async fn fetch_bytes(window: &Window, locator: &str) -> Result<Vec<u8>, String> {
    debug!("fetching {locator}");
    let response = JsFuture::from(window.fetch_with_str(locator))
        .await
        .map_err(|error| describe_js_error(&error))?;
    let response = response
        .dyn_into::<Response>()
        .map_err(|value| format!("unexpected fetch result {value:?}"))?;
    if !response.ok() {
        return Err(format!(
            "HTTP {} {}",
            response.status(),
            response.status_text()
        ));
    }

    let buffer = response
        .array_buffer()
        .map_err(|error| describe_js_error(&error))?;
    let buffer = JsFuture::from(buffer)
        .await
        .map_err(|error| describe_js_error(&error))?;
    Ok(Uint8Array::new(&buffer).to_vec())
}
