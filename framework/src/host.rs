use lib_mesh_model::LoadError;

use crate::{Length, Renderer, ViewerConfig, ViewerResult};

/// Size of a drawing surface in physical pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Converts a region size in CSS pixels into physical pixels.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "the rounded values are clamped to the u32 range first"
    )]
    pub fn from_region((width, height): (u32, u32), pixel_ratio: f64) -> Self {
        let pixel_ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
            pixel_ratio
        } else {
            1.0
        };
        let scale = |css: u32| (f64::from(css) * pixel_ratio).round().clamp(0.0, f64::from(u32::MAX)) as u32;
        Self {
            width: scale(width),
            height: scale(height),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Identifies an event subscription so it can be removed again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Identifies a running frame loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameLoopHandle(pub u64);

/// Pointer gestures on the surface, already translated into camera intents.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerInput {
    /// drag with the primary button, in CSS pixels
    Rotate { delta_x: f32, delta_y: f32 },
    /// drag with the secondary button, in CSS pixels
    Pan { delta_x: f32, delta_y: f32 },
    /// wheel movement, positive values move away from the model
    Zoom { delta: f32 },
}

pub type FetchCallback = Box<dyn FnOnce(Result<Vec<u8>, LoadError>)>;

/// The platform a viewer runs on.
///
/// A host owns the display region the viewer draws into and provides everything that depends on
/// the environment: drawing surfaces, event subscriptions, frame scheduling and network access.
/// All callbacks are invoked from the host's event loop, never from within one of these methods.
pub trait Host: 'static {
    type Surface;
    type Renderer: Renderer;

    /// Current size of the display region in CSS pixels.
    fn region_size(&self) -> (u32, u32);

    /// Physical pixels per CSS pixel.
    fn pixel_ratio(&self) -> f64;

    /// Applies the requested size to the display region.
    fn apply_region_size(&self, width: &Length, height: &Length);

    fn create_surface(&self, size: SurfaceSize) -> ViewerResult<Self::Surface>;

    /// Changes the number of pixels backing the surface.
    fn resize_surface(&self, surface: &Self::Surface, size: SurfaceSize);

    fn create_renderer(
        &self,
        surface: &Self::Surface,
        size: SurfaceSize,
        config: &ViewerConfig,
    ) -> ViewerResult<Self::Renderer>;

    fn attach_surface(&self, surface: &Self::Surface) -> ViewerResult<()>;

    /// Removes the surface from the display region. Surfaces that are not attached (anymore) are
    /// ignored.
    fn detach_surface(&self, surface: &Self::Surface);

    fn subscribe_resize(&self, callback: Box<dyn FnMut()>) -> ViewerResult<ListenerId>;

    fn unsubscribe_resize(&self, id: ListenerId);

    fn subscribe_input(
        &self,
        surface: &Self::Surface,
        callback: Box<dyn FnMut(PointerInput)>,
    ) -> ViewerResult<ListenerId>;

    fn unsubscribe_input(&self, id: ListenerId);

    /// Calls `callback` once per displayed frame until the loop gets cancelled.
    fn start_frame_loop(&self, callback: Box<dyn FnMut()>) -> ViewerResult<FrameLoopHandle>;

    /// Stops the loop. After this returns the callback will not be called again.
    fn cancel_frame_loop(&self, handle: FrameLoopHandle);

    /// Retrieves the resource at `locator` and reports the outcome to `done` later on.
    fn fetch(&self, locator: &str, done: FetchCallback);
}
