use lib_geometry::{Camera, Projection};

use crate::{Scene, SurfaceSize};

/// Draws a [`Scene`] onto the surface it was created for.
pub trait Renderer {
    fn resize(&mut self, size: SurfaceSize);

    fn render(&mut self, scene: &Scene, camera: &Camera, projection: &Projection);

    /// Releases every GPU resource. Further calls to [`Renderer::render`] draw nothing.
    fn dispose(&mut self);
}
