#![allow(missing_docs, reason = "TODO document the public viewer API")]

mod config;
mod error;
mod host;
pub mod logging;
mod props;
mod render_surface;
mod renderer;
mod scene;
mod session;
mod status;
mod viewer;

#[cfg(test)]
mod test_support;

pub use config::{Color, ViewerConfig};
pub use error::{ViewerError, ViewerResult};
pub use host::{FetchCallback, FrameLoopHandle, Host, ListenerId, PointerInput, SurfaceSize};
pub use lib_mesh_model::{LoadError, ModelFormat, ModelSource};
pub use props::{Length, ViewerProps};
pub use render_surface::{RenderSurface, SetupFuture};
pub use renderer::Renderer;
pub use scene::{frame_model, AmbientLight, DirectionalLight, Scene};
pub use status::ViewerStatus;
pub use viewer::ModelViewer;
