#![allow(missing_docs, reason = "TODO add later")]

mod bounds;
mod camera;
mod orbit;
mod projection;

pub use bounds::Aabb;
pub use camera::Camera;
pub use orbit::OrbitController;
pub use projection::Projection;
