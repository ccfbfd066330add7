use glam::{Vec3, Vec4};
use lib_geometry::{Aabb, Camera, OrbitController};
use lib_mesh_model::{Lighting, ModelNode};
use tracing::debug;

use crate::{config::Color, ViewerConfig};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    pub color: Color,
    pub intensity: f32,
    /// direction from the scene towards the light
    pub direction: Vec3,
}

/// Everything that is drawn: background, lights and at most one model.
#[derive(Clone, Debug)]
pub struct Scene {
    pub background: Color,
    pub ambient_light: AmbientLight,
    pub directional_light: DirectionalLight,
    model: Option<ModelNode>,
    /// bumped on every model change so renderers know when to upload again
    revision: u64,
}

impl Scene {
    #[must_use]
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            background: config.background,
            ambient_light: AmbientLight {
                color: config.ambient_color,
                intensity: config.ambient_intensity,
            },
            directional_light: DirectionalLight {
                color: config.directional_color,
                intensity: config.directional_intensity,
                direction: Vec3::from(config.light_direction),
            },
            model: None,
            revision: 0,
        }
    }

    #[must_use]
    pub fn model(&self) -> Option<&ModelNode> {
        self.model.as_ref()
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn insert_model(&mut self, model: ModelNode) {
        self.model = Some(model);
        self.revision += 1;
    }

    /// Removes the model, returning it if there was one.
    pub fn clear_model(&mut self) -> Option<ModelNode> {
        let model = self.model.take();
        if model.is_some() {
            self.revision += 1;
        }
        model
    }

    /// Linear background color for clearing the surface.
    #[must_use]
    pub fn clear_color(&self) -> Vec4 {
        self.background.to_linear().extend(1.0)
    }

    #[must_use]
    pub fn lighting(&self) -> Lighting {
        Lighting {
            ambient: self.ambient_light.color.to_linear() * self.ambient_light.intensity,
            direction: self.directional_light.direction,
            directional: self.directional_light.color.to_linear()
                * self.directional_light.intensity,
        }
    }
}

/// Centers `model` on the origin and moves the camera back along its viewing axis until the
/// whole model is in view. Returns the bounding box the model had before centering.
pub fn frame_model(
    model: &mut ModelNode,
    camera: &mut Camera,
    controller: &mut OrbitController,
    fit_factor: f32,
) -> Aabb {
    let bounds = model.center_on_origin();
    let max_dimension = bounds.max_dimension();

    camera.look_at(Vec3::ZERO);
    if max_dimension > 0.0 {
        camera.set_distance(max_dimension * fit_factor);
    }
    controller.reset_target(Vec3::ZERO);
    controller.update(camera);

    debug!(
        "framed model of size {} at distance {}",
        bounds.size(),
        camera.distance()
    );
    bounds
}
