#![allow(missing_docs, reason = "TODO add later")]

mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;
mod format;
pub mod glb;
mod model;
mod renderer;
pub mod stl;

pub use error::{LoadError, StlError};
pub use format::{ModelFormat, ModelSource};
pub use model::{flat_normals, smooth_normals, Geometry, Material, Mesh, ModelNode};
pub use renderer::{Lighting, ModelRenderer, Vertex};

use log::debug;

/// Turns the raw bytes of a model file into a displayable node.
///
/// Geometry-only formats get wrapped into a node using [`Material::Normal`]. Scene graphs keep
/// their own hierarchy and materials.
pub fn load_model(format: ModelFormat, data: &[u8]) -> Result<ModelNode, LoadError> {
    let node = match format {
        ModelFormat::GeometryOnly => {
            ModelNode::with_material(stl::parse(data)?, Material::Normal)
        }
        ModelFormat::SceneGraph => glb::parse(data)?,
        ModelFormat::Unrecognized => {
            return Err(LoadError::UnsupportedFormat {
                locator: String::new(),
                extension: None,
                hint: None,
            })
        }
    };

    let triangles = node.triangle_count();
    if triangles == 0 {
        return Err(LoadError::EmptyModel);
    }
    debug!("loaded {format} model with {triangles} triangles");
    Ok(node)
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::fixtures::{binary_stl, box_stl, triangle_glb};

    #[test]
    fn stl_is_wrapped_into_the_normal_material() {
        let data = box_stl(Vec3::ZERO, Vec3::ONE);

        let node = load_model(ModelFormat::GeometryOnly, &data).expect("valid STL");

        assert_eq!(node.materials(), vec![Material::Normal], "synthetic material");
        assert_eq!(node.triangle_count(), 12, "triangles");
    }

    #[test]
    fn glb_keeps_its_own_materials() {
        let node = load_model(ModelFormat::SceneGraph, &triangle_glb()).expect("valid GLB");

        assert!(
            node.materials().iter().all(|material| !material.is_synthetic()),
            "no synthetic wrapping"
        );
    }

    #[test]
    fn models_without_triangles_are_rejected() {
        let data = binary_stl(&[]);
        assert_eq!(
            load_model(ModelFormat::GeometryOnly, &data),
            Err(LoadError::EmptyModel),
            "empty STL"
        );
    }

    #[test]
    fn unrecognized_formats_are_not_parsed() {
        let result = load_model(ModelFormat::Unrecognized, b"solid x\nendsolid x\n");
        assert!(
            matches!(result, Err(LoadError::UnsupportedFormat { .. })),
            "unexpected result {result:?}"
        );
    }
}
