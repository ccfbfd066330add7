//! Reader for binary glTF (`.glb`) files.

use glam::{Quat, Vec3, Vec4};
use gltf::{buffer, mesh::Mode, Gltf};
use log::debug;

use crate::{
    model::{flat_normals, smooth_normals},
    Geometry, LoadError, Material, Mesh, ModelNode,
};

/// Parses a GLB container into a node hierarchy.
///
/// The returned root is a group holding the nodes of the default scene (or the first scene if
/// none is marked as default). Only the embedded binary chunk is supported as buffer source.
pub fn parse(data: &[u8]) -> Result<ModelNode, LoadError> {
    let gltf = Gltf::from_slice(data)?;
    let buffers = collect_buffers(&gltf)?;

    let Some(scene) = gltf.default_scene().or_else(|| gltf.scenes().next()) else {
        debug!("GLB file contains no scene");
        return Ok(ModelNode::default());
    };

    let children = scene
        .nodes()
        .map(|node| convert_node(&node, &buffers))
        .collect();

    Ok(ModelNode::group(scene.name().map(ToOwned::to_owned), children))
}

fn collect_buffers(gltf: &Gltf) -> Result<Vec<&[u8]>, LoadError> {
    gltf.buffers()
        .map(|buffer| match buffer.source() {
            buffer::Source::Bin => {
                let blob = gltf.blob.as_deref().ok_or_else(|| LoadError::Gltf {
                    message: "binary chunk is missing".to_owned(),
                })?;
                if blob.len() < buffer.length() {
                    return Err(LoadError::Gltf {
                        message: format!(
                            "binary chunk holds {} bytes but the buffer needs {}",
                            blob.len(),
                            buffer.length()
                        ),
                    });
                }
                Ok(blob)
            }
            buffer::Source::Uri(uri) => Err(LoadError::Gltf {
                message: format!("external buffer `{uri}` is not supported"),
            }),
        })
        .collect()
}

fn convert_node(node: &gltf::Node<'_>, buffers: &[&[u8]]) -> ModelNode {
    let (translation, rotation, scale) = node.transform().decomposed();

    let meshes = node
        .mesh()
        .map(|mesh| {
            mesh.primitives()
                .filter_map(|primitive| convert_primitive(&primitive, buffers))
                .collect()
        })
        .unwrap_or_default();

    ModelNode {
        name: node.name().map(ToOwned::to_owned),
        translation: Vec3::from(translation),
        rotation: Quat::from_array(rotation),
        scale: Vec3::from(scale),
        meshes,
        children: node
            .children()
            .map(|child| convert_node(&child, buffers))
            .collect(),
    }
}

fn convert_primitive(primitive: &gltf::Primitive<'_>, buffers: &[&[u8]]) -> Option<Mesh> {
    if primitive.mode() != Mode::Triangles {
        debug!(
            "skipping primitive {} with mode {:?}",
            primitive.index(),
            primitive.mode()
        );
        return None;
    }

    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).copied());

    let positions: Vec<Vec3> = reader.read_positions()?.map(Vec3::from).collect();
    let indices: Option<Vec<u32>> = reader
        .read_indices()
        .map(|indices| indices.into_u32().collect());

    let normals = match reader.read_normals() {
        Some(normals) => normals.map(Vec3::from).collect(),
        None => match indices {
            Some(ref indices) => smooth_normals(&positions, indices),
            None => flat_normals(&positions),
        },
    };

    let pbr = primitive.material().pbr_metallic_roughness();
    let material = Material::Standard {
        base_color: Vec4::from(pbr.base_color_factor()),
        metallic: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
    };

    Some(Mesh {
        geometry: Geometry {
            positions,
            normals,
            indices,
        },
        material,
    })
}
