//! Small model files built in memory, shared by the tests of this crate and its dependents.

use glam::Vec3;

const JSON_CHUNK: u32 = 0x4E4F_534A;
const BIN_CHUNK: u32 = 0x004E_4942;

fn le_length(len: usize) -> [u8; 4] {
    u32::try_from(len).unwrap_or(u32::MAX).to_le_bytes()
}

/// Encodes triangles as binary STL with zeroed normals.
#[must_use]
pub fn binary_stl(triangles: &[[Vec3; 3]]) -> Vec<u8> {
    let mut data = vec![0_u8; 80];
    data.extend(le_length(triangles.len()));
    for triangle in triangles {
        data.extend([0_u8; 12]);
        for component in triangle.iter().flat_map(|corner| corner.to_array()) {
            data.extend(component.to_le_bytes());
        }
        data.extend([0_u8; 2]);
    }
    data
}

/// Twelve triangles forming an axis-aligned box.
#[must_use]
pub fn box_triangles(center: Vec3, size: Vec3) -> Vec<[Vec3; 3]> {
    let half = size * 0.5;
    let corner = |x: f32, y: f32, z: f32| center + half * Vec3::new(x, y, z);
    let quads = [
        [(-1., -1., 1.), (1., -1., 1.), (1., 1., 1.), (-1., 1., 1.)],
        [(1., -1., -1.), (-1., -1., -1.), (-1., 1., -1.), (1., 1., -1.)],
        [(1., -1., 1.), (1., -1., -1.), (1., 1., -1.), (1., 1., 1.)],
        [(-1., -1., -1.), (-1., -1., 1.), (-1., 1., 1.), (-1., 1., -1.)],
        [(-1., 1., 1.), (1., 1., 1.), (1., 1., -1.), (-1., 1., -1.)],
        [(-1., -1., -1.), (1., -1., -1.), (1., -1., 1.), (-1., -1., 1.)],
    ];
    quads
        .iter()
        .flat_map(|&[a, b, c, d]| [[a, b, c], [a, c, d]])
        .map(|triangle| triangle.map(|(x, y, z)| corner(x, y, z)))
        .collect()
}

/// Binary STL of an axis-aligned box.
#[must_use]
pub fn box_stl(center: Vec3, size: Vec3) -> Vec<u8> {
    binary_stl(&box_triangles(center, size))
}

/// Assembles a GLB container from a JSON document and its binary chunk.
#[must_use]
pub fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
    let mut json = json.as_bytes().to_vec();
    json.resize(json.len().next_multiple_of(4), b' ');
    let mut bin = bin.to_vec();
    bin.resize(bin.len().next_multiple_of(4), 0);

    let bin_chunk = if bin.is_empty() { 0 } else { 8 + bin.len() };
    let total = 12 + 8 + json.len() + bin_chunk;

    let mut data = Vec::with_capacity(total);
    data.extend(b"glTF");
    data.extend(2_u32.to_le_bytes());
    data.extend(le_length(total));
    data.extend(le_length(json.len()));
    data.extend(JSON_CHUNK.to_le_bytes());
    data.extend(json);
    if !bin.is_empty() {
        data.extend(le_length(bin.len()));
        data.extend(BIN_CHUNK.to_le_bytes());
        data.extend(bin);
    }
    data
}

/// One indexed triangle in a child node, plus a line primitive that must be skipped.
///
/// The scene is called `workshop`, its only node `assembly` holds the mesh node `bracket`.
#[must_use]
pub fn triangle_glb() -> Vec<u8> {
    let json = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [ { "name": "workshop", "nodes": [0] } ],
        "nodes": [
            { "name": "assembly", "children": [1], "translation": [0, 0, -5] },
            { "name": "bracket", "mesh": 0, "translation": [1, 2, 3], "scale": [2, 2, 2] }
        ],
        "meshes": [ { "primitives": [
            { "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 },
            { "attributes": { "POSITION": 0 }, "indices": 1, "mode": 1 }
        ] } ],
        "materials": [ { "pbrMetallicRoughness": {
            "baseColorFactor": [1.0, 0.5, 0.25, 1.0],
            "metallicFactor": 0.25,
            "roughnessFactor": 0.75
        } } ],
        "buffers": [ { "byteLength": 44 } ],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
              "min": [0, 0, 0], "max": [1, 1, 0] },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ]
    }"#;

    let mut bin = Vec::new();
    for component in [0.0_f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
        bin.extend(component.to_le_bytes());
    }
    for index in [0_u16, 1, 2] {
        bin.extend(index.to_le_bytes());
    }
    glb(json, &bin)
}
