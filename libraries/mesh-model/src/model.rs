use glam::{Mat4, Quat, Vec3, Vec4};
use lib_geometry::Aabb;

/// Raw triangle data without any surface description.
///
/// A `Geometry` on its own is invisible: it has to be wrapped into a [`ModelNode`] together with a
/// [`Material`] before it can be put into a scene.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<Vec3>,
    /// one normal per position
    pub normals: Vec<Vec3>,
    /// triangle list indices, `None` means every three consecutive positions form a triangle
    pub indices: Option<Vec<u32>>,
}

impl Geometry {
    /// Builds a geometry with flat face normals from a non-indexed triangle list.
    #[must_use]
    pub fn from_triangles(positions: Vec<Vec3>) -> Self {
        let normals = flat_normals(&positions);
        Self {
            positions,
            normals,
            indices: None,
        }
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        match self.indices {
            Some(ref indices) => indices.len() / 3,
            None => self.positions.len() / 3,
        }
    }

    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.positions.iter().copied())
    }

    /// Index list suitable for drawing, generating the trivial one for non-indexed geometry.
    #[must_use]
    pub fn triangle_indices(&self) -> Vec<u32> {
        match self.indices {
            Some(ref indices) => indices.clone(),
            None => (0..self.positions.len())
                .filter_map(|index| u32::try_from(index).ok())
                .collect(),
        }
    }
}

/// Computes one face normal per triangle and assigns it to all three corners.
#[must_use]
pub fn flat_normals(positions: &[Vec3]) -> Vec<Vec3> {
    positions
        .chunks(3)
        .flat_map(|corners| {
            let normal = match *corners {
                [a, b, c] => face_normal(a, b, c),
                _ => Vec3::ZERO,
            };
            std::iter::repeat(normal).take(corners.len())
        })
        .collect()
}

/// Computes smooth vertex normals by accumulating the area-weighted face normals of an indexed
/// triangle list.
#[must_use]
pub fn smooth_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for triangle in indices.chunks_exact(3) {
        let &[ia, ib, ic] = triangle else {
            continue;
        };
        let [ia, ib, ic] = [ia, ib, ic].map(|index| index as usize);
        let (Some(&a), Some(&b), Some(&c)) =
            (positions.get(ia), positions.get(ib), positions.get(ic))
        else {
            log::warn!("skipping triangle with out-of-range index");
            continue;
        };
        // the cross product's length is twice the triangle area
        let weighted = (b - a).cross(c - a);
        for index in [ia, ib, ic] {
            if let Some(normal) = normals.get_mut(index) {
                *normal += weighted;
            }
        }
    }
    normals.iter().map(|normal| normal.normalize_or_zero()).collect()
}

pub(crate) fn face_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a).normalize_or_zero()
}

/// Describes how a surface reacts to light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Material {
    /// Colors each fragment by its surface normal. Needs no lights and no source data, which
    /// makes it the default for formats without material information.
    Normal,
    /// A metallic-roughness material as found in glTF files.
    Standard {
        base_color: Vec4,
        metallic: f32,
        roughness: f32,
    },
}

impl Material {
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        matches!(self, Material::Normal)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    pub geometry: Geometry,
    pub material: Material,
}

/// A node of a model hierarchy.
///
/// The transform is relative to the parent node. The root node's transform places the model in
/// the scene.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelNode {
    pub name: Option<String>,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub meshes: Vec<Mesh>,
    pub children: Vec<ModelNode>,
}

impl Default for ModelNode {
    fn default() -> Self {
        Self {
            name: None,
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }
}

impl ModelNode {
    /// Wraps bare geometry into a node so that it becomes visible with the given material.
    #[must_use]
    pub fn with_material(geometry: Geometry, material: Material) -> Self {
        Self {
            meshes: vec![Mesh { geometry, material }],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn group(name: Option<String>, children: Vec<ModelNode>) -> Self {
        Self {
            name,
            children,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Bounding box of everything below this node, expressed in the parent's coordinate space
    /// (i.e. including this node's own transform).
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        self.bounds_with(Mat4::IDENTITY)
    }

    fn bounds_with(&self, parent: Mat4) -> Aabb {
        let world = parent * self.local_matrix();
        let own = self
            .meshes
            .iter()
            .map(|mesh| mesh.geometry.bounds().transformed(&world))
            .fold(Aabb::EMPTY, Aabb::union);
        self.children
            .iter()
            .map(|child| child.bounds_with(world))
            .fold(own, Aabb::union)
    }

    /// Shifts the node so that the center of its bounding box ends up on the origin of the
    /// parent space. Returns the bounding box before the shift.
    pub fn center_on_origin(&mut self) -> Aabb {
        let bounds = self.bounds();
        self.translation -= bounds.center();
        bounds
    }

    /// Calls `visit` for every mesh together with its matrix relative to `parent`.
    pub fn visit_meshes<F>(&self, parent: Mat4, visit: &mut F)
    where
        F: FnMut(&Mesh, Mat4),
    {
        let world = parent * self.local_matrix();
        for mesh in &self.meshes {
            visit(mesh, world);
        }
        for child in &self.children {
            child.visit_meshes(world, visit);
        }
    }

    #[must_use]
    pub fn mesh_count(&self) -> usize {
        self.meshes.len() + self.children.iter().map(ModelNode::mesh_count).sum::<usize>()
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        let own: usize = self
            .meshes
            .iter()
            .map(|mesh| mesh.geometry.triangle_count())
            .sum();
        own + self
            .children
            .iter()
            .map(ModelNode::triangle_count)
            .sum::<usize>()
    }

    /// All materials used below this node in depth-first order.
    #[must_use]
    pub fn materials(&self) -> Vec<Material> {
        let mut materials = Vec::new();
        self.visit_meshes(Mat4::IDENTITY, &mut |mesh, _| materials.push(mesh.material));
        materials
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(center: Vec3, size: Vec3) -> Geometry {
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
        let positions = quads
            .iter()
            .flat_map(|&[a, b, c, d]| [a, b, c, a, c, d])
            .map(|(x, y, z)| corner(x, y, z))
            .collect();
        Geometry::from_triangles(positions)
    }

    #[test]
    fn flat_normals_point_outwards() {
        let geometry = cube(Vec3::ZERO, Vec3::ONE);
        assert_eq!(geometry.normals.len(), geometry.positions.len(), "one normal per vertex");
        for (position, normal) in geometry.positions.iter().zip(&geometry.normals) {
            assert!(position.dot(*normal) > 0.0, "normal {normal} at {position} points inwards");
        }
    }

    #[test]
    fn smooth_normals_average_adjacent_faces() {
        let positions = vec![
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
            Vec3::Z,
        ];
        let indices = [0, 2, 1, 0, 1, 3];
        let normals = smooth_normals(&positions, &indices);

        assert!(normals[2].abs_diff_eq(Vec3::NEG_Z, 1e-6), "only one face at vertex 2");
        let shared = normals[1];
        assert!(shared.z < 0.0 && shared.y < 0.0, "shared vertex mixes both faces: {shared}");
        assert!((shared.length() - 1.0).abs() < 1e-6, "normalized");
    }

    #[test]
    fn bounds_include_child_transforms() {
        let mut child = ModelNode::with_material(cube(Vec3::ZERO, Vec3::ONE), Material::Normal);
        child.translation = Vec3::new(10.0, 0.0, 0.0);
        child.scale = Vec3::splat(2.0);
        let root = ModelNode::group(None, vec![child]);

        let bounds = root.bounds();

        assert!(bounds.center().abs_diff_eq(Vec3::new(10.0, 0.0, 0.0), 1e-5), "center");
        assert!(bounds.size().abs_diff_eq(Vec3::splat(2.0), 1e-5), "size");
    }

    #[test]
    fn centering_moves_the_box_center_to_the_origin() {
        let mut node =
            ModelNode::with_material(cube(Vec3::new(10.0, 5.0, -3.0), Vec3::ONE), Material::Normal);

        let before = node.center_on_origin();

        assert!(before.center().abs_diff_eq(Vec3::new(10.0, 5.0, -3.0), 1e-5), "original center");
        assert!(
            node.bounds().center().abs_diff_eq(Vec3::ZERO, 1e-5),
            "centered at {}",
            node.bounds().center()
        );
    }

    #[test]
    fn counts_and_materials_cover_the_whole_hierarchy() {
        let red = Material::Standard {
            base_color: Vec4::new(1.0, 0.0, 0.0, 1.0),
            metallic: 0.0,
            roughness: 1.0,
        };
        let leaf = ModelNode::with_material(cube(Vec3::ZERO, Vec3::ONE), red);
        let root = ModelNode::group(Some("root".to_owned()), vec![leaf.clone(), leaf]);

        assert_eq!(root.mesh_count(), 2, "meshes");
        assert_eq!(root.triangle_count(), 24, "triangles");
        assert_eq!(root.materials(), vec![red, red], "materials");
    }

    #[test]
    fn non_indexed_geometry_gets_sequential_indices() {
        let geometry = cube(Vec3::ZERO, Vec3::ONE);
        let indices = geometry.triangle_indices();
        assert_eq!(indices.len(), 36, "index count");
        assert_eq!(indices.last(), Some(&35), "last index");
    }
}
