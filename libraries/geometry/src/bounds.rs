use glam::{Mat4, Vec3};

/// Axis-aligned bounding box.
///
/// An empty box has `min > max` on every axis, so extending it with the first point turns it
/// into a degenerate box around that point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Vec3>,
    {
        points.into_iter().fold(Self::EMPTY, Self::extended)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    #[must_use]
    pub fn extended(self, point: Vec3) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        if other.is_empty() {
            return self;
        }
        if self.is_empty() {
            return other;
        }
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Center of the box, or the origin for an empty box.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }
        (self.min + self.max) * 0.5
    }

    /// Extent along each axis, zero for an empty box.
    #[must_use]
    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }
        self.max - self.min
    }

    #[must_use]
    pub fn max_dimension(&self) -> f32 {
        self.size().max_element()
    }

    #[must_use]
    pub fn corners(&self) -> [Vec3; 8] {
        let Self { min, max } = *self;
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ]
    }

    /// Smallest axis-aligned box containing this box after applying `matrix`.
    #[must_use]
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        Self::from_points(
            self.corners()
                .into_iter()
                .map(|corner| matrix.transform_point3(corner)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn empty_box_has_no_extent() {
        let aabb = Aabb::from_points([]);
        assert!(aabb.is_empty(), "no points yield an empty box");
        assert_eq!(aabb.size(), Vec3::ZERO, "empty size");
        assert_eq!(aabb.center(), Vec3::ZERO, "empty center");
    }

    #[test]
    fn center_and_size_of_offset_cube() {
        let aabb = Aabb::from_points([Vec3::new(9.5, 4.5, -3.5), Vec3::new(10.5, 5.5, -2.5)]);

        assert!(
            aabb.center().abs_diff_eq(Vec3::new(10.0, 5.0, -3.0), 1e-6),
            "center {}",
            aabb.center()
        );
        assert!(aabb.size().abs_diff_eq(Vec3::ONE, 1e-6), "size {}", aabb.size());
    }

    #[test]
    fn max_dimension_picks_the_largest_axis() {
        let aabb = Aabb::new(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(1.0, 2.0, 3.0));
        assert!((aabb.max_dimension() - 6.0).abs() < 1e-6, "largest axis is z");
    }

    #[test]
    fn union_ignores_empty_boxes() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(aabb.union(Aabb::EMPTY), aabb, "right side empty");
        assert_eq!(Aabb::EMPTY.union(aabb), aabb, "left side empty");
    }

    #[test]
    fn transformed_box_encloses_rotated_corners() {
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::ONE);
        let matrix = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_4),
            Vec3::new(5.0, 0.0, 0.0),
        );

        let transformed = aabb.transformed(&matrix);

        let half_diagonal = 2.0 * std::f32::consts::SQRT_2;
        assert!(
            transformed.center().abs_diff_eq(Vec3::new(5.0, 0.0, 0.0), 1e-5),
            "center {}",
            transformed.center()
        );
        assert!(
            (transformed.size().x - 2.0 * half_diagonal).abs() < 1e-4,
            "rotated width {}",
            transformed.size().x
        );
        assert!((transformed.size().y - 4.0).abs() < 1e-5, "height");
    }
}
