use glam::{Mat4, Vec3};

/// A look-at camera in a right-handed, Y-up world.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub look_at: Vec3,
    pub up: Vec3,
}

impl Camera {
    #[must_use]
    pub fn new(eye: Vec3, center: Vec3) -> Self {
        Self {
            position: eye,
            look_at: center,
            up: Vec3::Y,
        }
    }

    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.look_at, self.up)
    }

    /// Distance between the eye and the point being looked at.
    #[must_use]
    pub fn distance(&self) -> f32 {
        self.position.distance(self.look_at)
    }

    /// Unit vector pointing from the look-at point towards the eye.
    ///
    /// Falls back to `+Z` if the eye sits on the look-at point.
    #[must_use]
    pub fn viewing_axis(&self) -> Vec3 {
        (self.position - self.look_at).normalize_or(Vec3::Z)
    }

    /// Moves the eye along the current viewing axis so that it ends up `distance` units away
    /// from the look-at point.
    pub fn set_distance(&mut self, distance: f32) {
        self.position = self.look_at + self.viewing_axis() * distance;
    }

    /// Turns the camera towards `target` without moving the eye.
    pub fn look_at(&mut self, target: Vec3) {
        self.look_at = target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_distance_keeps_the_viewing_axis() {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 100.0), Vec3::ZERO);

        camera.set_distance(9.0);

        assert!(
            camera.position.abs_diff_eq(Vec3::new(0.0, 0.0, 9.0), 1e-5),
            "unexpected position {}",
            camera.position
        );
        assert!((camera.distance() - 9.0).abs() < 1e-5, "distance mismatch");
    }

    #[test]
    fn degenerate_eye_falls_back_to_positive_z() {
        let mut camera = Camera::new(Vec3::ZERO, Vec3::ZERO);

        camera.set_distance(3.0);

        assert!(
            camera.position.abs_diff_eq(Vec3::new(0.0, 0.0, 3.0), 1e-6),
            "unexpected position {}",
            camera.position
        );
    }
}
