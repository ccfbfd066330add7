use std::f32::consts::{PI, TAU};

use glam::Vec3;
use log::trace;

use crate::Camera;

/// Keeps the polar angle away from the poles where the up vector degenerates.
const POLAR_EPSILON: f32 = 1e-6;

/// Movements below this threshold no longer count as camera motion.
const MOTION_EPSILON: f32 = 1e-6;

/// Rotates, zooms and pans a [`Camera`] around a target point.
///
/// User input only accumulates deltas. They are applied to the camera in [`OrbitController::update`]
/// which is meant to be called once per frame. With damping enabled only a fraction of the pending
/// deltas is applied per update, so the camera keeps gliding and slows down after the input stopped.
#[derive(Clone, Debug)]
pub struct OrbitController {
    pub target: Vec3,
    pub enable_damping: bool,
    /// fraction of the pending motion applied and removed per update
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    azimuth_delta: f32,
    polar_delta: f32,
    scale: f32,
    pan_offset: Vec3,
}

impl OrbitController {
    #[must_use]
    pub fn new(target: Vec3) -> Self {
        Self {
            target,
            enable_damping: false,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            azimuth_delta: 0.0,
            polar_delta: 0.0,
            scale: 1.0,
            pan_offset: Vec3::ZERO,
        }
    }

    #[must_use]
    pub fn with_damping(mut self, damping_factor: f32) -> Self {
        self.enable_damping = true;
        self.damping_factor = damping_factor.clamp(0.0, 1.0);
        self
    }

    /// Queue a rotation caused by dragging `delta_x`/`delta_y` pixels across a viewport of the
    /// given height. Dragging across the full height turns the camera once around the target.
    pub fn rotate(&mut self, delta_x: f32, delta_y: f32, viewport_height: f32) {
        let viewport_height = viewport_height.max(1.0);
        self.azimuth_delta -= TAU * delta_x / viewport_height * self.rotate_speed;
        self.polar_delta -= TAU * delta_y / viewport_height * self.rotate_speed;
    }

    /// Queue a zoom step. Positive deltas (scrolling down) move the camera away from the target.
    pub fn zoom(&mut self, delta: f32) {
        let step = 0.95_f32.powf(self.zoom_speed);
        if delta > 0.0 {
            self.scale /= step;
        } else if delta < 0.0 {
            self.scale *= step;
        }
    }

    /// Queue a pan of the target by `delta_x`/`delta_y` pixels in screen space.
    ///
    /// The pixel distance is converted into world units at the target's depth, so the point
    /// under the cursor roughly follows the pointer.
    pub fn pan(&mut self, delta_x: f32, delta_y: f32, camera: &Camera, viewport_height: f32, fov: f32) {
        let viewport_height = viewport_height.max(1.0);
        let offset = camera.position - self.target;
        let target_distance = offset.length() * (fov * 0.5).tan();
        let units_per_pixel = 2.0 * target_distance / viewport_height * self.pan_speed;

        let forward = (-offset).normalize_or_zero();
        let right = forward.cross(camera.up).normalize_or_zero();
        let up = right.cross(forward).normalize_or_zero();

        self.pan_offset += right * (-delta_x * units_per_pixel) + up * (delta_y * units_per_pixel);
    }

    /// Point the controller at a new target and drop all pending motion.
    pub fn reset_target(&mut self, target: Vec3) {
        self.target = target;
        self.azimuth_delta = 0.0;
        self.polar_delta = 0.0;
        self.scale = 1.0;
        self.pan_offset = Vec3::ZERO;
    }

    /// `true` if there is still motion waiting to be applied.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        self.azimuth_delta.abs() > MOTION_EPSILON
            || self.polar_delta.abs() > MOTION_EPSILON
            || (self.scale - 1.0).abs() > MOTION_EPSILON
            || self.pan_offset.length_squared() > MOTION_EPSILON * MOTION_EPSILON
    }

    /// Apply (a damped share of) the pending motion to `camera`.
    ///
    /// Returns `true` if the camera was changed.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let offset = camera.position - self.target;
        let radius = offset.length();

        let mut azimuth = offset.x.atan2(offset.z);
        let mut polar = if radius > 0.0 {
            (offset.y / radius).clamp(-1.0, 1.0).acos()
        } else {
            PI * 0.5
        };

        let share = if self.enable_damping {
            self.damping_factor
        } else {
            1.0
        };

        azimuth += self.azimuth_delta * share;
        polar = (polar + self.polar_delta * share).clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
        let new_radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);
        self.target += self.pan_offset * share;

        let sin_polar = polar.sin();
        let new_offset = Vec3::new(
            new_radius * sin_polar * azimuth.sin(),
            new_radius * polar.cos(),
            new_radius * sin_polar * azimuth.cos(),
        );

        let previous_position = camera.position;
        let previous_look_at = camera.look_at;
        camera.position = self.target + new_offset;
        camera.look_at = self.target;

        if self.enable_damping {
            let decay = 1.0 - self.damping_factor;
            self.azimuth_delta *= decay;
            self.polar_delta *= decay;
            self.pan_offset *= decay;
        } else {
            self.azimuth_delta = 0.0;
            self.polar_delta = 0.0;
            self.pan_offset = Vec3::ZERO;
        }
        self.scale = 1.0;

        let moved = previous_position.distance_squared(camera.position)
            > MOTION_EPSILON * MOTION_EPSILON
            || previous_look_at.distance_squared(camera.look_at) > MOTION_EPSILON * MOTION_EPSILON;
        if moved {
            trace!("orbit camera moved to {}", camera.position);
        }
        moved
    }
}
