use std::{
    fmt::{self, Display},
    str::FromStr,
};

use glam::Vec3;
use serde::Deserialize;

use crate::{ViewerError, ViewerResult};

/// A 24 bit sRGB color, written as `0xRRGGBB` or `"#rrggbb"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "ColorValue")]
pub struct Color(pub u32);

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorValue {
    Number(u32),
    Text(String),
}

impl TryFrom<ColorValue> for Color {
    type Error = String;

    fn try_from(value: ColorValue) -> Result<Self, Self::Error> {
        match value {
            ColorValue::Number(rgb) if rgb <= 0x00FF_FFFF => Ok(Self(rgb)),
            ColorValue::Number(rgb) => Err(format!("color {rgb:#x} exceeds 24 bits")),
            ColorValue::Text(text) => text.parse(),
        }
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let digits = text
            .strip_prefix('#')
            .or_else(|| text.strip_prefix("0x"))
            .unwrap_or(text);
        if digits.len() != 6 {
            return Err(format!("`{text}` is not a six digit hex color"));
        }
        u32::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|error| format!("`{text}` is not a hex color: {error}"))
    }
}

impl Display for Color {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{:06x}", self.0)
    }
}

impl Color {
    pub const WHITE: Self = Self(0x00FF_FFFF);

    /// The channels as floats in `0.0..=1.0`, still sRGB encoded.
    #[must_use]
    pub fn to_srgb(self) -> Vec3 {
        let [_, red, green, blue] = self.0.to_be_bytes();
        Vec3::new(f32::from(red), f32::from(green), f32::from(blue)) / 255.0
    }

    /// The channels converted into linear space, as needed by the shaders.
    #[must_use]
    pub fn to_linear(self) -> Vec3 {
        let decode = |value: f32| {
            if value <= 0.040_45 {
                value / 12.92
            } else {
                ((value + 0.055) / 1.055).powf(2.4)
            }
        };
        let srgb = self.to_srgb();
        Vec3::new(decode(srgb.x), decode(srgb.y), decode(srgb.z))
    }
}

/// Tunables of a viewer. Every field has a default, so any subset can be given as JSON.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    pub background: Color,
    /// vertical field of view in degrees
    pub field_of_view: f32,
    pub near: f32,
    pub far: f32,
    /// camera distance after loading, relative to the largest model dimension
    pub fit_factor: f32,
    /// distance of the camera from the origin before a model is loaded
    pub initial_distance: f32,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub ambient_color: Color,
    pub ambient_intensity: f32,
    pub directional_color: Color,
    pub directional_intensity: f32,
    /// direction from the scene towards the directional light
    pub light_direction: [f32; 3],
    /// render with 4x multisampling when the device supports it
    pub antialias: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            background: Color(0x00F0_F0F0),
            field_of_view: 75.0,
            near: 0.1,
            far: 1000.0,
            fit_factor: 1.5,
            initial_distance: 100.0,
            enable_damping: true,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            ambient_color: Color(0x0040_4040),
            ambient_intensity: 1.0,
            directional_color: Color::WHITE,
            directional_intensity: 1.0,
            light_direction: [1.0, 1.0, 1.0],
            antialias: true,
        }
    }
}

impl ViewerConfig {
    /// Reads a (partial) configuration from JSON and checks it for consistency.
    pub fn from_json(json: &str) -> ViewerResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ViewerResult<()> {
        let invalid = |message: String| Err(ViewerError::InvalidConfig(message));

        // written as positive checks so NaN fails them too
        let fov_valid = self.field_of_view > 0.0 && self.field_of_view < 180.0;
        let clip_valid = self.near > 0.0 && self.far > self.near;
        let fit_valid = self.fit_factor > 0.0;

        if !fov_valid {
            return invalid(format!(
                "field of view must be between 0 and 180 degrees, got {}",
                self.field_of_view
            ));
        }
        if !clip_valid {
            return invalid(format!(
                "clip planes must satisfy 0 < near < far, got {}..{}",
                self.near, self.far
            ));
        }
        if !fit_valid {
            return invalid(format!("fit factor must be positive, got {}", self.fit_factor));
        }
        if !(0.0..=1.0).contains(&self.damping_factor) {
            return invalid(format!(
                "damping factor must be within 0..=1, got {}",
                self.damping_factor
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn field_of_view_radians(&self) -> f32 {
        self.field_of_view.to_radians()
    }
}
