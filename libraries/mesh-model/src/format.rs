use std::fmt::{self, Display};

use crate::LoadError;

/// The capability set of a model file, decided once from its locator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelFormat {
    /// Triangle data only (STL). Needs a synthetic material to become visible.
    GeometryOnly,
    /// A node hierarchy that brings its own materials (glTF binary).
    SceneGraph,
    /// Nothing we can parse. Loading fails without touching the network.
    Unrecognized,
}

impl ModelFormat {
    #[must_use]
    pub fn from_extension(extension: &str) -> Self {
        match extension {
            "stl" => Self::GeometryOnly,
            "glb" => Self::SceneGraph,
            _ => Self::Unrecognized,
        }
    }
}

impl Display for ModelFormat {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelFormat::GeometryOnly => "geometry-only",
            ModelFormat::SceneGraph => "scene graph",
            ModelFormat::Unrecognized => "unrecognized",
        };
        formatter.write_str(name)
    }
}

/// An immutable reference to the model that should be displayed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelSource {
    locator: String,
    extension: Option<String>,
    format: ModelFormat,
}

impl ModelSource {
    #[must_use]
    pub fn new(locator: impl Into<String>) -> Self {
        let locator = locator.into();
        let extension = extension_of(&locator);
        let format = extension
            .as_deref()
            .map_or(ModelFormat::Unrecognized, ModelFormat::from_extension);

        Self {
            locator,
            extension,
            format,
        }
    }

    #[must_use]
    pub fn locator(&self) -> &str {
        &self.locator
    }

    #[must_use]
    pub fn format(&self) -> ModelFormat {
        self.format
    }

    /// Lower-cased file suffix without the dot, if the locator has one.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// The error reported for sources whose format is [`ModelFormat::Unrecognized`].
    #[must_use]
    pub fn unsupported_error(&self) -> LoadError {
        let hint = match self.extension() {
            Some("step" | "stp") => Some("convert STEP files to GLB or STL before uploading"),
            _ => Some("supported formats are .stl and .glb"),
        };
        LoadError::UnsupportedFormat {
            locator: self.locator.clone(),
            extension: self.extension.clone(),
            hint,
        }
    }
}

/// Extracts the lower-cased suffix of the last path segment, ignoring query and fragment.
fn extension_of(locator: &str) -> Option<String> {
    let without_fragment = locator.split('#').next().unwrap_or_default();
    let path = without_fragment.split('?').next().unwrap_or_default();
    let file_name = path.rsplit('/').next().unwrap_or_default();
    let (stem, extension) = file_name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}
