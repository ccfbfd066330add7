use std::{
    error::Error,
    fmt::{self, Display},
};

pub type ViewerResult<T> = Result<T, ViewerError>;

/// Failures while mounting or updating a viewer.
///
/// Problems with the model itself are not reported here but through
/// [`ViewerStatus::Failed`](crate::ViewerStatus::Failed).
#[derive(Debug)]
pub enum ViewerError {
    /// The JSON configuration could not be read.
    Config(serde_json::Error),
    /// The configuration was read but its values contradict each other.
    InvalidConfig(String),
    /// A size property is not a valid CSS length.
    InvalidLength(String),
    /// The host could not provide a drawing surface or attach it to the display region.
    Surface(String),
    /// The graphics backend could not be set up.
    Graphics(String),
    /// The host refused to install an event subscription.
    Subscription(String),
}

impl Display for ViewerError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerError::Config(error) => write!(formatter, "invalid viewer configuration: {error}"),
            ViewerError::InvalidConfig(message) => {
                write!(formatter, "invalid viewer configuration: {message}")
            }
            ViewerError::InvalidLength(value) => {
                write!(formatter, "`{value}` is not a valid CSS length")
            }
            ViewerError::Surface(message) => {
                write!(formatter, "failed to set up the drawing surface: {message}")
            }
            ViewerError::Graphics(message) => {
                write!(formatter, "failed to set up graphics: {message}")
            }
            ViewerError::Subscription(message) => {
                write!(formatter, "failed to subscribe to events: {message}")
            }
        }
    }
}

impl Error for ViewerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ViewerError::Config(error) => Some(error),
            ViewerError::InvalidConfig(_)
            | ViewerError::InvalidLength(_)
            | ViewerError::Surface(_)
            | ViewerError::Graphics(_)
            | ViewerError::Subscription(_) => None,
        }
    }
}

impl From<serde_json::Error> for ViewerError {
    fn from(error: serde_json::Error) -> Self {
        Self::Config(error)
    }
}

impl From<wgpu::CreateSurfaceError> for ViewerError {
    fn from(error: wgpu::CreateSurfaceError) -> Self {
        Self::Surface(error.to_string())
    }
}

impl From<wgpu::RequestDeviceError> for ViewerError {
    fn from(error: wgpu::RequestDeviceError) -> Self {
        Self::Graphics(error.to_string())
    }
}
