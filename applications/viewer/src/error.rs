use std::fmt::{self, Display};

use viewer_framework::ViewerError;
use wasm_bindgen::JsValue;

pub(crate) type ApplicationResult<T> = Result<T, ApplicationError>;

#[derive(Debug)]
pub(crate) enum ApplicationError {
    /// Not running in a browser window (e.g. inside a worker).
    NoWindow,
    NoDocument,
    /// A width or height passed from JavaScript is neither a number nor a string.
    InvalidSize(String),
    Viewer(ViewerError),
}

impl Display for ApplicationError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationError::NoWindow => formatter.write_str("no browser window available"),
            ApplicationError::NoDocument => formatter.write_str("the window has no document"),
            ApplicationError::InvalidSize(value) => {
                write!(formatter, "expected a number or a CSS length, got {value}")
            }
            ApplicationError::Viewer(error) => Display::fmt(error, formatter),
        }
    }
}

impl From<ViewerError> for ApplicationError {
    fn from(value: ViewerError) -> Self {
        Self::Viewer(value)
    }
}

impl From<ApplicationError> for JsValue {
    fn from(value: ApplicationError) -> Self {
        value.to_string().into()
    }
}

/// Best effort description of a value thrown by a browser API.
pub(crate) fn describe_js_error(error: &JsValue) -> String {
    error.as_string().unwrap_or_else(|| format!("{error:?}"))
}
