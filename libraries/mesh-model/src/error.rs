use std::{
    error::Error,
    fmt::{self, Display},
};

/// Reasons why a model could not be turned into something displayable.
#[derive(Clone, Debug, PartialEq)]
pub enum LoadError {
    /// The locator does not name a format any loader understands.
    UnsupportedFormat {
        locator: String,
        extension: Option<String>,
        hint: Option<&'static str>,
    },
    /// The resource could not be retrieved.
    Fetch { locator: String, message: String },
    Stl(StlError),
    Gltf { message: String },
    /// The file was read successfully but contains nothing to draw.
    EmptyModel,
}

impl Display for LoadError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::UnsupportedFormat {
                locator,
                extension,
                hint,
            } => {
                match extension {
                    Some(extension) => write!(
                        formatter,
                        "unsupported model format \".{extension}\" for {locator}"
                    )?,
                    None => write!(formatter, "cannot determine the model format of {locator}")?,
                }
                if let Some(hint) = hint {
                    write!(formatter, " ({hint})")?;
                }
                Ok(())
            }
            LoadError::Fetch { locator, message } => {
                write!(formatter, "failed to fetch {locator}: {message}")
            }
            LoadError::Stl(error) => write!(formatter, "invalid STL file: {error}"),
            LoadError::Gltf { message } => write!(formatter, "invalid GLB file: {message}"),
            LoadError::EmptyModel => write!(formatter, "the model contains no triangles"),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LoadError::Stl(error) => Some(error),
            LoadError::UnsupportedFormat { .. }
            | LoadError::Fetch { .. }
            | LoadError::Gltf { .. }
            | LoadError::EmptyModel => None,
        }
    }
}

impl From<StlError> for LoadError {
    fn from(error: StlError) -> Self {
        Self::Stl(error)
    }
}

impl From<gltf::Error> for LoadError {
    fn from(error: gltf::Error) -> Self {
        Self::Gltf {
            message: error.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StlError {
    /// Binary data ends before the announced number of triangles.
    Truncated { expected: usize, actual: usize },
    /// ASCII data violates the `solid`/`facet`/`vertex` grammar.
    Syntax { line: usize, message: String },
    /// Neither a binary header nor the `solid` keyword was found.
    NotStl,
}

impl Display for StlError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StlError::Truncated { expected, actual } => write!(
                formatter,
                "expected {expected} bytes of triangle data but found {actual}"
            ),
            StlError::Syntax { line, message } => write!(formatter, "line {line}: {message}"),
            StlError::NotStl => write!(formatter, "data is neither binary nor ASCII STL"),
        }
    }
}

impl Error for StlError {}
