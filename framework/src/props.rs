use std::{
    fmt::{self, Display},
    str::FromStr,
};

use crate::ViewerError;

const CSS_UNITS: &[&str] = &[
    "em", "rem", "ex", "ch", "vw", "vh", "vmin", "vmax", "cm", "mm", "in", "pt", "pc",
];

/// The size of the display region along one axis.
#[derive(Clone, Debug, PartialEq)]
pub enum Length {
    Pixels(f64),
    Percent(f64),
    /// Any other CSS length (`"20em"`, `"50vh"`, `"calc(100% - 2rem)"`), passed through as is.
    Css(String),
}

impl Display for Length {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Length::Pixels(pixels) => write!(formatter, "{pixels}px"),
            Length::Percent(percent) => write!(formatter, "{percent}%"),
            Length::Css(css) => formatter.write_str(css),
        }
    }
}

impl FromStr for Length {
    type Err = ViewerError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        let invalid = || ViewerError::InvalidLength(text.to_owned());

        if let Some(pixels) = text.strip_suffix("px") {
            return parse_number(pixels).map(Length::Pixels).ok_or_else(invalid);
        }
        if let Some(percent) = text.strip_suffix('%') {
            return parse_number(percent).map(Length::Percent).ok_or_else(invalid);
        }
        if let Some(pixels) = parse_number(text) {
            return Ok(Length::Pixels(pixels));
        }
        if text.starts_with("calc(") && text.ends_with(')') {
            return Ok(Length::Css(text.to_owned()));
        }
        let has_css_unit = CSS_UNITS.iter().any(|unit| {
            text.strip_suffix(unit)
                .and_then(parse_number)
                .is_some()
        });
        if has_css_unit {
            return Ok(Length::Css(text.to_owned()));
        }
        Err(invalid())
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite() && *number >= 0.0)
}

impl From<f64> for Length {
    fn from(pixels: f64) -> Self {
        Self::Pixels(pixels)
    }
}

impl From<u32> for Length {
    fn from(pixels: u32) -> Self {
        Self::Pixels(f64::from(pixels))
    }
}

/// The inputs of a viewer.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewerProps {
    /// public URL of the model file
    pub locator: String,
    pub width: Length,
    pub height: Length,
}

impl ViewerProps {
    pub const DEFAULT_WIDTH: Length = Length::Percent(100.0);
    pub const DEFAULT_HEIGHT: Length = Length::Pixels(500.0);

    #[must_use]
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            width: Self::DEFAULT_WIDTH,
            height: Self::DEFAULT_HEIGHT,
        }
    }

    #[must_use]
    pub fn with_size(mut self, width: impl Into<Length>, height: impl Into<Length>) -> Self {
        self.width = width.into();
        self.height = height.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_the_width() {
        let props = ViewerProps::new("model.stl");
        assert_eq!(props.width.to_string(), "100%", "width");
        assert_eq!(props.height.to_string(), "500px", "height");
    }

    #[test]
    fn plain_numbers_are_pixels() {
        assert_eq!("640".parse::<Length>().ok(), Some(Length::Pixels(640.0)), "plain");
        assert_eq!(" 12.5px ".parse::<Length>().ok(), Some(Length::Pixels(12.5)), "suffixed");
        assert_eq!("50%".parse::<Length>().ok(), Some(Length::Percent(50.0)), "percent");
    }

    #[test]
    fn other_css_lengths_pass_through() {
        for css in ["20em", "50vh", "3.5rem", "calc(100% - 2rem)"] {
            assert_eq!(
                css.parse::<Length>().ok(),
                Some(Length::Css(css.to_owned())),
                "{css}"
            );
        }
    }

    #[test]
    fn garbage_is_rejected() {
        for text in ["", "wide", "-5px", "10 furlongs", "NaN%"] {
            assert!(
                matches!(text.parse::<Length>(), Err(ViewerError::InvalidLength(_))),
                "{text:?} should be rejected"
            );
        }
    }
}
