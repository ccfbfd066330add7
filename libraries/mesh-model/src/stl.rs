//! Reader for binary and ASCII STL files.

use glam::Vec3;
use log::debug;

use crate::{model::face_normal, Geometry, StlError};

const HEADER_SIZE: usize = 80;
const COUNT_SIZE: usize = 4;
const TRIANGLE_SIZE: usize = 50;

/// Parses STL data into non-indexed geometry.
///
/// Binary data is recognized by its size matching the triangle count in the header. Everything
/// else starting with the `solid` keyword (in any case) is parsed as ASCII.
pub fn parse(data: &[u8]) -> Result<Geometry, StlError> {
    let binary_triangles = binary_triangle_count(data);
    let looks_ascii = data
        .trim_ascii_start()
        .get(..5)
        .is_some_and(|keyword| keyword.eq_ignore_ascii_case(b"solid"));

    match binary_triangles {
        Some(count) if data.len() == binary_size(count) => parse_binary(data, count),
        _ if looks_ascii => parse_ascii(data),
        Some(count) => parse_binary(data, count),
        None => Err(StlError::NotStl),
    }
}

fn binary_triangle_count(data: &[u8]) -> Option<usize> {
    let bytes = data.get(HEADER_SIZE..HEADER_SIZE + COUNT_SIZE)?;
    let count = u32::from_le_bytes(bytes.try_into().ok()?);
    usize::try_from(count).ok()
}

fn binary_size(triangle_count: usize) -> usize {
    triangle_count
        .saturating_mul(TRIANGLE_SIZE)
        .saturating_add(HEADER_SIZE + COUNT_SIZE)
}

fn parse_binary(data: &[u8], triangle_count: usize) -> Result<Geometry, StlError> {
    let expected = binary_size(triangle_count);
    let body = data
        .get(HEADER_SIZE + COUNT_SIZE..expected)
        .ok_or(StlError::Truncated {
            expected,
            actual: data.len(),
        })?;

    let mut positions = Vec::with_capacity(triangle_count * 3);
    let mut normals = Vec::with_capacity(triangle_count * 3);

    for record in body.chunks_exact(TRIANGLE_SIZE) {
        // normal + three corners, followed by a two byte attribute we don't use
        let mut vectors = record.chunks_exact(12).take(4).map(read_vec3);
        let (Some(stored_normal), Some(a), Some(b), Some(c)) =
            (vectors.next(), vectors.next(), vectors.next(), vectors.next())
        else {
            return Err(StlError::Truncated {
                expected,
                actual: data.len(),
            });
        };
        push_facet(&mut positions, &mut normals, stored_normal, [a, b, c]);
    }

    debug!("parsed binary STL with {triangle_count} triangles");
    Ok(Geometry {
        positions,
        normals,
        indices: None,
    })
}

fn read_vec3(bytes: &[u8]) -> Vec3 {
    let mut components = bytes
        .chunks_exact(4)
        .map(|chunk| <[u8; 4]>::try_from(chunk).map_or(0.0, f32::from_le_bytes));
    let mut next = || components.next().unwrap_or_default();
    Vec3::new(next(), next(), next())
}

/// Adds one triangle. Stored normals that are zero (or garbage) get replaced by the face normal.
fn push_facet(positions: &mut Vec<Vec3>, normals: &mut Vec<Vec3>, stored: Vec3, corners: [Vec3; 3]) {
    let [a, b, c] = corners;
    let normal = if stored.is_finite() && stored.length_squared() > f32::EPSILON {
        stored.normalize()
    } else {
        face_normal(a, b, c)
    };
    positions.extend(corners);
    normals.extend([normal; 3]);
}

struct Tokens<'data> {
    lines: std::iter::Enumerate<std::str::Lines<'data>>,
    current: std::str::SplitAsciiWhitespace<'data>,
    line: usize,
}

impl<'data> Tokens<'data> {
    fn new(text: &'data str) -> Self {
        Self {
            lines: text.lines().enumerate(),
            current: "".split_ascii_whitespace(),
            line: 0,
        }
    }

    fn next(&mut self) -> Option<&'data str> {
        loop {
            if let Some(token) = self.current.next() {
                return Some(token);
            }
            let (index, line) = self.lines.next()?;
            self.line = index + 1;
            self.current = line.split_ascii_whitespace();
        }
    }

    /// Skips the remainder of the current line (used for solid names).
    fn skip_line(&mut self) {
        self.current = "".split_ascii_whitespace();
    }

    fn error(&self, message: impl Into<String>) -> StlError {
        StlError::Syntax {
            line: self.line,
            message: message.into(),
        }
    }

    fn expect(&mut self, keyword: &str) -> Result<(), StlError> {
        match self.next() {
            Some(token) if token.eq_ignore_ascii_case(keyword) => Ok(()),
            Some(token) => Err(self.error(format!("expected `{keyword}` but found `{token}`"))),
            None => Err(self.error(format!("expected `{keyword}` but reached the end"))),
        }
    }

    fn number(&mut self) -> Result<f32, StlError> {
        let token = self
            .next()
            .ok_or_else(|| self.error("expected a number but reached the end"))?;
        token
            .parse()
            .map_err(|error| self.error(format!("`{token}` is not a number: {error}")))
    }

    fn vector(&mut self) -> Result<Vec3, StlError> {
        Ok(Vec3::new(self.number()?, self.number()?, self.number()?))
    }
}

fn parse_ascii(data: &[u8]) -> Result<Geometry, StlError> {
    let text = std::str::from_utf8(data).map_err(|error| StlError::Syntax {
        line: 1 + data
            .get(..error.valid_up_to())
            .map_or(0, |valid| valid.iter().filter(|&&byte| byte == b'\n').count()),
        message: "file is not valid text".to_owned(),
    })?;

    let mut tokens = Tokens::new(text);
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut solids = 0_usize;

    // a file may contain several solids
    while let Some(token) = tokens.next() {
        if !token.eq_ignore_ascii_case("solid") {
            return Err(tokens.error(format!("expected `solid` but found `{token}`")));
        }
        tokens.skip_line();
        solids += 1;

        loop {
            match tokens.next() {
                Some(token) if token.eq_ignore_ascii_case("facet") => {
                    tokens.expect("normal")?;
                    let stored_normal = tokens.vector()?;
                    tokens.expect("outer")?;
                    tokens.expect("loop")?;
                    let mut corners = [Vec3::ZERO; 3];
                    for corner in &mut corners {
                        tokens.expect("vertex")?;
                        *corner = tokens.vector()?;
                    }
                    tokens.expect("endloop")?;
                    tokens.expect("endfacet")?;
                    push_facet(&mut positions, &mut normals, stored_normal, corners);
                }
                Some(token) if token.eq_ignore_ascii_case("endsolid") => {
                    tokens.skip_line();
                    break;
                }
                Some(token) => {
                    return Err(
                        tokens.error(format!("expected `facet` or `endsolid` but found `{token}`"))
                    );
                }
                None => return Err(tokens.error("missing `endsolid`")),
            }
        }
    }

    if solids == 0 {
        return Err(StlError::NotStl);
    }

    debug!(
        "parsed ASCII STL with {solids} solid(s) and {} triangles",
        positions.len() / 3
    );
    Ok(Geometry {
        positions,
        normals,
        indices: None,
    })
}
