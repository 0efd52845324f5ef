//! The graphic-element vocabulary: points and the Boundary/Path/Box variants.

use serde::{Deserialize, Serialize};

/// An integer coordinate in database units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// End-cap style for a Path graphic. PATHTYPE variants beyond these three
/// are not modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathCapStyle {
    Flush,
    Round,
    Square,
}

impl PathCapStyle {
    pub fn from_pathtype(value: i16) -> Self {
        match value {
            1 => PathCapStyle::Round,
            2 => PathCapStyle::Square,
            _ => PathCapStyle::Flush,
        }
    }
}

/// A closed polygon fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Boundary {
    pub layer: i16,
    pub datatype: u16,
    pub vertices: Vec<Point>,
}

/// An open polyline with absolute width and an end-cap style.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Path {
    pub layer: i16,
    pub datatype: u16,
    pub vertices: Vec<Point>,
    pub width: i32,
    pub cap_style: PathCapStyle,
}

/// An axis-aligned rectangle, treated as a polygon for drawing purposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxElement {
    pub layer: i16,
    pub datatype: u16,
    pub vertices: Vec<Point>,
}

/// Tagged variant over the three graphic kinds this core models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Graphic {
    Boundary(Boundary),
    Path(Path),
    Box(BoxElement),
}

impl Graphic {
    pub fn layer(&self) -> i16 {
        match self {
            Graphic::Boundary(b) => b.layer,
            Graphic::Path(p) => p.layer,
            Graphic::Box(b) => b.layer,
        }
    }

    pub fn datatype(&self) -> u16 {
        match self {
            Graphic::Boundary(b) => b.datatype,
            Graphic::Path(p) => p.datatype,
            Graphic::Box(b) => b.datatype,
        }
    }

    pub fn vertices(&self) -> &[Point] {
        match self {
            Graphic::Boundary(b) => &b.vertices,
            Graphic::Path(p) => &p.vertices,
            Graphic::Box(b) => &b.vertices,
        }
    }
}

/// Drops an immediately-repeated vertex and a trailing vertex equal to the
/// first (GDSII-spec Boundary closure). Paths and Boxes are never passed
/// through this.
pub fn simplify_boundary_vertices(vertices: &mut Vec<Point>) {
    if vertices.is_empty() {
        return;
    }
    let mut simplified: Vec<Point> = Vec::with_capacity(vertices.len());
    for &v in vertices.iter() {
        if simplified.last().map(|&p| p == v).unwrap_or(false) {
            continue;
        }
        simplified.push(v);
    }
    if simplified.len() > 1 && simplified.first() == simplified.last() {
        simplified.pop();
    }
    *vertices = simplified;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simplify_drops_consecutive_duplicates() {
        let mut v = vec![
            Point::new(0, 0),
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
        ];
        simplify_boundary_vertices(&mut v);
        assert_eq!(v, vec![Point::new(0, 0), Point::new(10, 0), Point::new(10, 10)]);
    }

    #[test]
    fn simplify_drops_closing_duplicate() {
        let mut v = vec![
            Point::new(0, 0),
            Point::new(100, 0),
            Point::new(100, 100),
            Point::new(0, 100),
            Point::new(0, 0),
        ];
        simplify_boundary_vertices(&mut v);
        assert_eq!(
            v,
            vec![
                Point::new(0, 0),
                Point::new(100, 0),
                Point::new(100, 100),
                Point::new(0, 100),
            ]
        );
    }

    #[test]
    fn pathtype_maps_known_values_and_defaults_flush() {
        assert_eq!(PathCapStyle::from_pathtype(0), PathCapStyle::Flush);
        assert_eq!(PathCapStyle::from_pathtype(1), PathCapStyle::Round);
        assert_eq!(PathCapStyle::from_pathtype(2), PathCapStyle::Square);
        assert_eq!(PathCapStyle::from_pathtype(99), PathCapStyle::Flush);
    }
}
