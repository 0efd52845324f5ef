//! Bounding-box computation and recursive cell-size composition.

use crate::cell::Cell;
use crate::geometry::{Graphic, Point};
use crate::library::Library;
use crate::vec2::Vec2;

/// Axis-aligned bounding box. The empty box is `(+inf, +inf, -inf, -inf)` so
/// that component-wise min/max union is always correct, including for the
/// very first update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lower_left: Vec2,
    pub upper_right: Vec2,
}

impl BoundingBox {
    pub fn empty() -> Self {
        Self {
            lower_left: Vec2::new(f64::INFINITY, f64::INFINITY),
            upper_right: Vec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lower_left.x > self.upper_right.x || self.lower_left.y > self.upper_right.y
    }

    pub fn width(&self) -> f64 {
        self.upper_right.x - self.lower_left.x
    }

    pub fn height(&self) -> f64 {
        self.upper_right.y - self.lower_left.y
    }

    pub fn update_point(&mut self, p: Vec2) {
        self.lower_left.x = self.lower_left.x.min(p.x);
        self.lower_left.y = self.lower_left.y.min(p.y);
        self.upper_right.x = self.upper_right.x.max(p.x);
        self.upper_right.y = self.upper_right.y.max(p.y);
    }

    pub fn update_box(&mut self, other: &BoundingBox) {
        if other.is_empty() {
            return;
        }
        self.update_point(other.lower_left);
        self.update_point(other.upper_right);
    }

    pub fn update_polygon(&mut self, vertices: &[Point]) {
        for v in vertices {
            self.update_point(Vec2::new(v.x as f64, v.y as f64));
        }
    }

    /// Approximated as rectangular thickening of each vertex by half the
    /// path width. This is a declared approximation, not a true miter-point
    /// calculation; see the design notes for why it is kept.
    pub fn update_path(&mut self, vertices: &[Point], width: i32) {
        let half = (width.abs() as f64) / 2.0;
        for v in vertices {
            let x = v.x as f64;
            let y = v.y as f64;
            self.update_point(Vec2::new(x - half, y - half));
            self.update_point(Vec2::new(x + half, y + half));
        }
    }

    /// Applies `(scale, rotation_deg, flip_x)` to both corners in place.
    /// Order is flip, then rotate, then scale — flip-before-rotate is the
    /// load-bearing part of this contract and must not be reordered.
    pub fn apply_transform(&mut self, scale: f64, rotation_deg: f64, flip_x: bool) {
        let angle_rad = rotation_deg.to_radians();
        let mut corners = [self.lower_left, self.upper_right];
        for c in corners.iter_mut() {
            if flip_x {
                c.flip_x();
            }
            c.rotate(angle_rad);
            *c = c.scale(scale);
        }
        let (a, b) = (corners[0], corners[1]);
        self.lower_left = Vec2::new(a.x.min(b.x), a.y.min(b.y));
        self.upper_right = Vec2::new(a.x.max(b.x), a.y.max(b.y));
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.lower_left = self.lower_left + delta;
        self.upper_right = self.upper_right + delta;
    }
}

/// Error returned when a bbox computation is asked to recurse into a cell
/// the validator has flagged as part of a reference loop (which would never
/// terminate) or into a library that has not been validated at all.
#[derive(Debug, thiserror::Error)]
pub enum BboxError {
    #[error("cell '{0}' is affected by a reference loop; refusing to recurse")]
    ReferenceLoop(String),
    #[error("cell '{0}' has not been validated (affected_by_loop is NOT_RUN)")]
    NotValidated(String),
}

fn local_graphic_box(graphic: &Graphic) -> BoundingBox {
    let mut box_ = BoundingBox::empty();
    match graphic {
        Graphic::Boundary(b) => box_.update_polygon(&b.vertices),
        Graphic::Box(b) => box_.update_polygon(&b.vertices),
        Graphic::Path(p) => box_.update_path(&p.vertices, p.width),
    }
    box_
}

/// Computes a cell's bounding box, recursing into resolved child SREFs.
/// Requires the library to have passed loop detection: a cell flagged
/// `affected_by_loop == 1` is rejected rather than recursed into.
pub fn cell_bounding_box(library: &Library, cell: &Cell) -> Result<BoundingBox, BboxError> {
    if cell.checks.affected_by_loop == 1 {
        return Err(BboxError::ReferenceLoop(cell.name.clone()));
    }
    if cell.checks.affected_by_loop == crate::cell::NOT_RUN {
        return Err(BboxError::NotValidated(cell.name.clone()));
    }

    let mut box_ = BoundingBox::empty();
    for graphic in &cell.graphics {
        box_.update_box(&local_graphic_box(graphic));
    }

    for sref in &cell.children {
        let Some(child_name) = sref.resolved_cell.as_ref() else {
            continue;
        };
        let Some(child_cell) = library.find_cell(child_name) else {
            continue;
        };
        let mut child_box = cell_bounding_box(library, child_cell)?;
        child_box.apply_transform(sref.magnification.abs(), sref.angle_deg, sref.flipped);
        child_box.translate(Vec2::new(sref.origin.x as f64, sref.origin.y as f64));
        box_.update_box(&child_box);
    }

    Ok(box_)
}
