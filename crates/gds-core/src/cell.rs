//! Cells, structure references (SREF) and the validator's checks slot.

use serde::{Deserialize, Serialize};

use crate::geometry::Graphic;

/// Sentinel meaning "validator has not run yet".
pub const NOT_RUN: i64 = -1;

/// Results of the two C4 validator passes, stored on the cell itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellChecks {
    pub unresolved_children: i64,
    pub affected_by_loop: i64,
    /// Scratch flag used by recursive operations that need an "in progress"
    /// marker distinct from the validator's own on-stack DFS marker (e.g. the
    /// bbox kernel's debug-mode guard). Never part of the public contract.
    pub internal_marker: bool,
}

impl Default for CellChecks {
    fn default() -> Self {
        Self {
            unresolved_children: NOT_RUN,
            affected_by_loop: NOT_RUN,
            internal_marker: false,
        }
    }
}

/// A single instantiation of a cell with a transform. `resolved_cell` is a
/// non-owning back-reference by name, set during validation; it is `None`
/// until a validation pass resolves it (successfully or not).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SRef {
    pub ref_name: String,
    pub resolved_cell: Option<String>,
    pub origin: crate::geometry::Point,
    pub flipped: bool,
    pub angle_deg: f64,
    pub magnification: f64,
}

impl SRef {
    pub fn new(ref_name: String, origin: crate::geometry::Point) -> Self {
        Self {
            ref_name,
            resolved_cell: None,
            origin,
            flipped: false,
            angle_deg: 0.0,
            magnification: 1.0,
        }
    }
}

/// A simple timestamp mirroring a GDSII date sextet. Kept as plain fields
/// rather than a `chrono::NaiveDateTime` so an all-zero sextet (which is not
/// a valid calendar date) can still round-trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GdsDateTime {
    pub year: u16,
    pub month: u16,
    pub day: u16,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
}

/// Maximum length, in bytes, of a cell or library name before truncation.
pub const MAX_NAME_LEN: usize = 99;

/// A named container of geometry and sub-references; the structural unit of
/// a library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub name: String,
    pub mod_time: GdsDateTime,
    pub access_time: GdsDateTime,
    pub graphics: Vec<Graphic>,
    pub children: Vec<SRef>,
    pub checks: CellChecks,
}

impl Cell {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mod_time: GdsDateTime::default(),
            access_time: GdsDateTime::default(),
            graphics: Vec::new(),
            children: Vec::new(),
            checks: CellChecks::default(),
        }
    }

    pub fn add_graphic(&mut self, graphic: Graphic) {
        self.graphics.push(graphic);
    }

    pub fn add_child(&mut self, sref: SRef) {
        self.children.push(sref);
    }

    pub fn graphics_on_layer(&self, layer: i16) -> impl Iterator<Item = &Graphic> {
        self.graphics.iter().filter(move |g| g.layer() == layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Boundary, Point};

    #[test]
    fn new_cell_checks_start_not_run() {
        let cell = Cell::new("A");
        assert_eq!(cell.checks.unresolved_children, NOT_RUN);
        assert_eq!(cell.checks.affected_by_loop, NOT_RUN);
    }

    #[test]
    fn add_graphic_and_filter_by_layer() {
        let mut cell = Cell::new("A");
        cell.add_graphic(Graphic::Boundary(Boundary {
            layer: 5,
            datatype: 0,
            vertices: vec![Point::new(0, 0)],
        }));
        cell.add_graphic(Graphic::Boundary(Boundary {
            layer: 6,
            datatype: 0,
            vertices: vec![Point::new(0, 0)],
        }));
        assert_eq!(cell.graphics_on_layer(5).count(), 1);
        assert_eq!(cell.graphics_on_layer(6).count(), 1);
        assert_eq!(cell.graphics_on_layer(7).count(), 0);
    }

    #[test]
    fn sref_defaults_match_gdsii_defaults() {
        let sref = SRef::new("CHILD".into(), Point::new(10, 20));
        assert_eq!(sref.magnification, 1.0);
        assert_eq!(sref.angle_deg, 0.0);
        assert!(!sref.flipped);
        assert!(sref.resolved_cell.is_none());
    }
}
