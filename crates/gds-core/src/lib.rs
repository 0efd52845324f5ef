//! Shared geometry vocabulary: the Library/Cell/Graphic entity model, the
//! vector and bounding-box kernel, and the layer settings table.
//!
//! This crate owns no I/O and no validation logic; it is the data model
//! that `gds-io` populates, `gds-validate` annotates, and `gds-render`
//! consumes.

pub mod bbox;
pub mod cell;
pub mod geometry;
pub mod layer;
pub mod library;
pub mod vec2;

pub use bbox::{cell_bounding_box, BboxError, BoundingBox};
pub use cell::{Cell, CellChecks, GdsDateTime, SRef, MAX_NAME_LEN, NOT_RUN};
pub use geometry::{simplify_boundary_vertices, Boundary, BoxElement, Graphic, Path, PathCapStyle, Point};
pub use layer::{LayerInfo, LayerSettings, Rgba};
pub use library::Library;
pub use vec2::Vec2;
