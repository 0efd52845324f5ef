//! C3: the GDSII stream parser. A pushdown automaton over {top, in_lib,
//! in_cell, in_element}; element sub-state further distinguishes a graphic
//! (Boundary/Path/Box), an SREF or an AREF under construction.
//!
//! AREF is a private, parser-scoped builder (see [`ArefBuilder`]): it is
//! expanded into plain SREFs on ENDEL and never enters the resolved model,
//! matching the original's `convert_aref_to_sref`.

use std::collections::HashMap;
use std::io::Read;

use gds_core::{
    Boundary, BoxElement, Cell, GdsDateTime, Graphic, Library, Path, PathCapStyle, Point, SRef,
    MAX_NAME_LEN,
};

use crate::error::GdsError;
use crate::records::{record_type, RawFrame, Record, RecordReader};

/// Per-invocation parser configuration (§9's redesign of the original's
/// process-wide static "active library" knobs into an explicit struct).
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Collapse consecutive duplicate vertices and the closing vertex of
    /// each Boundary. Paths and Boxes are never simplified regardless.
    pub simplify_polygons: bool,
    /// Reserved for future recursion-depth guards shared with the bbox
    /// kernel; the byte-stream grammar itself never nests more than
    /// lib/cell/element, so this has no effect on the parser today.
    pub max_nesting_depth: Option<usize>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self { simplify_polygons: true, max_nesting_depth: None }
    }
}

/// Per-cell vertex/graphic/reference totals, as computed by the parser's
/// second terminal pass (C3 §4.3, grounded on the original's
/// `gds_statistics_calc_cell`). Not stored on `Cell` itself — this is
/// reporting data for analysis output, not part of the resolved model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellStatistics {
    pub graphics: usize,
    pub references: usize,
    pub vertices: usize,
}

enum GraphicKind {
    Boundary,
    Path,
    Box,
}

struct GraphicBuilder {
    kind: GraphicKind,
    layer: i16,
    datatype: u16,
    vertices: Vec<Point>,
    width: i32,
    cap_style: PathCapStyle,
}

impl GraphicBuilder {
    fn new(kind: GraphicKind) -> Self {
        Self {
            kind,
            layer: 0,
            datatype: 0,
            vertices: Vec::new(),
            width: 0,
            cap_style: PathCapStyle::Flush,
        }
    }

    fn finish(self, simplify: bool) -> Graphic {
        let mut vertices = self.vertices;
        match self.kind {
            GraphicKind::Boundary => {
                if simplify {
                    gds_core::simplify_boundary_vertices(&mut vertices);
                }
                Graphic::Boundary(Boundary { layer: self.layer, datatype: self.datatype, vertices })
            }
            GraphicKind::Path => Graphic::Path(Path {
                layer: self.layer,
                datatype: self.datatype,
                vertices,
                width: self.width,
                cap_style: self.cap_style,
            }),
            GraphicKind::Box => Graphic::Box(BoxElement { layer: self.layer, datatype: self.datatype, vertices }),
        }
    }
}

struct SRefBuilder {
    ref_name: String,
    origin: Point,
    flipped: bool,
    angle_deg: f64,
    magnification: f64,
}

impl SRefBuilder {
    fn new() -> Self {
        Self { ref_name: String::new(), origin: Point::new(0, 0), flipped: false, angle_deg: 0.0, magnification: 1.0 }
    }

    fn finish(self) -> SRef {
        let mut sref = SRef::new(self.ref_name, self.origin);
        sref.flipped = self.flipped;
        sref.angle_deg = self.angle_deg;
        sref.magnification = self.magnification;
        sref
    }
}

/// Internal-only during parse; expanded to SREFs on ENDEL and discarded.
/// The three control points are origin, column-end, row-end.
struct ArefBuilder {
    ref_name: String,
    control_points: [Point; 3],
    control_points_set: usize,
    flipped: bool,
    angle_deg: f64,
    magnification: f64,
    cols: i32,
    rows: i32,
}

impl ArefBuilder {
    fn new() -> Self {
        Self {
            ref_name: String::new(),
            control_points: [Point::new(0, 0); 3],
            control_points_set: 0,
            flipped: false,
            angle_deg: 0.0,
            magnification: 1.0,
            cols: 0,
            rows: 0,
        }
    }

    /// Expands into `rows * cols` SREFs, per the original's
    /// `convert_aref_to_sref`: origin is control point 0, the column step is
    /// `(cp1 - origin) / cols`, the row step is `(cp2 - origin) / rows`.
    fn expand(self) -> Vec<SRef> {
        if self.cols == 0 || self.rows == 0 {
            log::warn!(
                "AREF '{}' has zero rows or columns (rows={}, cols={}); dropping",
                self.ref_name,
                self.rows,
                self.cols
            );
            return Vec::new();
        }
        let origin = self.control_points[0];
        let col_step_x = (self.control_points[1].x - origin.x) as f64 / self.cols as f64;
        let col_step_y = (self.control_points[1].y - origin.y) as f64 / self.cols as f64;
        let row_step_x = (self.control_points[2].x - origin.x) as f64 / self.rows as f64;
        let row_step_y = (self.control_points[2].y - origin.y) as f64 / self.rows as f64;

        let mut out = Vec::with_capacity((self.rows * self.cols) as usize);
        for i in 0..self.rows {
            for j in 0..self.cols {
                let x = origin.x as f64 + j as f64 * col_step_x + i as f64 * row_step_x;
                let y = origin.y as f64 + j as f64 * col_step_y + i as f64 * row_step_y;
                let mut sref = SRef::new(self.ref_name.clone(), Point::new(x.round() as i32, y.round() as i32));
                sref.flipped = self.flipped;
                sref.angle_deg = self.angle_deg;
                sref.magnification = self.magnification;
                out.push(sref);
            }
        }
        out
    }
}

enum ElementBuilder {
    Graphic(GraphicBuilder),
    Sref(SRefBuilder),
    Aref(ArefBuilder),
}

enum Frame {
    Top,
    Lib(Library),
    Cell(Library, Cell),
    Element(Library, Cell, ElementBuilder),
}

/// Truncates a name to [`MAX_NAME_LEN`] bytes, logging a warning if it had
/// to. Matches the spec's "Name exactly 99 bytes: accepted. 100 bytes:
/// truncated and logged" boundary — a Limit condition, not a parse abort.
fn truncate_name(mut name: String, field: &'static str) -> String {
    if name.len() > MAX_NAME_LEN {
        log::warn!("{} '{}' exceeds {} bytes; truncating", field, name, MAX_NAME_LEN);
        name.truncate(MAX_NAME_LEN);
    }
    name
}

fn date_from_sextet(sextet: [u16; 6]) -> GdsDateTime {
    GdsDateTime {
        year: sextet[0],
        month: sextet[1],
        day: sextet[2],
        hour: sextet[3],
        minute: sextet[4],
        second: sextet[5],
    }
}

/// Parses an entire GDSII byte stream into zero or more [`Library`] values.
/// A well-formed stream normally contains exactly one, but the grammar
/// allows a top-level loop over several BGNLIB/ENDLIB blocks.
pub fn parse_libraries<R: Read>(reader: R, options: &ParseOptions) -> Result<Vec<Library>, GdsError> {
    let mut records = RecordReader::new(reader);
    let mut libraries = Vec::new();
    let mut frame = Frame::Top;

    loop {
        match records.next_record()? {
            None => {
                return match frame {
                    Frame::Top => {
                        finalize(&mut libraries);
                        Ok(libraries)
                    }
                    _ => Err(GdsError::malformed(records.offset(), "unexpected end of file with an open frame")),
                };
            }
            Some(RawFrame::ZeroLength { offset }) => {
                if matches!(frame, Frame::Top) {
                    continue;
                }
                return Err(GdsError::malformed(offset, "zero-length record while a frame is open"));
            }
            Some(RawFrame::Record(rec)) => {
                frame = step(frame, rec, &mut libraries, options)?;
            }
        }
    }
}

/// Whether `rec_type` is one of the record kinds this parser's state machine
/// actively models, regardless of whether it's legal in the *current*
/// frame. Distinguishes a precondition violation (§4.3: a modeled record in
/// a context that forbids it, e.g. SREF outside a cell) from a record this
/// parser tolerates everywhere: a genuinely unrecognized type, or one of the
/// text/node/property records §1's Non-goals exclude from the data model —
/// those are legal GDSII records this parser simply never builds anything
/// from, so they are skipped in any context rather than treated as fatal.
fn is_known_record(rec_type: u16) -> bool {
    use record_type::*;
    matches!(
        rec_type,
        HEADER
            | BGNLIB
            | LIBNAME
            | UNITS
            | ENDLIB
            | BGNSTR
            | STRNAME
            | ENDSTR
            | BOUNDARY
            | PATH
            | SREF
            | AREF
            | LAYER
            | DATATYPE
            | WIDTH
            | XY
            | ENDEL
            | SNAME
            | COLROW
            | STRANS
            | MAG
            | ANGLE
            | PATHTYPE
            | BOX
    )
}

fn step(frame: Frame, rec: Record, libraries: &mut Vec<Library>, options: &ParseOptions) -> Result<Frame, GdsError> {
    use record_type::*;

    if rec.rec_type == HEADER {
        return Ok(frame);
    }

    match frame {
        Frame::Top => match rec.rec_type {
            BGNLIB => {
                let (mod_time, access_time) = rec.as_date_sextets()?;
                let mut lib = Library::new(String::new());
                lib.mod_time = date_from_sextet(mod_time);
                lib.access_time = date_from_sextet(access_time);
                Ok(Frame::Lib(lib))
            }
            other if is_known_record(other) => {
                Err(GdsError::protocol(rec.offset, format!("record 0x{:04X} is not valid at top level", other)))
            }
            other => {
                log::debug!("skipping unknown record 0x{:04X} at top level (offset {})", other, rec.offset);
                Ok(Frame::Top)
            }
        },

        Frame::Lib(mut lib) => match rec.rec_type {
            LIBNAME => {
                lib.name = truncate_name(rec.as_ascii(), "library name");
                Ok(Frame::Lib(lib))
            }
            UNITS => {
                if rec.payload.len() != 16 {
                    return Err(GdsError::malformed(rec.offset, "UNITS payload must be 16 bytes"));
                }
                let values = rec.as_real8_vec()?;
                lib.unit_in_meters = values[1];
                Ok(Frame::Lib(lib))
            }
            BGNSTR => {
                let (mod_time, access_time) = rec.as_date_sextets()?;
                let mut cell = Cell::new(String::new());
                cell.mod_time = date_from_sextet(mod_time);
                cell.access_time = date_from_sextet(access_time);
                Ok(Frame::Cell(lib, cell))
            }
            ENDLIB => {
                libraries.push(lib);
                Ok(Frame::Top)
            }
            other if is_known_record(other) => {
                Err(GdsError::protocol(rec.offset, format!("record 0x{:04X} is not valid inside a library", other)))
            }
            other => {
                log::debug!("skipping unknown record 0x{:04X} inside library (offset {})", other, rec.offset);
                Ok(Frame::Lib(lib))
            }
        },

        Frame::Cell(lib, mut cell) => match rec.rec_type {
            STRNAME => {
                cell.name = truncate_name(rec.as_ascii(), "cell name");
                Ok(Frame::Cell(lib, cell))
            }
            BOUNDARY => Ok(Frame::Element(lib, cell, ElementBuilder::Graphic(GraphicBuilder::new(GraphicKind::Boundary)))),
            BOX => Ok(Frame::Element(lib, cell, ElementBuilder::Graphic(GraphicBuilder::new(GraphicKind::Box)))),
            PATH => Ok(Frame::Element(lib, cell, ElementBuilder::Graphic(GraphicBuilder::new(GraphicKind::Path)))),
            SREF => Ok(Frame::Element(lib, cell, ElementBuilder::Sref(SRefBuilder::new()))),
            AREF => Ok(Frame::Element(lib, cell, ElementBuilder::Aref(ArefBuilder::new()))),
            ENDSTR => {
                let mut lib = lib;
                lib.add_cell(cell);
                Ok(Frame::Lib(lib))
            }
            other if is_known_record(other) => Err(GdsError::protocol(
                rec.offset,
                format!("record 0x{:04X} is not valid inside cell '{}' (no element open)", other, cell.name),
            )),
            other => {
                log::debug!("skipping unknown record 0x{:04X} inside cell '{}' (offset {})", other, cell.name, rec.offset);
                Ok(Frame::Cell(lib, cell))
            }
        },

        Frame::Element(lib, cell, element) => step_element(lib, cell, element, rec, options),
    }
}

fn step_element(
    lib: Library,
    mut cell: Cell,
    element: ElementBuilder,
    rec: Record,
    options: &ParseOptions,
) -> Result<Frame, GdsError> {
    use record_type::*;

    match element {
        ElementBuilder::Graphic(mut gfx) => match rec.rec_type {
            LAYER => {
                let values = rec.as_i16_vec()?;
                let layer = *values.first().ok_or_else(|| GdsError::malformed(rec.offset, "empty LAYER payload"))?;
                if layer < 0 {
                    log::warn!("negative layer number {} (offset {})", layer, rec.offset);
                }
                gfx.layer = layer;
                Ok(Frame::Element(lib, cell, ElementBuilder::Graphic(gfx)))
            }
            DATATYPE => {
                let values = rec.as_i16_vec()?;
                gfx.datatype = *values.first().ok_or_else(|| GdsError::malformed(rec.offset, "empty DATATYPE payload"))? as u16;
                Ok(Frame::Element(lib, cell, ElementBuilder::Graphic(gfx)))
            }
            XY => {
                let coords = rec.as_i32_vec()?;
                if coords.len() % 2 != 0 {
                    return Err(GdsError::malformed(rec.offset, "XY payload has an odd number of i32 values"));
                }
                gfx.vertices.extend(coords.chunks_exact(2).map(|c| Point::new(c[0], c[1])));
                Ok(Frame::Element(lib, cell, ElementBuilder::Graphic(gfx)))
            }
            WIDTH => {
                let values = rec.as_i32_vec()?;
                gfx.width = *values.first().ok_or_else(|| GdsError::malformed(rec.offset, "empty WIDTH payload"))?;
                Ok(Frame::Element(lib, cell, ElementBuilder::Graphic(gfx)))
            }
            PATHTYPE => {
                let values = rec.as_i16_vec()?;
                let value = *values.first().ok_or_else(|| GdsError::malformed(rec.offset, "empty PATHTYPE payload"))?;
                gfx.cap_style = PathCapStyle::from_pathtype(value);
                Ok(Frame::Element(lib, cell, ElementBuilder::Graphic(gfx)))
            }
            ENDEL => {
                cell.add_graphic(gfx.finish(options.simplify_polygons));
                Ok(Frame::Cell(lib, cell))
            }
            other if is_known_record(other) => Err(GdsError::protocol(
                rec.offset,
                format!("record 0x{:04X} is not valid inside a graphic element", other),
            )),
            other => {
                log::debug!("skipping unknown record 0x{:04X} inside graphic element (offset {})", other, rec.offset);
                Ok(Frame::Element(lib, cell, ElementBuilder::Graphic(gfx)))
            }
        },

        ElementBuilder::Sref(mut sref) => match rec.rec_type {
            SNAME => {
                sref.ref_name = truncate_name(rec.as_ascii(), "SREF name");
                Ok(Frame::Element(lib, cell, ElementBuilder::Sref(sref)))
            }
            XY => {
                if rec.payload.len() != 8 {
                    return Err(GdsError::malformed(rec.offset, "SREF XY payload must be 8 bytes"));
                }
                let coords = rec.as_i32_vec()?;
                sref.origin = Point::new(coords[0], coords[1]);
                Ok(Frame::Element(lib, cell, ElementBuilder::Sref(sref)))
            }
            STRANS => {
                sref.flipped = strans_flipped(&rec)?;
                Ok(Frame::Element(lib, cell, ElementBuilder::Sref(sref)))
            }
            MAG => {
                sref.magnification = *rec.as_real8_vec()?.first().ok_or_else(|| GdsError::malformed(rec.offset, "empty MAG payload"))?;
                Ok(Frame::Element(lib, cell, ElementBuilder::Sref(sref)))
            }
            ANGLE => {
                sref.angle_deg = *rec.as_real8_vec()?.first().ok_or_else(|| GdsError::malformed(rec.offset, "empty ANGLE payload"))?;
                Ok(Frame::Element(lib, cell, ElementBuilder::Sref(sref)))
            }
            ENDEL => {
                cell.add_child(sref.finish());
                Ok(Frame::Cell(lib, cell))
            }
            other if is_known_record(other) => {
                Err(GdsError::protocol(rec.offset, format!("record 0x{:04X} is not valid inside an SREF", other)))
            }
            other => {
                log::debug!("skipping unknown record 0x{:04X} inside SREF (offset {})", other, rec.offset);
                Ok(Frame::Element(lib, cell, ElementBuilder::Sref(sref)))
            }
        },

        ElementBuilder::Aref(mut aref) => match rec.rec_type {
            SNAME => {
                aref.ref_name = truncate_name(rec.as_ascii(), "AREF name");
                Ok(Frame::Element(lib, cell, ElementBuilder::Aref(aref)))
            }
            XY => {
                if rec.payload.len() != 24 {
                    return Err(GdsError::malformed(rec.offset, "AREF XY payload must be 24 bytes (3 control points)"));
                }
                let coords = rec.as_i32_vec()?;
                for (i, chunk) in coords.chunks_exact(2).enumerate() {
                    aref.control_points[i] = Point::new(chunk[0], chunk[1]);
                }
                aref.control_points_set = 3;
                Ok(Frame::Element(lib, cell, ElementBuilder::Aref(aref)))
            }
            COLROW => {
                if rec.payload.len() != 4 {
                    return Err(GdsError::malformed(rec.offset, "COLROW payload must be 4 bytes"));
                }
                let values = rec.as_i16_vec()?;
                aref.cols = values[0] as i32;
                aref.rows = values[1] as i32;
                Ok(Frame::Element(lib, cell, ElementBuilder::Aref(aref)))
            }
            STRANS => {
                aref.flipped = strans_flipped(&rec)?;
                Ok(Frame::Element(lib, cell, ElementBuilder::Aref(aref)))
            }
            MAG => {
                aref.magnification = *rec.as_real8_vec()?.first().ok_or_else(|| GdsError::malformed(rec.offset, "empty MAG payload"))?;
                Ok(Frame::Element(lib, cell, ElementBuilder::Aref(aref)))
            }
            ANGLE => {
                aref.angle_deg = *rec.as_real8_vec()?.first().ok_or_else(|| GdsError::malformed(rec.offset, "empty ANGLE payload"))?;
                Ok(Frame::Element(lib, cell, ElementBuilder::Aref(aref)))
            }
            ENDEL => {
                if aref.control_points_set != 3 {
                    return Err(GdsError::protocol(rec.offset, "AREF ended without all 3 control points"));
                }
                for sref in aref.expand() {
                    cell.add_child(sref);
                }
                Ok(Frame::Cell(lib, cell))
            }
            other if is_known_record(other) => {
                Err(GdsError::protocol(rec.offset, format!("record 0x{:04X} is not valid inside an AREF", other)))
            }
            other => {
                log::debug!("skipping unknown record 0x{:04X} inside AREF (offset {})", other, rec.offset);
                Ok(Frame::Element(lib, cell, ElementBuilder::Aref(aref)))
            }
        },
    }
}

/// Bit 15 of the STRANS flag word selects mirror-before-rotation.
fn strans_flipped(rec: &Record) -> Result<bool, GdsError> {
    let value = rec.as_u16()?;
    Ok(value & 0x8000 != 0)
}

/// The parser's two terminal passes, run once per library on a clean EOF:
/// resolve SREF target names against the library's cell index, and compute
/// per-cell statistics for analysis output.
fn finalize(libraries: &mut [Library]) {
    for lib in libraries.iter_mut() {
        resolve_references(lib);
    }
}

fn resolve_references(lib: &mut Library) {
    let names: std::collections::HashSet<String> = lib.cell_names.iter().cloned().collect();
    for cell in lib.cells.iter_mut() {
        for sref in cell.children.iter_mut() {
            sref.resolved_cell = if names.contains(&sref.ref_name) { Some(sref.ref_name.clone()) } else { None };
        }
    }
}

/// Computes per-cell graphic/reference/vertex totals for `lib`, grounded on
/// the original's `gds_statistics_calc_cell`. Returned as a side table
/// rather than stored on `Cell`, since this is reporting data, not part of
/// the resolved model's structural invariants.
pub fn compute_library_statistics(lib: &Library) -> HashMap<String, CellStatistics> {
    let mut stats = HashMap::with_capacity(lib.cells.len());
    for cell in &lib.cells {
        let vertices: usize = cell.graphics.iter().map(|g| g.vertices().len()).sum();
        stats.insert(
            cell.name.clone(),
            CellStatistics { graphics: cell.graphics.len(), references: cell.children.len(), vertices },
        );
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn be16(v: u16) -> [u8; 2] {
        v.to_be_bytes()
    }
    fn be32(v: i32) -> [u8; 4] {
        v.to_be_bytes()
    }

    fn record(rec_type: u16, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&be16((payload.len() + 4) as u16));
        out.extend_from_slice(&be16(rec_type));
        out.extend_from_slice(payload);
        out
    }

    fn real8_one() -> [u8; 8] {
        [0x41, 0x10, 0, 0, 0, 0, 0, 0]
    }
    fn real8(value_exponent: u8, frac_top: u8) -> [u8; 8] {
        [value_exponent, frac_top, 0, 0, 0, 0, 0, 0]
    }

    fn ascii_padded(name: &str) -> Vec<u8> {
        let mut bytes = name.as_bytes().to_vec();
        if bytes.len() % 2 != 0 {
            bytes.push(0);
        }
        bytes
    }

    #[test]
    fn minimal_library_header_libname_units_endlib() {
        let mut stream = Vec::new();
        stream.extend(record(record_type::HEADER, &be16(7)));
        stream.extend(record(record_type::BGNLIB, &[0u8; 24]));
        stream.extend(record(record_type::LIBNAME, &ascii_padded("A")));
        let mut units_payload = Vec::new();
        units_payload.extend_from_slice(&real8(0x3A, 0x44)); // arbitrary user unit, unused
        units_payload.extend_from_slice(&real8_one());
        stream.extend(record(record_type::UNITS, &units_payload));
        stream.extend(record(record_type::ENDLIB, &[]));

        let libs = parse_libraries(&stream[..], &ParseOptions::default()).unwrap();
        assert_eq!(libs.len(), 1);
        assert_eq!(libs[0].name, "A");
        assert_eq!(libs[0].unit_in_meters, 1.0);
        assert!(libs[0].cells.is_empty());
    }

    #[test]
    fn single_cell_with_box() {
        let mut stream = Vec::new();
        stream.extend(record(record_type::BGNLIB, &[0u8; 24]));
        stream.extend(record(record_type::LIBNAME, &ascii_padded("A")));
        stream.extend(record(record_type::BGNSTR, &[0u8; 24]));
        stream.extend(record(record_type::STRNAME, &ascii_padded("C")));
        stream.extend(record(record_type::BOX, &[]));
        stream.extend(record(record_type::LAYER, &be16(5)));
        stream.extend(record(record_type::DATATYPE, &be16(0)));
        let mut xy = Vec::new();
        for (x, y) in [(0, 0), (100, 0), (100, 100), (0, 100), (0, 0)] {
            xy.extend_from_slice(&be32(x));
            xy.extend_from_slice(&be32(y));
        }
        stream.extend(record(record_type::XY, &xy));
        stream.extend(record(record_type::ENDEL, &[]));
        stream.extend(record(record_type::ENDSTR, &[]));
        stream.extend(record(record_type::ENDLIB, &[]));

        let libs = parse_libraries(&stream[..], &ParseOptions::default()).unwrap();
        assert_eq!(libs.len(), 1);
        let cell = libs[0].find_cell("C").unwrap();
        assert_eq!(cell.graphics.len(), 1);
        match &cell.graphics[0] {
            Graphic::Box(b) => {
                assert_eq!(b.layer, 5);
                assert_eq!(b.vertices.len(), 5);
            }
            _ => panic!("expected a Box graphic"),
        }
    }

    #[test]
    fn sref_resolution_sets_resolved_cell() {
        let mut stream = Vec::new();
        stream.extend(record(record_type::BGNLIB, &[0u8; 24]));
        stream.extend(record(record_type::LIBNAME, &ascii_padded("A")));

        stream.extend(record(record_type::BGNSTR, &[0u8; 24]));
        stream.extend(record(record_type::STRNAME, &ascii_padded("A")));
        stream.extend(record(record_type::ENDSTR, &[]));

        stream.extend(record(record_type::BGNSTR, &[0u8; 24]));
        stream.extend(record(record_type::STRNAME, &ascii_padded("B")));
        stream.extend(record(record_type::SREF, &[]));
        stream.extend(record(record_type::SNAME, &ascii_padded("A")));
        let mut xy = Vec::new();
        xy.extend_from_slice(&be32(10));
        xy.extend_from_slice(&be32(20));
        stream.extend(record(record_type::XY, &xy));
        stream.extend(record(record_type::ENDEL, &[]));
        stream.extend(record(record_type::ENDSTR, &[]));

        stream.extend(record(record_type::ENDLIB, &[]));

        let libs = parse_libraries(&stream[..], &ParseOptions::default()).unwrap();
        let b = libs[0].find_cell("B").unwrap();
        assert_eq!(b.children[0].resolved_cell.as_deref(), Some("A"));
    }

    #[test]
    fn unresolved_sref_leaves_resolved_cell_none() {
        let mut stream = Vec::new();
        stream.extend(record(record_type::BGNLIB, &[0u8; 24]));
        stream.extend(record(record_type::LIBNAME, &ascii_padded("A")));
        stream.extend(record(record_type::BGNSTR, &[0u8; 24]));
        stream.extend(record(record_type::STRNAME, &ascii_padded("A")));
        stream.extend(record(record_type::SREF, &[]));
        stream.extend(record(record_type::SNAME, &ascii_padded("MISSING")));
        let mut xy = Vec::new();
        xy.extend_from_slice(&be32(0));
        xy.extend_from_slice(&be32(0));
        stream.extend(record(record_type::XY, &xy));
        stream.extend(record(record_type::ENDEL, &[]));
        stream.extend(record(record_type::ENDSTR, &[]));
        stream.extend(record(record_type::ENDLIB, &[]));

        let libs = parse_libraries(&stream[..], &ParseOptions::default()).unwrap();
        let a = libs[0].find_cell("A").unwrap();
        assert!(a.children[0].resolved_cell.is_none());
    }

    #[test]
    fn aref_expands_to_grid_of_srefs() {
        let mut stream = Vec::new();
        stream.extend(record(record_type::BGNLIB, &[0u8; 24]));
        stream.extend(record(record_type::LIBNAME, &ascii_padded("A")));
        stream.extend(record(record_type::BGNSTR, &[0u8; 24]));
        stream.extend(record(record_type::STRNAME, &ascii_padded("TOP")));
        stream.extend(record(record_type::AREF, &[]));
        stream.extend(record(record_type::SNAME, &ascii_padded("P")));
        stream.extend(record(record_type::COLROW, &[be16(2)[0], be16(2)[1], be16(3)[0], be16(3)[1]]));
        let mut xy = Vec::new();
        for (x, y) in [(0, 0), (200, 0), (0, 300)] {
            xy.extend_from_slice(&be32(x));
            xy.extend_from_slice(&be32(y));
        }
        stream.extend(record(record_type::XY, &xy));
        stream.extend(record(record_type::ENDEL, &[]));
        stream.extend(record(record_type::ENDSTR, &[]));
        stream.extend(record(record_type::ENDLIB, &[]));

        let libs = parse_libraries(&stream[..], &ParseOptions::default()).unwrap();
        let top = libs[0].find_cell("TOP").unwrap();
        assert_eq!(top.children.len(), 6);
        let mut origins: Vec<(i32, i32)> = top.children.iter().map(|s| (s.origin.x, s.origin.y)).collect();
        origins.sort();
        let mut expected = vec![(0, 0), (100, 0), (0, 100), (100, 100), (0, 200), (100, 200)];
        expected.sort();
        assert_eq!(origins, expected);
    }

    #[test]
    fn zero_length_record_at_top_level_after_endlib_is_tolerated() {
        let mut stream = Vec::new();
        stream.extend(record(record_type::BGNLIB, &[0u8; 24]));
        stream.extend(record(record_type::LIBNAME, &ascii_padded("A")));
        stream.extend(record(record_type::ENDLIB, &[]));
        stream.extend_from_slice(&be16(0)); // zero-length padding

        let libs = parse_libraries(&stream[..], &ParseOptions::default()).unwrap();
        assert_eq!(libs.len(), 1);
    }

    #[test]
    fn zero_length_record_inside_open_cell_is_malformed() {
        let mut stream = Vec::new();
        stream.extend(record(record_type::BGNLIB, &[0u8; 24]));
        stream.extend(record(record_type::LIBNAME, &ascii_padded("A")));
        stream.extend(record(record_type::BGNSTR, &[0u8; 24]));
        stream.extend_from_slice(&be16(0));

        assert!(parse_libraries(&stream[..], &ParseOptions::default()).is_err());
    }

    #[test]
    fn long_cell_name_is_truncated_not_rejected() {
        let long_name = "C".repeat(150);
        let mut stream = Vec::new();
        stream.extend(record(record_type::BGNLIB, &[0u8; 24]));
        stream.extend(record(record_type::LIBNAME, &ascii_padded("A")));
        stream.extend(record(record_type::BGNSTR, &[0u8; 24]));
        stream.extend(record(record_type::STRNAME, &ascii_padded(&long_name)));
        stream.extend(record(record_type::ENDSTR, &[]));
        stream.extend(record(record_type::ENDLIB, &[]));

        let libs = parse_libraries(&stream[..], &ParseOptions::default()).unwrap();
        assert_eq!(libs[0].cells[0].name.len(), MAX_NAME_LEN);
    }

    #[test]
    fn unexpected_eof_with_open_frame_is_malformed() {
        let mut stream = Vec::new();
        stream.extend(record(record_type::BGNLIB, &[0u8; 24]));
        assert!(parse_libraries(&stream[..], &ParseOptions::default()).is_err());
    }

    #[test]
    fn compute_statistics_counts_graphics_and_vertices() {
        let mut lib = Library::new("A");
        let mut cell = Cell::new("C");
        cell.add_graphic(Graphic::Box(BoxElement {
            layer: 0,
            datatype: 0,
            vertices: vec![Point::new(0, 0), Point::new(1, 0), Point::new(1, 1)],
        }));
        lib.add_cell(cell);
        let stats = compute_library_statistics(&lib);
        let c = stats.get("C").unwrap();
        assert_eq!(c.graphics, 1);
        assert_eq!(c.vertices, 3);
        assert_eq!(c.references, 0);
    }

    #[test]
    fn endstr_with_no_cell_open_is_a_protocol_error() {
        let mut stream = Vec::new();
        stream.extend(record(record_type::BGNLIB, &[0u8; 24]));
        stream.extend(record(record_type::LIBNAME, &ascii_padded("A")));
        stream.extend(record(record_type::ENDSTR, &[]));

        let err = parse_libraries(&stream[..], &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, GdsError::Protocol { .. }));
    }

    #[test]
    fn sref_outside_a_cell_is_a_protocol_error() {
        let mut stream = Vec::new();
        stream.extend(record(record_type::BGNLIB, &[0u8; 24]));
        stream.extend(record(record_type::LIBNAME, &ascii_padded("A")));
        stream.extend(record(record_type::SREF, &[]));

        let err = parse_libraries(&stream[..], &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, GdsError::Protocol { .. }));
    }

    #[test]
    fn text_record_is_tolerated_everywhere_as_a_non_goal() {
        let mut stream = Vec::new();
        stream.extend(record(record_type::BGNLIB, &[0u8; 24]));
        stream.extend(record(record_type::LIBNAME, &ascii_padded("A")));
        stream.extend(record(record_type::BGNSTR, &[0u8; 24]));
        stream.extend(record(record_type::STRNAME, &ascii_padded("C")));
        stream.extend(record(record_type::TEXT, &[]));
        stream.extend(record(record_type::ENDSTR, &[]));
        stream.extend(record(record_type::ENDLIB, &[]));

        let libs = parse_libraries(&stream[..], &ParseOptions::default()).unwrap();
        assert!(libs[0].find_cell("C").unwrap().graphics.is_empty());
    }
}
