//! Cairo PDF/SVG back-end (§4.6.3). Rasterizes (well, vectorizes) the
//! resolved cell tree onto a single `cairo::Context`, recursing through
//! resolved SREFs with `cr.save()`/`cr.transform()`/`cr.restore()` the way a
//! direct-mode vector renderer naturally does.
//!
//! Grounded on the teacher's GPU render-data builder
//! (`opensilicon-renderer/src/render_data.rs`) for the top-down
//! cell-to-primitive walk, enriched with `cairo-rs` itself (not part of the
//! teacher's own stack) since nothing in the pack already wraps libcairo —
//! see DESIGN.md.

use std::f64::consts::PI;
use std::fs::File;
use std::path::{Path, PathBuf};

use cairo::{Context, Matrix, PdfSurface, SvgSurface};

use gds_core::{Cell, Graphic, Library, LayerSettings, PathCapStyle};

use crate::error::RenderError;
use crate::renderer::{check_renderable, OutputRenderer};

/// Cairo keeps every layer's drawing on one surface, but the original tool's
/// layer-stack UI caps the selectable layer count; we keep that cap here
/// rather than let an oversized mapping silently degrade render order.
pub const MAX_LAYERS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    Pdf,
    Svg,
}

pub struct CairoRenderer {
    output_file_path: PathBuf,
    layer_settings: LayerSettings,
    format: RasterFormat,
}

impl CairoRenderer {
    pub fn new(output_file_path: impl Into<PathBuf>, layer_settings: LayerSettings, format: RasterFormat) -> Self {
        Self {
            output_file_path: output_file_path.into(),
            layer_settings,
            format,
        }
    }

    fn draw_graphic(&self, cr: &Context, graphic: &Graphic, scale: u32) {
        let Some(layer) = self.layer_settings.get(graphic.layer() as i32) else {
            return;
        };
        if !layer.render {
            return;
        }
        let verts = graphic.vertices();
        if verts.is_empty() {
            return;
        }

        cr.set_source_rgba(layer.color.r as f64, layer.color.g as f64, layer.color.b as f64, layer.color.a as f64);

        let to_user = |p: &gds_core::Point| (p.x as f64 / scale as f64, p.y as f64 / scale as f64);
        let (x0, y0) = to_user(&verts[0]);
        cr.move_to(x0, y0);
        for v in &verts[1..] {
            let (x, y) = to_user(v);
            cr.line_to(x, y);
        }

        match graphic {
            Graphic::Boundary(_) | Graphic::Box(_) => {
                cr.close_path();
                let _ = cr.fill();
            }
            Graphic::Path(p) => {
                cr.set_line_width(p.width.unsigned_abs() as f64 / scale as f64);
                cr.set_line_cap(match p.cap_style {
                    PathCapStyle::Flush => cairo::LineCap::Butt,
                    PathCapStyle::Round => cairo::LineCap::Round,
                    PathCapStyle::Square => cairo::LineCap::Square,
                });
                let _ = cr.stroke();
            }
        }
    }

    fn draw_cell(&self, cr: &Context, cell: &Cell, library: &Library, scale: u32) -> Result<(), RenderError> {
        check_renderable(cell)?;

        for graphic in &cell.graphics {
            self.draw_graphic(cr, graphic, scale);
        }

        for sref in &cell.children {
            let Some(child_name) = sref.resolved_cell.as_ref() else {
                continue;
            };
            let Some(child) = library.find_cell(child_name) else {
                continue;
            };

            cr.save().map_err(|e| RenderError::Cairo(e.to_string()))?;

            let angle = sref.angle_deg * PI / 180.0;
            let flip = if sref.flipped { -1.0 } else { 1.0 };
            let mag = sref.magnification;
            let a = mag * angle.cos();
            let b = mag * angle.sin();
            let c = -mag * angle.sin() * flip;
            let d = mag * angle.cos() * flip;
            let tx = sref.origin.x as f64 / scale as f64;
            let ty = sref.origin.y as f64 / scale as f64;
            cr.transform(Matrix::new(a, b, c, d, tx, ty));

            let result = self.draw_cell(cr, child, library, scale);
            cr.restore().map_err(|e| RenderError::Cairo(e.to_string()))?;
            result?;
        }
        Ok(())
    }
}

impl OutputRenderer for CairoRenderer {
    fn render(&mut self, cell: &Cell, library: &Library, scale: u32) -> Result<(), RenderError> {
        let scale = scale.max(1);
        let layer_count = self.layer_settings.list_in_order().len();
        if layer_count > MAX_LAYERS {
            return Err(RenderError::LayerLimitExceeded { count: layer_count, cap: MAX_LAYERS });
        }

        let bbox = gds_core::cell_bounding_box(library, cell).map_err(|_| RenderError::ReferenceLoop(cell.name.clone()))?;
        let (width, height) = if bbox.is_empty() {
            (1.0, 1.0)
        } else {
            (
                (bbox.width() / scale as f64).max(1.0),
                (bbox.height() / scale as f64).max(1.0),
            )
        };
        let origin_x = bbox.lower_left.x / scale as f64;
        let origin_y = bbox.lower_left.y / scale as f64;

        // cairo's y axis grows downward; flip once up front so GDSII's
        // upward-growing y matches the page without inverting every point.
        let file = File::create(&self.output_file_path).map_err(RenderError::Io)?;
        match self.format {
            RasterFormat::Pdf => {
                let surface = PdfSurface::for_stream(width, height, file).map_err(|e| RenderError::Cairo(e.to_string()))?;
                let cr = Context::new(&surface).map_err(|e| RenderError::Cairo(e.to_string()))?;
                cr.translate(-origin_x, height + origin_y);
                cr.scale(1.0, -1.0);
                self.draw_cell(&cr, cell, library, scale)?;
                surface.finish_output_stream().map_err(|e| RenderError::Cairo(e.to_string()))?;
            }
            RasterFormat::Svg => {
                let surface = SvgSurface::for_stream(width, height, file).map_err(|e| RenderError::Cairo(e.to_string()))?;
                let cr = Context::new(&surface).map_err(|e| RenderError::Cairo(e.to_string()))?;
                cr.translate(-origin_x, height + origin_y);
                cr.scale(1.0, -1.0);
                self.draw_cell(&cr, cell, library, scale)?;
                surface.finish_output_stream().map_err(|e| RenderError::Cairo(e.to_string()))?;
            }
        }
        Ok(())
    }

    fn output_file_path(&self) -> &Path {
        &self.output_file_path
    }

    fn layer_settings(&self) -> &LayerSettings {
        &self.layer_settings
    }
}
