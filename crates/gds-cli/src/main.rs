//! `gds-render-cli`: wires `gds-io` → `gds-validate` → `gds-render` behind
//! a `clap`-derived argument surface (§6.1). Mirrors the original tool's
//! `command-line.c` contract: renderer/output-file pairs, an analyze-only
//! mode with three report formats, and the `|v|` negative-status exit
//! convention for subsystem failures.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use gds_core::{Library, LayerSettings};
use gds_io::ParseOptions;
use gds_render::{CairoRenderer, ExternalRenderer, OutputRenderer, RasterFormat, TikzRenderer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AnalysisFormat {
    Simple,
    Pretty,
    Cellsonly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RendererKind {
    Pdf,
    Svg,
    Tikz,
    Ext,
}

/// Convert GDSII layout streams to analysis reports or rendered output.
#[derive(Debug, Parser)]
#[command(name = "gds-render-cli", about, disable_version_flag = true)]
struct Args {
    /// Path to the input GDSII stream.
    input: PathBuf,

    /// Analyze only; do not render.
    #[arg(short = 'A', long = "analyze")]
    analyze: bool,

    /// Analysis report form.
    #[arg(short = 'f', long = "format", default_value = "simple")]
    format: AnalysisFormat,

    /// Renderer to use; may be repeated, paired positionally with `--output-file`.
    #[arg(short = 'r', long = "renderer")]
    renderer: Vec<RendererKind>,

    /// Output path; may be repeated, paired positionally with `--renderer`.
    #[arg(short = 'o', long = "output-file")]
    output_file: Vec<PathBuf>,

    /// Layer mapping CSV.
    #[arg(short = 'm', long = "mapping")]
    mapping: Option<PathBuf>,

    /// Cell to render; must exist in the first library. Defaults to that
    /// library's first cell when omitted.
    #[arg(short = 'c', long = "cell")]
    cell: Option<String>,

    /// Integer divisor applied to output coordinates.
    #[arg(short = 's', long = "scale", default_value_t = 1)]
    scale: u32,

    /// Emit a compilable standalone TikZ document.
    #[arg(short = 'a', long = "tex-standalone")]
    tex_standalone: bool,

    /// Emit TikZ output using PDF OCG layers.
    #[arg(short = 'l', long = "tex-layers")]
    tex_layers: bool,

    /// Shared object implementing the external-renderer ABI.
    #[arg(short = 'P', long = "custom-render-lib")]
    custom_render_lib: Option<PathBuf>,

    /// Opaque parameter string passed to the external renderer's `exported_init`.
    #[arg(short = 'W', long = "render-lib-params", default_value = "")]
    render_lib_params: String,
}

fn main() -> ExitCode {
    env_logger::init();

    let raw_args: Vec<String> = std::env::args().collect();
    if raw_args.get(1).map(String::as_str) == Some("--plugin-worker") {
        return match run_plugin_worker(&raw_args[2..]) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("error: {err:#}");
                ExitCode::from(1)
            }
        };
    }
    // §6's `--version / -v` is handled ahead of `clap` parsing: the
    // positional `input` argument is otherwise required, so `-v` alone
    // would fail argument validation before we ever got to print anything.
    if matches!(raw_args.get(1).map(String::as_str), Some("--version") | Some("-v")) {
        println!("gds-render-cli {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

/// Handles the hidden re-exec target `gds_render::external::run_worker`
/// dispatches to when a plugin declares `exported_fork_request`: this
/// process *is* the isolated subprocess, so it loads the plugin itself and
/// calls init/render directly rather than going through `ExternalRenderer`,
/// which would try to fork again.
fn run_plugin_worker(args: &[String]) -> Result<()> {
    let [so_path, payload_path, output_path, scale, params] = args else {
        bail!("--plugin-worker expects <so_path> <payload_path> <output_path> <scale> <params>");
    };
    let scale: u32 = scale.parse().context("parsing --plugin-worker scale argument")?;
    gds_render::run_worker(Path::new(so_path), Path::new(payload_path), Path::new(output_path), scale, params)
        .context("running external renderer plugin in worker subprocess")
}

fn run() -> Result<ExitCode> {
    let args = Args::parse();

    if args.renderer.len() != args.output_file.len() {
        bail!(
            "count of renderers ({}) does not match count of output files ({})",
            args.renderer.len(),
            args.output_file.len()
        );
    }

    let options = ParseOptions::default();
    let libraries = gds_io::read_file(&args.input, &options)
        .with_context(|| format!("parsing '{}'", args.input.display()))?;
    let Some(library) = libraries.into_iter().next() else {
        bail!("'{}' contains no libraries", args.input.display());
    };

    if args.analyze {
        run_analysis(&library, args.format);
        return Ok(ExitCode::SUCCESS);
    }

    let mut library = library;
    let report = gds_validate::validate_library(&mut library);
    log::info!(
        "validated '{}': {} unresolved children, {} cells affected by reference loops",
        library.name,
        report.unresolved_children,
        report.cells_affected_by_loop
    );

    let layer_settings = match &args.mapping {
        Some(path) => {
            let csv = std::fs::read_to_string(path).with_context(|| format!("reading '{}'", path.display()))?;
            let mut settings = LayerSettings::new();
            settings.load_from_csv(&csv);
            settings
        }
        None => LayerSettings::new(),
    };

    let cell_name = match &args.cell {
        Some(name) => name.clone(),
        None => library
            .cell_names
            .first()
            .cloned()
            .with_context(|| format!("'{}' contains no cells", library.name))?,
    };
    let cell = library
        .find_cell(&cell_name)
        .with_context(|| format!("cell '{cell_name}' not found in '{}'", library.name))?;

    if args.renderer.is_empty() {
        bail!("no renderer specified; pass --renderer/-r with a matching --output-file/-o");
    }

    for (kind, out_path) in args.renderer.iter().zip(args.output_file.iter()) {
        render_one(*kind, &args, out_path, &layer_settings, cell, &library)?;
    }

    Ok(ExitCode::SUCCESS)
}

fn render_one(
    kind: RendererKind,
    args: &Args,
    out_path: &PathBuf,
    layer_settings: &LayerSettings,
    cell: &gds_core::Cell,
    library: &Library,
) -> Result<()> {
    let mut renderer: Box<dyn OutputRenderer> = match kind {
        RendererKind::Pdf => Box::new(CairoRenderer::new(out_path, layer_settings.clone(), RasterFormat::Pdf)),
        RendererKind::Svg => Box::new(CairoRenderer::new(out_path, layer_settings.clone(), RasterFormat::Svg)),
        RendererKind::Tikz => {
            let mut tikz = TikzRenderer::new(out_path, layer_settings.clone());
            tikz.standalone = args.tex_standalone;
            tikz.use_pdf_layers = args.tex_layers;
            Box::new(tikz)
        }
        RendererKind::Ext => {
            let Some(so_path) = &args.custom_render_lib else {
                bail!("'ext' renderer requires --custom-render-lib/-P");
            };
            let self_exe = std::env::current_exe().context("resolving current executable path")?;
            Box::new(ExternalRenderer::load(
                so_path,
                out_path,
                layer_settings.clone(),
                &args.render_lib_params,
                self_exe,
            )?)
        }
    };

    renderer
        .render(cell, library, args.scale.max(1))
        .with_context(|| format!("rendering cell '{}' to '{}'", cell.name, out_path.display()))
}

fn run_analysis(library: &Library, format: AnalysisFormat) {
    let stats = gds_io::compute_library_statistics(library);

    match format {
        AnalysisFormat::Cellsonly => {
            for name in &library.cell_names {
                println!("{name}");
            }
        }
        AnalysisFormat::Simple => {
            println!("library: {}", library.name);
            println!("unit: {} m", library.unit_in_meters);
            println!("cells: {}", library.cells.len());
            for cell in &library.cells {
                let s = stats.get(&cell.name).copied().unwrap_or_default();
                println!("  {} graphics={} refs={} vertices={}", cell.name, s.graphics, s.references, s.vertices);
            }
        }
        AnalysisFormat::Pretty => {
            println!("Library: {}", library.name);
            println!("  modified:  {}", format_date(&library.mod_time));
            println!("  accessed:  {}", format_date(&library.access_time));
            println!("  unit:      {} m/dbu", library.unit_in_meters);
            println!("  cells:     {}", library.cells.len());
            println!();
            for cell in &library.cells {
                let s = stats.get(&cell.name).copied().unwrap_or_default();
                println!("  Cell '{}'", cell.name);
                println!("    modified:   {}", format_date(&cell.mod_time));
                println!("    graphics:   {}", s.graphics);
                println!("    references: {}", s.references);
                println!("    vertices:   {}", s.vertices);
            }
        }
    }
}

fn format_date(date: &gds_core::GdsDateTime) -> String {
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    let Some(d) = NaiveDate::from_ymd_opt(date.year as i32, date.month as u32, date.day as u32) else {
        return "(unset)".to_string();
    };
    let Some(t) = NaiveTime::from_hms_opt(date.hour as u32, date.minute as u32, date.second as u32) else {
        return "(unset)".to_string();
    };
    NaiveDateTime::new(d, t).format("%Y-%m-%d %H:%M:%S").to_string()
}
