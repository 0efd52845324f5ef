//! External plugin back-end (§4.6.4). Loads a shared object at a
//! caller-given path and resolves three well-known symbols by name,
//! `unsafe` only at the FFI boundary itself.
//!
//! Grounded on the original's `external-renderer.c` (`dlopen`/`dlsym`
//! against a single render symbol); refined per this crate's newer ABI
//! (`exported_init` + `exported_render_cell_to_file`, optional
//! `exported_fork_request`) per SPEC_FULL.md §4.7's note that the refined
//! contract supersedes the original single-symbol one. Uses `libloading`,
//! the cross-pack crate for this (matching how other repos in the pack
//! load plugins dynamically rather than linking against `libdl` directly).

use std::ffi::CString;
use std::os::raw::{c_char, c_int};
use std::path::{Path, PathBuf};
use std::process::Command;

use libloading::{Library as DyLibrary, Symbol};

use gds_core::{Cell, Library, LayerInfo, LayerSettings};

use crate::error::RenderError;
use crate::renderer::{check_renderable, OutputRenderer};

const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

type InitFn = unsafe extern "C" fn(params: *const c_char, host_version: *const c_char) -> c_int;
/// Mirrors `exported_render_cell_to_file(cell*, layer_info_list*, const char
/// *output_path, double scale)` (§4.6.4/§6): the plugin receives the actual
/// cell and the ordered layer table, not just their names, since it is the
/// plugin's job to walk the cell's graphics and style them per layer. The
/// original's `GList *layer_info_list` becomes a `(ptr, len)` slice here —
/// this refined ABI is Rust-to-Rust (the plugin links against `gds-core`'s
/// own types), so there is no `GList` to reproduce.
type RenderFn = unsafe extern "C" fn(
    cell: *const Cell,
    layer_info_list: *const LayerInfo,
    layer_info_list_len: usize,
    output_path: *const c_char,
    scale: f64,
) -> c_int;
type ForkRequestFn = unsafe extern "C" fn() -> c_int;

/// What gets handed across the `--plugin-worker` process boundary: the
/// re-exec'd child starts with a blank address space, so the cell and layer
/// table the in-process path passes by pointer must instead be serialized
/// to disk and reloaded (`gds-core`'s model types already derive
/// `Serialize`/`Deserialize` for exactly this kind of round-trip).
#[derive(serde::Serialize, serde::Deserialize)]
struct WorkerPayload {
    cell: Cell,
    layers: Vec<LayerInfo>,
}

pub struct ExternalRenderer {
    so_path: PathBuf,
    output_file_path: PathBuf,
    layer_settings: LayerSettings,
    lib: DyLibrary,
    supports_fork: bool,
    render_lib_params: String,
    /// Re-exec target for the subprocess path (`std::env::current_exe`'s
    /// caller-supplied override, so tests don't depend on the real binary).
    self_exe: PathBuf,
}

impl ExternalRenderer {
    /// Loads `so_path`, calls `exported_init(params, host_version)` once,
    /// and fails construction on a nonzero return (§4.6.4's documented
    /// contract — a bad init must not silently proceed to render calls).
    pub fn load(
        so_path: impl AsRef<Path>,
        output_file_path: impl Into<PathBuf>,
        layer_settings: LayerSettings,
        render_lib_params: &str,
        self_exe: PathBuf,
    ) -> Result<Self, RenderError> {
        let lib = load_and_init(so_path.as_ref(), render_lib_params)?;
        let supports_fork = unsafe { lib.get::<ForkRequestFn>(b"exported_fork_request\0") }.is_ok();

        Ok(Self {
            so_path: so_path.as_ref().to_path_buf(),
            output_file_path: output_file_path.into(),
            layer_settings,
            lib,
            supports_fork,
            render_lib_params: render_lib_params.to_string(),
            self_exe,
        })
    }

    fn render_in_process(&self, cell: &Cell, scale: u32) -> Result<(), RenderError> {
        call_render(&self.lib, cell, self.layer_settings.list_in_order(), &self.output_file_path, scale)
    }

    /// Re-invokes the host binary in its hidden `--plugin-worker` mode
    /// rather than calling the exported symbol in-process, isolating a
    /// plugin crash from the host the way `command-line`'s own subprocess
    /// invocations isolate external tools elsewhere in the pack. The worker
    /// re-does `load` + `init` + `render` from scratch in the child, since
    /// a loaded `libloading::Library` cannot cross a `fork`/`exec` boundary;
    /// the cell and layer table cross that boundary as a temp-file payload
    /// rather than the raw pointers the in-process path uses.
    fn render_via_subprocess(&self, cell: &Cell, scale: u32) -> Result<(), RenderError> {
        let payload = WorkerPayload {
            cell: cell.clone(),
            layers: self.layer_settings.list_in_order().to_vec(),
        };
        let payload_path = std::env::temp_dir().join(format!("gds-render-plugin-{}.json", std::process::id()));
        let payload_json = serde_json::to_vec(&payload).map_err(|e| RenderError::Plugin(e.to_string()))?;
        std::fs::write(&payload_path, payload_json).map_err(RenderError::Io)?;

        let status = Command::new(&self.self_exe)
            .arg("--plugin-worker")
            .arg(&self.so_path)
            .arg(&payload_path)
            .arg(&self.output_file_path)
            .arg(scale.to_string())
            .arg(&self.render_lib_params)
            .status()
            .map_err(RenderError::Io);

        let _ = std::fs::remove_file(&payload_path);
        let status = status?;
        if !status.success() {
            return Err(RenderError::PluginRenderFailed(status.code().unwrap_or(-1)));
        }
        Ok(())
    }
}

impl OutputRenderer for ExternalRenderer {
    fn render(&mut self, cell: &Cell, _library: &Library, scale: u32) -> Result<(), RenderError> {
        check_renderable(cell)?;
        if self.supports_fork {
            self.render_via_subprocess(cell, scale)
        } else {
            self.render_in_process(cell, scale)
        }
    }

    fn output_file_path(&self) -> &Path {
        &self.output_file_path
    }

    fn layer_settings(&self) -> &LayerSettings {
        &self.layer_settings
    }
}

fn load_and_init(so_path: &Path, render_lib_params: &str) -> Result<DyLibrary, RenderError> {
    let lib = unsafe { DyLibrary::new(so_path) }.map_err(|e| RenderError::Plugin(e.to_string()))?;

    let params = CString::new(render_lib_params).map_err(|e| RenderError::Plugin(e.to_string()))?;
    let version = CString::new(CRATE_VERSION).map_err(|e| RenderError::Plugin(e.to_string()))?;

    let status = unsafe {
        let init: Symbol<InitFn> = lib.get(b"exported_init\0").map_err(|e| RenderError::Plugin(e.to_string()))?;
        init(params.as_ptr(), version.as_ptr())
    };
    if status != 0 {
        return Err(RenderError::PluginInitFailed(status));
    }
    Ok(lib)
}

fn call_render(
    lib: &DyLibrary,
    cell: &Cell,
    layers: &[LayerInfo],
    output_path: &Path,
    scale: u32,
) -> Result<(), RenderError> {
    let render: Symbol<RenderFn> =
        unsafe { lib.get(b"exported_render_cell_to_file\0") }.map_err(|e| RenderError::Plugin(e.to_string()))?;

    let out_path_c =
        CString::new(output_path.to_string_lossy().as_bytes()).map_err(|e| RenderError::Plugin(e.to_string()))?;

    let status =
        unsafe { render(cell as *const Cell, layers.as_ptr(), layers.len(), out_path_c.as_ptr(), scale as f64) };
    if status != 0 {
        return Err(RenderError::PluginRenderFailed(status));
    }
    Ok(())
}

/// Entry point for the hidden `--plugin-worker` subcommand `gds-cli` runs
/// in the re-exec'd child process: reloads the cell and layer table from
/// the payload file the parent wrote, loads the plugin, runs
/// `exported_init`, then `exported_render_cell_to_file`, completely
/// independently of any `ExternalRenderer` instance in the parent (a loaded
/// `libloading::Library` cannot be inherited across `exec`, and neither can
/// a raw pointer to the parent's `Cell`).
pub fn run_worker(so_path: &Path, payload_path: &Path, output_path: &Path, scale: u32, render_lib_params: &str) -> Result<(), RenderError> {
    let payload_json = std::fs::read(payload_path).map_err(RenderError::Io)?;
    let payload: WorkerPayload = serde_json::from_slice(&payload_json).map_err(|e| RenderError::Plugin(e.to_string()))?;

    let lib = load_and_init(so_path, render_lib_params)?;
    call_render(&lib, &payload.cell, &payload.layers, output_path, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gds_core::Rgba;

    #[test]
    fn load_reports_plugin_error_for_missing_library() {
        let result = ExternalRenderer::load(
            "/nonexistent/path/to/plugin.so",
            "/tmp/out.dat",
            LayerSettings::new(),
            "",
            PathBuf::from("/proc/self/exe"),
        );
        assert!(matches!(result, Err(RenderError::Plugin(_))));
    }

    #[test]
    fn run_worker_reports_io_error_for_missing_payload_file() {
        let result = run_worker(
            Path::new("/nonexistent/path/to/plugin.so"),
            Path::new("/nonexistent/path/to/payload.json"),
            Path::new("/tmp/out.dat"),
            1,
            "",
        );
        assert!(matches!(result, Err(RenderError::Io(_))));
    }

    #[test]
    fn worker_payload_round_trips_cell_and_layers() {
        let mut cell = Cell::new("C");
        cell.checks.affected_by_loop = 0;
        let layers = vec![LayerInfo::new(1, "metal1", Rgba { r: 1.0, g: 0.0, b: 0.0, a: 1.0 }, true)];
        let payload = WorkerPayload { cell, layers };

        let json = serde_json::to_vec(&payload).unwrap();
        let reloaded: WorkerPayload = serde_json::from_slice(&json).unwrap();

        assert_eq!(reloaded.cell.name, "C");
        assert_eq!(reloaded.layers.len(), 1);
        assert_eq!(reloaded.layers[0].name, "metal1");
    }
}
