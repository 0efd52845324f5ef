//! Asynchronous render handle (§5.1). Spawns the render on a raw OS thread
//! rather than a `tokio` task: rendering is CPU-bound, not I/O-bound, so a
//! worker thread plus a coalescing `Mutex<Option<T>>` progress slot is the
//! idiomatic match for the teacher's synchronous/blocking dependency
//! profile, not an async runtime pulled in for one task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use gds_core::{Cell, Library};

use crate::error::RenderError;
use crate::renderer::OutputRenderer;

/// A single coalesced progress update. Later values overwrite earlier,
/// undrained ones — the poller only ever sees the most recent state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderProgress {
    pub cells_rendered: usize,
    pub cells_total: usize,
}

type Slot = (Mutex<Option<RenderProgress>>, Condvar);

/// Owns the worker thread for one render job. Dropping the handle blocks
/// until the thread has joined, so a caller can never outlive the renderer
/// it handed off.
pub struct AsyncRenderHandle {
    join: Option<JoinHandle<Result<(), RenderError>>>,
    slot: Arc<Slot>,
    finished: Arc<AtomicBool>,
}

impl AsyncRenderHandle {
    /// Spawns `renderer.render(cell, library, scale)` on a background
    /// thread. `cell` and `library` must be cloned or otherwise made
    /// `'static` by the caller before calling this, since the thread
    /// outlives the calling stack frame.
    pub fn spawn<R>(mut renderer: R, cell: Cell, library: Library, scale: u32) -> Self
    where
        R: OutputRenderer + 'static,
    {
        let slot: Arc<Slot> = Arc::new((Mutex::new(None), Condvar::new()));
        let finished = Arc::new(AtomicBool::new(false));

        let slot_worker = Arc::clone(&slot);
        let finished_worker = Arc::clone(&finished);

        let join = std::thread::spawn(move || {
            Self::push_progress(&slot_worker, RenderProgress { cells_rendered: 0, cells_total: 1 });
            let result = renderer.render(&cell, &library, scale);
            Self::push_progress(&slot_worker, RenderProgress { cells_rendered: 1, cells_total: 1 });
            finished_worker.store(true, Ordering::SeqCst);
            result
        });

        Self {
            join: Some(join),
            slot,
            finished,
        }
    }

    fn push_progress(slot: &Slot, progress: RenderProgress) {
        let (lock, condvar) = slot;
        *lock.lock().unwrap() = Some(progress);
        condvar.notify_all();
    }

    /// Drains the most recent undrained progress update, if any (the
    /// "poll loop between other work" side of the coalescing contract —
    /// `gds-cli` has no GUI event loop to push updates into).
    pub fn poll_progress(&self) -> Option<RenderProgress> {
        self.slot.0.lock().unwrap().take()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Blocks until the worker thread exits and returns its result.
    pub fn join(mut self) -> Result<(), RenderError> {
        match self.join.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| Err(RenderError::Plugin("render worker panicked".into()))),
            None => Ok(()),
        }
    }
}

impl Drop for AsyncRenderHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.join.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::check_renderable;
    use gds_core::LayerSettings;
    use std::path::Path;

    struct NoopRenderer;

    impl OutputRenderer for NoopRenderer {
        fn render(&mut self, cell: &Cell, _library: &Library, _scale: u32) -> Result<(), RenderError> {
            check_renderable(cell)
        }
        fn output_file_path(&self) -> &Path {
            Path::new("/dev/null")
        }
        fn layer_settings(&self) -> &LayerSettings {
            static EMPTY: std::sync::OnceLock<LayerSettings> = std::sync::OnceLock::new();
            EMPTY.get_or_init(LayerSettings::new)
        }
    }

    #[test]
    fn spawn_runs_to_completion_and_reports_finished() {
        let lib = Library::new("L");
        let mut cell = Cell::new("C");
        cell.checks.affected_by_loop = 0;

        let handle = AsyncRenderHandle::spawn(NoopRenderer, cell, lib, 1);
        let result = handle.join();
        assert!(result.is_ok());
    }

    #[test]
    fn progress_slot_coalesces_to_latest() {
        let slot: Arc<Slot> = Arc::new((Mutex::new(None), Condvar::new()));
        AsyncRenderHandle::push_progress(&slot, RenderProgress { cells_rendered: 0, cells_total: 2 });
        AsyncRenderHandle::push_progress(&slot, RenderProgress { cells_rendered: 1, cells_total: 2 });
        let latest = slot.0.lock().unwrap().take();
        assert_eq!(latest, Some(RenderProgress { cells_rendered: 1, cells_total: 2 }));
    }
}
