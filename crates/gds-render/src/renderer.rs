//! C6: the abstract output-renderer contract (§4.6.1). Concrete back-ends
//! (TikZ, Cairo, the external plugin loader) all implement this trait and
//! are otherwise free to differ in how they walk the cell tree.

use std::path::Path;

use gds_core::{Cell, Library, LayerSettings};

use crate::error::RenderError;

pub trait OutputRenderer: Send {
    /// Renders `cell` (and, recursively, every cell it resolves a
    /// reference to) from `library`, with output coordinates divided by
    /// `scale`.
    fn render(&mut self, cell: &Cell, library: &Library, scale: u32) -> Result<(), RenderError>;

    fn output_file_path(&self) -> &Path;

    fn layer_settings(&self) -> &LayerSettings;
}

/// Shared precondition every back-end must apply before recursing into a
/// cell: the validator must have run, and the cell must not be part of a
/// reference loop (§4.4's consumer contract — "a cell whose
/// affected_by_loop == 1 must not be rendered").
pub fn check_renderable(cell: &Cell) -> Result<(), RenderError> {
    if gds_validate::is_unvalidated(cell) {
        log::warn!("cell '{}' has not been validated; rendering anyway at caller's risk", cell.name);
        return Ok(());
    }
    if !gds_validate::is_safe_to_recurse(cell) {
        return Err(RenderError::ReferenceLoop(cell.name.clone()));
    }
    Ok(())
}
