//! Libraries: the top-level owner of a cell tree.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, GdsDateTime};

/// Default physical size of one database unit, in meters, when a library's
/// UNITS record is absent.
pub const DEFAULT_UNIT_IN_METERS: f64 = 1e-8;

/// Owns all cells parsed from one GDSII stream. `cell_names` mirrors
/// `cells[i].name` so consumers can scan names without walking `cells`
/// itself; `index` is this crate's O(1) lookup on top of that, kept in sync
/// by `add_cell`/`find_cell`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    pub mod_time: GdsDateTime,
    pub access_time: GdsDateTime,
    pub unit_in_meters: f64,
    pub cells: Vec<Cell>,
    pub cell_names: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Library {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mod_time: GdsDateTime::default(),
            access_time: GdsDateTime::default(),
            unit_in_meters: DEFAULT_UNIT_IN_METERS,
            cells: Vec::new(),
            cell_names: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn add_cell(&mut self, cell: Cell) -> usize {
        let idx = self.cells.len();
        self.cell_names.push(cell.name.clone());
        self.index.insert(cell.name.clone(), idx);
        self.cells.push(cell);
        idx
    }

    /// Rebuilds the name index. Needed after deserialization (the index is
    /// not serialized) or after any direct mutation of `cells`/`cell_names`
    /// that bypassed `add_cell`.
    pub fn rebuild_index(&mut self) {
        self.index.clear();
        for (i, cell) in self.cells.iter().enumerate() {
            self.index.insert(cell.name.clone(), i);
        }
    }

    pub fn find_cell(&self, name: &str) -> Option<&Cell> {
        self.index.get(name).map(|&i| &self.cells[i])
    }

    pub fn find_cell_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn find_cell_mut(&mut self, name: &str) -> Option<&mut Cell> {
        let idx = *self.index.get(name)?;
        self.cells.get_mut(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_cell_is_findable_by_name() {
        let mut lib = Library::new("A");
        lib.add_cell(Cell::new("TOP"));
        assert!(lib.find_cell("TOP").is_some());
        assert!(lib.find_cell("MISSING").is_none());
        assert_eq!(lib.cell_names, vec!["TOP".to_string()]);
    }

    #[test]
    fn rebuild_index_recovers_lookup_after_skip_deserialize() {
        let mut lib = Library::new("A");
        lib.add_cell(Cell::new("X"));
        let json = serde_json::to_string(&lib).unwrap();
        let mut restored: Library = serde_json::from_str(&json).unwrap();
        assert!(restored.find_cell("X").is_none());
        restored.rebuild_index();
        assert!(restored.find_cell("X").is_some());
    }

    #[test]
    fn default_unit_in_meters() {
        let lib = Library::new("A");
        assert_eq!(lib.unit_in_meters, DEFAULT_UNIT_IN_METERS);
    }
}
