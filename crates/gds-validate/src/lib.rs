//! C4: the validator. Two independent, library-at-a-time checks that run
//! after `gds-io` has resolved SREF names against the cell index:
//!
//! - unresolved-children counting (just tallies what the parser already
//!   left as `None`)
//! - reference-loop detection (a fresh per-root DFS with an on-stack
//!   marker, not a single global visited set — see [`validate_library`])
//!
//! Neither check is fatal; both results live on `Cell.checks` for
//! downstream consumers (the bbox kernel, the renderers) to honor.

use std::collections::HashSet;

use gds_core::{Cell, Library, NOT_RUN};

/// Library-level summary of one validator pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub unresolved_children: usize,
    pub cells_affected_by_loop: usize,
}

/// Runs both checks over every cell in `library`, mutating each cell's
/// `checks` fields in place. Idempotent: a second call resets both fields
/// before recomputing, so repeated runs never compound stale results (§8).
pub fn validate_library(library: &mut Library) -> ValidationReport {
    let unresolved_children = count_unresolved_children(library);
    let cells_affected_by_loop = detect_reference_loops(library);
    if unresolved_children > 0 {
        log::warn!("library '{}' has {unresolved_children} unresolved SREF(s)", library.name);
    }
    if cells_affected_by_loop > 0 {
        log::warn!("library '{}' has {cells_affected_by_loop} cell(s) affected by a reference loop", library.name);
    }
    ValidationReport { unresolved_children, cells_affected_by_loop }
}

fn count_unresolved_children(library: &mut Library) -> usize {
    let mut total = 0;
    for cell in library.cells.iter_mut() {
        let unresolved = cell.children.iter().filter(|sref| sref.resolved_cell.is_none()).count();
        cell.checks.unresolved_children = unresolved as i64;
        total += unresolved;
    }
    total
}

/// Per-root DFS with an on-stack marker. A cell can appear on many
/// resolved paths without ever being part of a cycle; only the
/// "on-the-current-path" predicate distinguishes a loop from ordinary
/// reuse, and that predicate is exactly what an on-stack set tracks — a
/// permanent visited set would conflate "already fully explored" with
/// "currently being explored" and under-report loops.
fn detect_reference_loops(library: &mut Library) -> usize {
    for cell in library.cells.iter_mut() {
        cell.checks.affected_by_loop = 0;
    }

    let mut affected = 0;
    let names: Vec<String> = library.cell_names.clone();
    for root in &names {
        let mut on_stack = HashSet::new();
        if reaches_cycle(library, root, &mut on_stack) {
            if let Some(cell) = library.find_cell_mut(root) {
                if cell.checks.affected_by_loop != 1 {
                    cell.checks.affected_by_loop = 1;
                    affected += 1;
                }
            }
        }
    }
    affected
}

fn reaches_cycle(library: &Library, name: &str, on_stack: &mut HashSet<String>) -> bool {
    if on_stack.contains(name) {
        return true;
    }
    let Some(cell) = library.find_cell(name) else {
        return false;
    };
    on_stack.insert(name.to_string());
    let mut found_cycle = false;
    for sref in &cell.children {
        let Some(child_name) = sref.resolved_cell.as_ref() else {
            continue;
        };
        if reaches_cycle(library, child_name, on_stack) {
            found_cycle = true;
            break;
        }
    }
    on_stack.remove(name);
    found_cycle
}

/// True when `cell` is safe to recurse into for bbox computation: the
/// validator has run (`affected_by_loop != NOT_RUN`) and found no loop.
pub fn is_safe_to_recurse(cell: &Cell) -> bool {
    cell.checks.affected_by_loop == 0
}

/// True when the validator has not yet run on `cell`. Renderers must treat
/// this the same as "unsafe" per the consumer contract in §4.4.
pub fn is_unvalidated(cell: &Cell) -> bool {
    cell.checks.affected_by_loop == NOT_RUN
}

#[cfg(test)]
mod tests {
    use super::*;
    use gds_core::{Cell, Library, Point, SRef};

    fn link(parent: &mut Cell, child_name: &str) {
        let mut sref = SRef::new(child_name.to_string(), Point::new(0, 0));
        sref.resolved_cell = Some(child_name.to_string());
        parent.add_child(sref);
    }

    #[test]
    fn unresolved_reference_is_counted_not_fatal() {
        let mut lib = Library::new("L");
        let mut a = Cell::new("A");
        a.add_child(SRef::new("MISSING".to_string(), Point::new(0, 0)));
        lib.add_cell(a);

        let report = validate_library(&mut lib);
        assert_eq!(report.unresolved_children, 1);
        assert_eq!(lib.find_cell("A").unwrap().checks.unresolved_children, 1);
    }

    #[test]
    fn two_cell_cycle_is_flagged_on_both() {
        let mut lib = Library::new("L");
        let mut a = Cell::new("A");
        link(&mut a, "B");
        lib.add_cell(a);
        let mut b = Cell::new("B");
        link(&mut b, "A");
        lib.add_cell(b);

        let report = validate_library(&mut lib);
        assert_eq!(report.cells_affected_by_loop, 2);
        assert_eq!(lib.find_cell("A").unwrap().checks.affected_by_loop, 1);
        assert_eq!(lib.find_cell("B").unwrap().checks.affected_by_loop, 1);
    }

    #[test]
    fn shared_non_cyclic_reference_is_not_flagged() {
        // A -> C, B -> C (C reachable from two paths but no cycle)
        let mut lib = Library::new("L");
        lib.add_cell(Cell::new("C"));
        let mut a = Cell::new("A");
        link(&mut a, "C");
        lib.add_cell(a);
        let mut b = Cell::new("B");
        link(&mut b, "C");
        lib.add_cell(b);

        let report = validate_library(&mut lib);
        assert_eq!(report.cells_affected_by_loop, 0);
        for name in ["A", "B", "C"] {
            assert_eq!(lib.find_cell(name).unwrap().checks.affected_by_loop, 0);
        }
    }

    #[test]
    fn self_reference_is_a_loop() {
        let mut lib = Library::new("L");
        let mut a = Cell::new("A");
        link(&mut a, "A");
        lib.add_cell(a);

        let report = validate_library(&mut lib);
        assert_eq!(report.cells_affected_by_loop, 1);
    }

    #[test]
    fn running_validator_twice_is_idempotent() {
        let mut lib = Library::new("L");
        let mut a = Cell::new("A");
        link(&mut a, "B");
        lib.add_cell(a);
        let mut b = Cell::new("B");
        link(&mut b, "A");
        lib.add_cell(b);

        let first = validate_library(&mut lib);
        let second = validate_library(&mut lib);
        assert_eq!(first, second);
    }

    #[test]
    fn cell_not_yet_validated_reports_not_run() {
        let cell = Cell::new("A");
        assert!(is_unvalidated(&cell));
        assert!(!is_safe_to_recurse(&cell));
    }
}
