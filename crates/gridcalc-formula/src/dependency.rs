//! Dependency tracking for formula calculation
//!
//! After a compile, the evaluation's [`AddressCache`] lists every address the
//! formula read. [`DependencyGraph::record_references`] turns those into
//! precedent edges. Single cells become direct edges; multi-cell ranges are
//! kept as ranges so whole-column references stay cheap.

use crate::address_cache::AddressCache;
use crate::context::EvaluationScope;
use crate::expression::{ExpressionGraph, ExpressionKind};
use gridcalc_core::{CellRange, RangeAddress};
use std::collections::{HashMap, HashSet};

/// Unique key for a cell (sheet name + position)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    /// Upper-cased worksheet name
    pub sheet: String,
    pub row: u32,
    pub col: u16,
}

impl CellKey {
    /// Create a new cell key
    pub fn new(sheet: &str, row: u32, col: u16) -> Self {
        Self {
            sheet: sheet.to_uppercase(),
            row,
            col,
        }
    }

    /// The cell a formula is evaluated for
    pub fn from_scope(scope: &EvaluationScope) -> Self {
        Self::new(&scope.worksheet, scope.row, scope.column)
    }
}

/// A multi-cell range a formula reads
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SheetRange {
    /// Upper-cased worksheet name
    pub sheet: String,
    pub range: CellRange,
}

impl SheetRange {
    pub fn contains(&self, cell: &CellKey) -> bool {
        self.sheet == cell.sheet && self.range.contains(cell.row, cell.col)
    }
}

/// Dependency graph for formula cells
///
/// Tracks which cells depend on which other cells,
/// enabling efficient recalculation.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Cell → Cells that depend on it (dependents)
    dependents: HashMap<CellKey, HashSet<CellKey>>,
    /// Cell → Cells it depends on (precedents)
    precedents: HashMap<CellKey, HashSet<CellKey>>,
    /// Cell → Ranges it depends on
    range_precedents: HashMap<CellKey, Vec<SheetRange>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency: dependent depends on precedent
    pub fn add_dependency(&mut self, precedent: CellKey, dependent: CellKey) {
        self.dependents
            .entry(precedent.clone())
            .or_default()
            .insert(dependent.clone());
        self.precedents
            .entry(dependent)
            .or_default()
            .insert(precedent);
    }

    /// Add a dependency on every cell of a range
    pub fn add_range_dependency(&mut self, precedent: SheetRange, dependent: CellKey) {
        let ranges = self.range_precedents.entry(dependent).or_default();
        if !ranges.contains(&precedent) {
            ranges.push(precedent);
        }
    }

    /// Record the addresses a compile of `cell`'s formula resolved
    ///
    /// Returns the number of addresses that could be parsed.
    pub fn record_references(&mut self, cell: &CellKey, cache: &AddressCache) -> usize {
        let mut recorded = 0;
        for (id, text) in cache.iter() {
            let address = match RangeAddress::parse(text) {
                Ok(address) => address,
                Err(e) => {
                    log::debug!("address {} ({}) not recorded: {}", id, text, e);
                    continue;
                }
            };
            let sheet = address.worksheet_or(&cell.sheet).to_uppercase();
            let range = address.range;
            if range.is_single_cell() {
                self.add_dependency(CellKey::new(&sheet, range.start.row, range.start.col), cell.clone());
            } else {
                self.add_range_dependency(SheetRange { sheet, range }, cell.clone());
            }
            recorded += 1;
        }
        recorded
    }

    /// Remove all dependencies for a cell
    pub fn clear_dependencies(&mut self, cell: &CellKey) {
        // Remove from all precedents' dependents list
        if let Some(precedents) = self.precedents.remove(cell) {
            for precedent in precedents {
                if let Some(deps) = self.dependents.get_mut(&precedent) {
                    deps.remove(cell);
                }
            }
        }
        self.range_precedents.remove(cell);

        // Remove as a precedent for others
        if let Some(dependents) = self.dependents.remove(cell) {
            for dependent in dependents {
                if let Some(precs) = self.precedents.get_mut(&dependent) {
                    precs.remove(cell);
                }
            }
        }
    }

    /// Get cells that depend on the given cell, directly or through a range
    pub fn get_dependents(&self, cell: &CellKey) -> Vec<CellKey> {
        let mut found: Vec<CellKey> = self
            .dependents
            .get(cell)
            .into_iter()
            .flat_map(|set| set.iter().cloned())
            .collect();
        for (dependent, ranges) in &self.range_precedents {
            if ranges.iter().any(|r| r.contains(cell)) && !found.contains(dependent) {
                found.push(dependent.clone());
            }
        }
        found.sort();
        found
    }

    /// Get cells that the given cell depends on directly
    pub fn get_precedents(&self, cell: &CellKey) -> impl Iterator<Item = &CellKey> + '_ {
        self.precedents.get(cell).into_iter().flat_map(|set| set.iter())
    }

    /// Get ranges that the given cell depends on
    pub fn get_range_precedents(&self, cell: &CellKey) -> &[SheetRange] {
        self.range_precedents.get(cell).map(Vec::as_slice).unwrap_or_default()
    }

    /// Cells to recalculate after `changed` changed, precedents first
    pub fn get_recalc_order(&self, changed: &[CellKey]) -> Vec<CellKey> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut in_stack = HashSet::new();

        for cell in changed {
            self.topological_sort(cell, &mut result, &mut visited, &mut in_stack);
        }

        result.reverse();
        result
    }

    /// Topological sort helper (DFS)
    fn topological_sort(
        &self,
        cell: &CellKey,
        result: &mut Vec<CellKey>,
        visited: &mut HashSet<CellKey>,
        in_stack: &mut HashSet<CellKey>,
    ) {
        if visited.contains(cell) || in_stack.contains(cell) {
            return;
        }

        in_stack.insert(cell.clone());
        for dependent in self.get_dependents(cell) {
            self.topological_sort(&dependent, result, visited, in_stack);
        }
        in_stack.remove(cell);
        visited.insert(cell.clone());
        result.push(cell.clone());
    }

    /// Formula cells `cell` reads, through direct edges and ranges
    fn formula_precedents(&self, cell: &CellKey) -> Vec<CellKey> {
        let mut found: Vec<CellKey> = self.get_precedents(cell).cloned().collect();
        for range in self.get_range_precedents(cell) {
            found.extend(
                self.precedents
                    .keys()
                    .chain(self.range_precedents.keys())
                    .filter(|formula| range.contains(formula))
                    .cloned(),
            );
        }
        found
    }

    /// Detect circular references involving a cell
    pub fn has_circular_reference(&self, cell: &CellKey) -> bool {
        let mut visited = HashSet::new();
        let mut in_stack = HashSet::new();
        self.detect_cycle(cell, &mut visited, &mut in_stack)
    }

    fn detect_cycle(
        &self,
        cell: &CellKey,
        visited: &mut HashSet<CellKey>,
        in_stack: &mut HashSet<CellKey>,
    ) -> bool {
        if in_stack.contains(cell) {
            return true;
        }
        if visited.contains(cell) {
            return false;
        }

        visited.insert(cell.clone());
        in_stack.insert(cell.clone());

        for precedent in self.formula_precedents(cell) {
            if self.detect_cycle(&precedent, visited, in_stack) {
                return true;
            }
        }

        in_stack.remove(cell);
        false
    }

    /// Clear the entire graph
    pub fn clear(&mut self) {
        self.dependents.clear();
        self.precedents.clear();
        self.range_precedents.clear();
    }
}

/// Flag every address node whose range contains the evaluated cell
///
/// Returns the number of nodes flagged. Compiling a flagged node either fails
/// with a circular-reference error or yields Empty, depending on
/// [`ParsingConfiguration::allow_circular_references`](crate::ParsingConfiguration).
pub fn flag_self_references(graph: &mut ExpressionGraph, scope: &EvaluationScope) -> usize {
    let mut flagged = 0;
    for id in graph.address_nodes() {
        let ExpressionKind::ExcelAddress(address) = graph.kind(id) else {
            continue;
        };
        let Ok(parsed) = RangeAddress::parse(&address.address) else {
            continue;
        };
        let same_sheet = parsed
            .worksheet_or(&scope.worksheet)
            .eq_ignore_ascii_case(&scope.worksheet);
        if same_sheet && parsed.range.contains(scope.row, scope.column) {
            graph.mark_circular(id);
            flagged += 1;
        }
    }
    flagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_add_dependency() {
        let mut graph = DependencyGraph::new();

        let a1 = CellKey::new("Sheet1", 0, 0);
        let b1 = CellKey::new("Sheet1", 0, 1);

        graph.add_dependency(a1.clone(), b1.clone());

        assert_eq!(graph.get_dependents(&a1), vec![b1.clone()]);
        assert!(graph.get_precedents(&b1).any(|c| *c == a1));
    }

    #[test]
    fn test_circular_reference() {
        let mut graph = DependencyGraph::new();

        let a1 = CellKey::new("Sheet1", 0, 0);
        let b1 = CellKey::new("Sheet1", 0, 1);
        let c1 = CellKey::new("Sheet1", 0, 2);

        // A1 -> B1 -> C1 -> A1 (circular)
        graph.add_dependency(a1.clone(), b1.clone());
        graph.add_dependency(b1.clone(), c1.clone());
        graph.add_dependency(c1.clone(), a1.clone());

        assert!(graph.has_circular_reference(&a1));
        assert!(graph.has_circular_reference(&b1));
        assert!(graph.has_circular_reference(&c1));
    }

    #[test]
    fn test_record_references_from_cache() {
        let mut cache = AddressCache::new();
        cache.add("Sheet1!A1");
        cache.add("'Other Sheet'!B1:B100");
        cache.add("not an address");

        let mut graph = DependencyGraph::new();
        let c1 = CellKey::new("Sheet1", 0, 2);
        assert_eq!(graph.record_references(&c1, &cache), 2);

        assert_eq!(graph.get_dependents(&CellKey::new("sheet1", 0, 0)), vec![c1.clone()]);
        assert_eq!(graph.get_dependents(&CellKey::new("Other Sheet", 50, 1)), vec![c1.clone()]);
        assert!(graph.get_dependents(&CellKey::new("Other Sheet", 50, 2)).is_empty());
    }

    #[test]
    fn test_cycle_through_range() {
        let mut graph = DependencyGraph::new();
        let a10 = CellKey::new("Sheet1", 9, 0);
        let b1 = CellKey::new("Sheet1", 0, 1);

        // A10 = SUM(A1:A20) reads itself
        graph.add_range_dependency(
            SheetRange {
                sheet: "SHEET1".into(),
                range: CellRange::parse("A1:A20").unwrap(),
            },
            a10.clone(),
        );
        assert!(graph.has_circular_reference(&a10));
        assert!(!graph.has_circular_reference(&b1));
    }

    #[test]
    fn test_recalc_order_precedents_first() {
        let mut graph = DependencyGraph::new();
        let a1 = CellKey::new("Sheet1", 0, 0);
        let b1 = CellKey::new("Sheet1", 0, 1);
        let c1 = CellKey::new("Sheet1", 0, 2);

        graph.add_dependency(a1.clone(), b1.clone());
        graph.add_dependency(b1.clone(), c1.clone());

        assert_eq!(graph.get_recalc_order(&[a1.clone()]), vec![a1, b1, c1]);
    }

    #[test]
    fn test_clear_dependencies() {
        let mut graph = DependencyGraph::new();
        let a1 = CellKey::new("Sheet1", 0, 0);
        let b1 = CellKey::new("Sheet1", 0, 1);
        graph.add_dependency(a1.clone(), b1.clone());
        graph.clear_dependencies(&b1);
        assert!(graph.get_dependents(&a1).is_empty());
    }
}
