//! Per-page result selection and deterministic document assembly.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::models::PageResult;

/// Separator between selected pages in the combined document.
pub const PAGE_SEPARATOR: &str = "\n\n---\n\n";

/// The user's per-page choice of backend.
///
/// Keyed by 0-based page index; at most one entry per page. Mutated only
/// by explicit caller action, never by the aggregator.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    picks: BTreeMap<usize, usize>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose a backend for a page, replacing any previous choice.
    pub fn select(&mut self, page: usize, backend: usize) {
        self.picks.insert(page, backend);
    }

    pub fn clear(&mut self, page: usize) {
        self.picks.remove(&page);
    }

    pub fn get(&self, page: usize) -> Option<usize> {
        self.picks.get(&page).copied()
    }

    pub fn len(&self) -> usize {
        self.picks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }

    /// Picks in ascending numeric page order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.picks.iter().map(|(&page, &backend)| (page, backend))
    }
}

/// Result of combining the current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombineOutcome {
    /// Nothing selected; the caller decides how to surface this.
    NoSelection,
    Document(String),
}

/// Assemble the selected results into one document.
///
/// Pages are emitted in ascending numeric page order regardless of
/// selection insertion order. A pick whose result does not exist
/// contributes nothing rather than failing the operation.
pub fn combine(selection: &Selection, results: &[PageResult]) -> CombineOutcome {
    if selection.is_empty() {
        return CombineOutcome::NoSelection;
    }

    let contents: Vec<&str> = selection
        .iter()
        .filter_map(|(page, backend)| {
            results
                .iter()
                .find(|r| r.page == page && r.backend == backend)
                .map(|r| r.content.as_str())
        })
        .collect();

    CombineOutcome::Document(contents.join(PAGE_SEPARATOR))
}

/// Default export filename: `ocr-result-<ISO date>.md`.
pub fn export_filename(date: NaiveDate) -> String {
    format!("ocr-result-{}.md", date.format("%Y-%m-%d"))
}

/// Write the combined document to `path`, or to the date-stamped default
/// name in the current directory. Returns the path written.
pub fn write_export(content: &str, path: Option<&Path>) -> std::io::Result<PathBuf> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(export_filename(chrono::Local::now().date_naive())),
    };
    let mut file = std::fs::File::create(&path)?;
    file.write_all(content.as_bytes())?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(page: usize, backend: usize, content: &str) -> PageResult {
        PageResult {
            page,
            backend,
            content: content.to_string(),
            confidence: None,
            processing_time_ms: None,
        }
    }

    #[test]
    fn test_combine_joins_with_separator() {
        let results = vec![result(0, 0, "first page"), result(1, 0, "second page")];
        let mut selection = Selection::new();
        selection.select(0, 0);
        selection.select(1, 0);
        assert_eq!(
            combine(&selection, &results),
            CombineOutcome::Document("first page\n\n---\n\nsecond page".to_string())
        );
    }

    #[test]
    fn test_combine_orders_numerically_not_by_insertion() {
        // Pages 2, 10, 1 selected out of order; output must be 1, 2, 10.
        let results = vec![
            result(1, 0, "page two"),
            result(9, 0, "page ten"),
            result(0, 0, "page one"),
        ];
        let mut selection = Selection::new();
        selection.select(9, 0);
        selection.select(1, 0);
        selection.select(0, 0);
        assert_eq!(
            combine(&selection, &results),
            CombineOutcome::Document(
                "page one\n\n---\n\npage two\n\n---\n\npage ten".to_string()
            )
        );
    }

    #[test]
    fn test_combine_empty_selection_signals_caller() {
        let results = vec![result(0, 0, "content")];
        assert_eq!(combine(&Selection::new(), &results), CombineOutcome::NoSelection);
    }

    #[test]
    fn test_combine_skips_dangling_picks() {
        let results = vec![result(0, 0, "real")];
        let mut selection = Selection::new();
        selection.select(0, 0);
        selection.select(5, 2); // no such result
        assert_eq!(
            combine(&selection, &results),
            CombineOutcome::Document("real".to_string())
        );
    }

    #[test]
    fn test_combine_partial_selection_is_fine() {
        let results = vec![
            result(0, 0, "a"),
            result(1, 0, "b"),
            result(2, 0, "c"),
        ];
        let mut selection = Selection::new();
        selection.select(2, 0);
        assert_eq!(
            combine(&selection, &results),
            CombineOutcome::Document("c".to_string())
        );
    }

    #[test]
    fn test_selection_upserts() {
        let mut selection = Selection::new();
        selection.select(0, 0);
        selection.select(0, 3);
        assert_eq!(selection.get(0), Some(3));
        assert_eq!(selection.len(), 1);
        selection.clear(0);
        assert!(selection.is_empty());
    }

    #[test]
    fn test_export_filename_is_date_stamped() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        assert_eq!(export_filename(date), "ocr-result-2026-08-06.md");
    }

    #[test]
    fn test_write_export_to_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.md");
        let written = write_export("combined", Some(&path)).unwrap();
        assert_eq!(written, path);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "combined");
    }
}
