//! Accumulated query output.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use unicode_width::UnicodeWidthStr;

/// Column name → position in the source header.
pub type IndexMap = HashMap<String, usize>;

/// A projected row: selected column name → cell text as read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Row {
    cells: HashMap<String, String>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    pub fn insert(&mut self, column: impl Into<String>, text: impl Into<String>) {
        self.cells.insert(column.into(), text.into());
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            cells: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Per-column maximum rendered width, shared between the producer that
/// observes cells and whoever renders them.
#[derive(Debug, Clone, Default)]
pub struct Widths {
    inner: Arc<Mutex<HashMap<String, usize>>>,
}

impl Widths {
    /// Start every column at the width of its own name.
    pub fn for_columns<S: AsRef<str>>(columns: &[S]) -> Self {
        let map = columns
            .iter()
            .map(|c| (c.as_ref().to_string(), c.as_ref().width()))
            .collect();
        Self {
            inner: Arc::new(Mutex::new(map)),
        }
    }

    /// Widen `column` if `text` is wider than anything seen so far.
    pub fn observe(&self, column: &str, text: &str) {
        let width = text.width();
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match map.get_mut(column) {
            Some(current) if *current >= width => {}
            Some(current) => *current = width,
            None => {
                map.insert(column.to_string(), width);
            }
        }
    }

    pub fn get(&self, column: &str) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(column)
            .copied()
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> HashMap<String, usize> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Everything a presenter needs: selected columns, where they live in the
/// source, how wide they render, and the matching rows in file order.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Vec<String>,
    select_index: IndexMap,
    filter_index: IndexMap,
    widths: Widths,
    rows: Vec<Row>,
}

impl ResultSet {
    /// Resolve `columns` and `filter_fields` against `headers`. Names absent
    /// from the header are left out of the index maps.
    pub fn new(columns: &[String], filter_fields: &[&str], headers: &[String]) -> Self {
        let mut select_index = IndexMap::new();
        let mut filter_index = IndexMap::new();
        for (i, header) in headers.iter().enumerate() {
            if columns.contains(header) {
                select_index.entry(header.clone()).or_insert(i);
            }
            if filter_fields.contains(&header.as_str()) {
                filter_index.entry(header.clone()).or_insert(i);
            }
        }

        Self {
            columns: columns.to_vec(),
            select_index,
            filter_index,
            widths: Widths::for_columns(columns),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn select_index(&self) -> &IndexMap {
        &self.select_index
    }

    pub fn filter_index(&self) -> &IndexMap {
        &self.filter_index
    }

    /// Handle for the producer to record cell widths.
    pub fn widths(&self) -> &Widths {
        &self.widths
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<String> {
        ["iso_code", "continent", "location", "date", "total_cases", "new_cases"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_index_maps() {
        let columns = vec!["location".to_string(), "new_cases".to_string(), "date".to_string()];
        let rs = ResultSet::new(&columns, &["date", "location", "new_cases"], &headers());

        assert_eq!(rs.select_index().get("date"), Some(&3));
        assert_eq!(rs.select_index().get("location"), Some(&2));
        assert_eq!(rs.select_index().get("new_cases"), Some(&5));
        assert_eq!(rs.filter_index().len(), 3);
        assert_eq!(rs.columns(), columns.as_slice());
    }

    #[test]
    fn test_widths_start_at_header_and_grow() {
        let columns = vec!["location".to_string(), "date".to_string()];
        let rs = ResultSet::new(&columns, &[], &headers());
        assert_eq!(rs.widths().get("location"), 8);
        assert_eq!(rs.widths().get("date"), 4);

        rs.widths().observe("date", "2020-04-20");
        rs.widths().observe("location", "Russia");
        assert_eq!(rs.widths().get("date"), 10);
        assert_eq!(rs.widths().get("location"), 8);
    }

    #[test]
    fn test_widths_shared_between_clones() {
        let widths = Widths::for_columns(&["a"]);
        let producer = widths.clone();
        producer.observe("a", "wide value");
        assert_eq!(widths.get("a"), 10);
        assert_eq!(widths.snapshot().get("a"), Some(&10));
    }

    #[test]
    fn test_row_lookup() {
        let row: Row = [("location", "Russia"), ("date", "2020-04-20")]
            .into_iter()
            .collect();
        assert_eq!(row.get("location"), Some("Russia"));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.len(), 2);
    }
}
