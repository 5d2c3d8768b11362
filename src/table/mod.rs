// src/table/mod.rs
//! In-memory tabular model shared by every source.
//!
//! A [`Table`] is a header row plus rectangular rows of [`Cell`]s. The
//! normalisation steps (merging, filling, coercion) live in the `merge` and
//! `clean` submodules; `arrow` converts a finished table into a record batch.

pub mod arrow;
pub mod clean;
pub mod merge;

use anyhow::{anyhow, bail, Result};
use std::{cmp::Ordering, collections::BTreeSet, fmt};

/// A single table value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Cell {
    #[default]
    Empty,
    Int(i64),
    Text(String),
}

impl Cell {
    /// Text cell, or `Empty` when the trimmed text is blank.
    pub fn text(s: impl AsRef<str>) -> Self {
        let s = s.as_ref().trim();
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Cell::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<i32> for Cell {
    fn from(v: i32) -> Self {
        Cell::Int(v as i64)
    }
}

impl From<Option<i32>> for Cell {
    fn from(v: Option<i32>) -> Self {
        v.map(Cell::from).unwrap_or_default()
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::text(s)
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::text(s)
    }
}

impl From<Option<String>> for Cell {
    fn from(s: Option<String>) -> Self {
        s.map(Cell::text).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row; its width must match the header.
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            bail!(
                "row has {} cells but table has {} columns",
                row.len(),
                self.columns.len()
            );
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| anyhow!("missing column {:?} (have {:?})", name, self.columns))
    }

    /// Add a column filled with `Empty` if not present; returns its index.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(Cell::Empty);
        }
        self.columns.len() - 1
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    pub fn column(&self, name: &str) -> Result<Vec<&Cell>> {
        let idx = self.require_column(name)?;
        Ok(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Distinct non-empty values of a column.
    pub fn distinct_values(&self, name: &str) -> Result<BTreeSet<Cell>> {
        Ok(self
            .column(name)?
            .into_iter()
            .filter(|c| !c.is_empty())
            .cloned()
            .collect())
    }

    /// Stable sort by the given columns; `Empty` sorts first.
    pub fn sort_by(&mut self, columns: &[&str]) -> Result<()> {
        let idxs = columns
            .iter()
            .map(|c| self.require_column(c))
            .collect::<Result<Vec<_>>>()?;
        self.rows.sort_by(|a, b| {
            idxs.iter()
                .map(|&i| a[i].cmp(&b[i]))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        Ok(())
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&[Cell]) -> bool) {
        self.rows.retain(|r| keep(r));
    }

    /// New table restricted to `columns`, in that order.
    pub fn select(&self, columns: &[&str]) -> Result<Table> {
        let idxs = columns
            .iter()
            .map(|c| self.require_column(c))
            .collect::<Result<Vec<_>>>()?;
        Ok(Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| idxs.iter().map(|&i| r[i].clone()).collect())
                .collect(),
        })
    }

    /// Apply `f` to every cell of one column.
    pub fn map_column(&mut self, name: &str, mut f: impl FnMut(&Cell) -> Cell) -> Result<()> {
        let idx = self.require_column(name)?;
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
        Ok(())
    }

    /// Derive a new column (or overwrite an existing one) from whole rows.
    pub fn derive_column(&mut self, name: &str, mut f: impl FnMut(&[Cell]) -> Cell) {
        let idx = self.ensure_column(name);
        for row in &mut self.rows {
            row[idx] = f(row);
        }
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        let idx = self.require_column(from)?;
        self.columns[idx] = to.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut t = Table::new(["Country", "Year"]);
        t.push_row(vec!["Chile".into(), 2001.into()]).unwrap();
        t.push_row(vec!["Austria".into(), 1999.into()]).unwrap();
        t.push_row(vec!["Austria".into(), Cell::Empty]).unwrap();
        t
    }

    #[test]
    fn push_row_rejects_wrong_width() {
        let mut t = Table::new(["a", "b"]);
        assert!(t.push_row(vec![Cell::Empty]).is_err());
        assert!(t.is_empty());
    }

    #[test]
    fn blank_text_becomes_empty() {
        assert_eq!(Cell::text("   "), Cell::Empty);
        assert_eq!(Cell::text(" Tax "), Cell::Text("Tax".into()));
    }

    #[test]
    fn sort_by_multiple_columns() {
        let mut t = sample();
        t.sort_by(&["Country", "Year"]).unwrap();
        let years: Vec<String> = t.rows.iter().map(|r| r[1].to_string()).collect();
        assert_eq!(years, vec!["", "1999", "2001"]);
    }

    #[test]
    fn select_reorders_columns() {
        let t = sample().select(&["Year", "Country"]).unwrap();
        assert_eq!(t.columns, vec!["Year", "Country"]);
        assert_eq!(t.rows[0], vec![Cell::Int(2001), Cell::Text("Chile".into())]);
        assert!(sample().select(&["Nope"]).is_err());
    }

    #[test]
    fn ensure_column_pads_existing_rows() {
        let mut t = sample();
        let idx = t.ensure_column("Note");
        assert_eq!(idx, 2);
        assert!(t.rows.iter().all(|r| r.len() == 3 && r[2].is_empty()));
        assert_eq!(t.ensure_column("Note"), 2);
    }

    #[test]
    fn distinct_values_skip_empty() {
        let mut t = sample();
        t.push_row(vec![Cell::Empty, 1990.into()]).unwrap();
        let names = t.distinct_values("Country").unwrap();
        assert_eq!(names.len(), 2);
    }
}
