// src/export/mod.rs
//! Output artifacts: a multi-sheet workbook (data + readme), plus optional
//! CSV and Parquet copies of the main data table.

pub mod csv;
pub mod parquet;
pub mod xlsx;

use crate::table::Table;

/// One line of a readme sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadmeLine {
    Text(String),
    /// Rendered as a clickable link whose label is the target itself.
    Link(String),
}

impl ReadmeLine {
    pub fn text(&self) -> &str {
        match self {
            ReadmeLine::Text(s) | ReadmeLine::Link(s) => s,
        }
    }
}

/// Build readme lines from plain text; lines that are URLs become links.
pub fn readme_lines<S: AsRef<str>>(lines: impl IntoIterator<Item = S>) -> Vec<ReadmeLine> {
    lines
        .into_iter()
        .map(|l| {
            let l = l.as_ref();
            let t = l.trim();
            if (t.starts_with("https://") || t.starts_with("http://")) && !t.contains(' ') {
                ReadmeLine::Link(t.to_string())
            } else {
                ReadmeLine::Text(l.to_string())
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub enum Sheet {
    Data { name: String, table: Table },
    Readme { name: String, lines: Vec<ReadmeLine> },
}

impl Sheet {
    pub fn data(name: &str, table: Table) -> Self {
        Sheet::Data {
            name: name.to_string(),
            table,
        }
    }

    pub fn readme(name: &str, lines: Vec<ReadmeLine>) -> Self {
        Sheet::Readme {
            name: name.to_string(),
            lines,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Sheet::Data { name, .. } | Sheet::Readme { name, .. } => name,
        }
    }
}

/// Sheets in the order they appear in the file.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(mut self, sheet: Sheet) -> Self {
        self.sheets.push(sheet);
        self
    }

    pub fn data_sheets(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.sheets.iter().filter_map(|s| match s {
            Sheet::Data { name, table } => Some((name.as_str(), table)),
            _ => None,
        })
    }

    /// Whether some readme sheet has at least one non-blank line.
    pub fn has_readme(&self) -> bool {
        self.sheets.iter().any(|s| match s {
            Sheet::Readme { lines, .. } => lines.iter().any(|l| !l.text().trim().is_empty()),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_lines_become_links() {
        let lines = readme_lines([
            "Data source:",
            "https://www.energychartertreaty.org/treaty/",
            "see https://example.org for details",
        ]);
        assert_eq!(lines[0], ReadmeLine::Text("Data source:".into()));
        assert_eq!(
            lines[1],
            ReadmeLine::Link("https://www.energychartertreaty.org/treaty/".into())
        );
        assert!(matches!(lines[2], ReadmeLine::Text(_)));
    }

    #[test]
    fn readme_must_have_text() {
        let wb = Workbook::new()
            .with_sheet(Sheet::data("Data", Table::new(["Country"])))
            .with_sheet(Sheet::readme("Readme", readme_lines(["  "])));
        assert!(!wb.has_readme());
        assert_eq!(wb.data_sheets().count(), 1);
    }
}
