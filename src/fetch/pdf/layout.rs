// src/fetch/pdf/layout.rs
//! Stream-style table detection: text runs inside a region are grouped into
//! lines by baseline and into columns by the vertical gutters between them.
//! Lines that continue a wrapped cell are folded into the row above.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{fmt, str::FromStr};

use super::content::TextRun;

/// Rectangle in page space: `(x1, y1)` top-left, `(x2, y2)` bottom-right,
/// y growing upwards. Parses from and prints as `"x1,y1,x2,y2"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Region {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        let (left, right) = (self.x1.min(self.x2), self.x1.max(self.x2));
        let (bottom, top) = (self.y1.min(self.y2), self.y1.max(self.y2));
        (left..=right).contains(&x) && (bottom..=top).contains(&y)
    }
}

impl FromStr for Region {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<f32>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("region {:?} is not four numbers", s))?;
        let &[x1, y1, x2, y2] = parts.as_slice() else {
            bail!("region {:?} must have exactly four coordinates", s);
        };
        Ok(Region { x1, y1, x2, y2 })
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x1, self.y1, self.x2, self.y2)
    }
}

impl<'de> Deserialize<'de> for Region {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    /// Runs whose baselines differ by at most this much share a row.
    pub row_tol: f32,
    /// Minimum horizontal whitespace that separates two columns.
    pub col_gap: f32,
    /// Explicit column separators (x positions); disables gutter detection.
    pub columns: Option<Vec<f32>>,
    /// A line whose baseline is within this many font sizes of the line
    /// above continues that line's cells. Zero keeps every line a row.
    pub wrap_leading: f32,
    /// Columns that are blank on a continuation line. A line with text in
    /// any of them starts a new row however close it sits.
    pub key_columns: Vec<usize>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            row_tol: 2.0,
            col_gap: 8.0,
            columns: None,
            wrap_leading: 1.25,
            key_columns: Vec::new(),
        }
    }
}

/// Group runs into rows, top to bottom, each row sorted left to right.
pub fn group_rows(runs: &[TextRun], row_tol: f32) -> Vec<Vec<TextRun>> {
    let mut sorted: Vec<TextRun> = runs.to_vec();
    sorted.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut rows: Vec<Vec<TextRun>> = Vec::new();
    let mut row_y = f32::NAN;
    for run in sorted {
        if rows.is_empty() || (row_y - run.y).abs() > row_tol {
            row_y = run.y;
            rows.push(Vec::new());
        }
        if let Some(row) = rows.last_mut() {
            row.push(run);
        }
    }
    for row in &mut rows {
        row.sort_by(|a, b| a.x.total_cmp(&b.x));
    }
    rows
}

/// Column separators from the gaps in the union of all runs' x-extents.
pub fn detect_separators(runs: &[TextRun], col_gap: f32) -> Vec<f32> {
    let mut spans: Vec<(f32, f32)> = runs.iter().map(|r| (r.x, r.x_end())).collect();
    spans.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut separators = Vec::new();
    let mut covered_to = f32::NEG_INFINITY;
    for (start, end) in spans {
        if covered_to.is_finite() && start - covered_to >= col_gap {
            separators.push((covered_to + start) / 2.0);
        }
        covered_to = covered_to.max(end);
    }
    separators
}

fn place(row: &[TextRun], separators: &[f32]) -> Vec<String> {
    let mut cells = vec![String::new(); separators.len() + 1];
    for run in row {
        let col = separators.iter().take_while(|&&s| run.x >= s).count();
        let cell = &mut cells[col];
        if !cell.is_empty() {
            cell.push(' ');
        }
        cell.push_str(run.text.trim());
    }
    cells
}

/// Lay the runs out as a grid of cell strings. Continuation lines are
/// appended to the cells above, separated by `\n`.
pub fn build_grid(runs: &[TextRun], opts: &LayoutOptions) -> Vec<Vec<String>> {
    if runs.is_empty() {
        return Vec::new();
    }
    let separators = match &opts.columns {
        Some(cols) => {
            let mut cols = cols.clone();
            cols.sort_by(|a, b| a.total_cmp(b));
            cols
        }
        None => detect_separators(runs, opts.col_gap),
    };

    let mut grid: Vec<Vec<String>> = Vec::new();
    // baseline and font size of the previous line
    let mut prev: Option<(f32, f32)> = None;
    for line in group_rows(runs, opts.row_tol) {
        let baseline = line.iter().map(|r| r.y).fold(f32::NEG_INFINITY, f32::max);
        let size = line.iter().map(|r| r.size).fold(0.0, f32::max);
        let cells = place(&line, &separators);

        let continues = prev.is_some_and(|(y, s)| {
            opts.wrap_leading > 0.0 && y - baseline <= opts.wrap_leading * s.max(size)
        }) && opts
            .key_columns
            .iter()
            .all(|&c| cells.get(c).map_or(true, String::is_empty));

        match grid.last_mut() {
            Some(row) if continues => {
                for (cell, more) in row.iter_mut().zip(cells) {
                    if more.is_empty() {
                        continue;
                    }
                    if !cell.is_empty() {
                        cell.push('\n');
                    }
                    cell.push_str(&more);
                }
            }
            _ => grid.push(cells),
        }
        prev = Some((baseline, size));
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(x: f32, y: f32, text: &str) -> TextRun {
        TextRun {
            x,
            y,
            width: text.len() as f32 * 5.0,
            size: 10.0,
            text: text.to_string(),
        }
    }

    #[test]
    fn region_parses_camelot_form() -> Result<()> {
        let r: Region = "50,615,550,50".parse()?;
        assert_eq!(r, Region { x1: 50.0, y1: 615.0, x2: 550.0, y2: 50.0 });
        assert!(r.contains(60.0, 600.0));
        assert!(!r.contains(60.0, 700.0));
        assert!(!r.contains(20.0, 600.0));
        assert_eq!(r.to_string(), "50,615,550,50");
        assert!("1,2,3".parse::<Region>().is_err());
        assert!("a,b,c,d".parse::<Region>().is_err());
        Ok(())
    }

    #[test]
    fn rows_cluster_by_baseline() {
        let runs = vec![
            run(200.0, 699.0, "23 May 2006"),
            run(60.0, 700.0, "Chile"),
            run(60.0, 680.0, "Peru"),
        ];
        let rows = group_rows(&runs, 2.0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0].text, "Chile");
        assert_eq!(rows[0][1].text, "23 May 2006");
    }

    #[test]
    fn gutters_split_columns_and_words_stay_together() {
        // word-level runs: "Antigua and Barbuda" is three runs in one cell
        let runs = vec![
            run(60.0, 700.0, "Antigua"),
            run(100.0, 700.0, "and"),
            run(120.0, 700.0, "Barbuda"),
            run(250.0, 700.0, "1 June 2006"),
            run(400.0, 700.0, "1 Sept 2006"),
            run(60.0, 680.0, "Chile"),
            run(250.0, 680.0, "10 Oct 2006"),
        ];
        let grid = build_grid(&runs, &LayoutOptions::default());
        assert_eq!(
            grid,
            vec![
                vec!["Antigua and Barbuda", "1 June 2006", "1 Sept 2006"],
                vec!["Chile", "10 Oct 2006", ""],
            ]
        );
    }

    #[test]
    fn wrapped_cells_fold_into_their_row() {
        let runs = vec![
            run(60.0, 600.0, "Antigua and"),
            run(250.0, 600.0, "1 June 2006"),
            run(400.0, 600.0, "1 Sept 2006"),
            run(60.0, 589.0, "Barbuda"),
            run(60.0, 570.0, "Peru"),
            run(250.0, 570.0, "10 Oct 2006"),
            run(400.0, 570.0, "10 Jan 2007"),
        ];
        let opts = LayoutOptions {
            key_columns: vec![1, 2],
            ..LayoutOptions::default()
        };
        assert_eq!(
            build_grid(&runs, &opts),
            vec![
                vec!["Antigua and\nBarbuda", "1 June 2006", "1 Sept 2006"],
                vec!["Peru", "10 Oct 2006", "10 Jan 2007"],
            ]
        );

        // a close line with a date is its own row
        let tight = vec![
            run(60.0, 600.0, "Chile"),
            run(250.0, 600.0, "2006"),
            run(60.0, 590.0, "Peru"),
            run(250.0, 590.0, "2007"),
        ];
        assert_eq!(build_grid(&tight, &opts).len(), 2);

        // merging off
        let off = LayoutOptions {
            wrap_leading: 0.0,
            ..opts
        };
        assert_eq!(build_grid(&runs, &off).len(), 3);
    }

    #[test]
    fn explicit_columns_override_detection() {
        let runs = vec![run(60.0, 700.0, "a"), run(70.0, 700.0, "b")];
        let opts = LayoutOptions {
            columns: Some(vec![65.0]),
            ..LayoutOptions::default()
        };
        assert_eq!(build_grid(&runs, &opts), vec![vec!["a", "b"]]);
    }
}
