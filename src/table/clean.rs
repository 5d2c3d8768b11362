// src/table/clean.rs
use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{Cell, Table};

static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r" +").expect("valid regex"));
static HYPHEN_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"-[ \t]*[\r\n]+\s*").expect("valid regex"));
static LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*[\r\n]+\s*").expect("valid regex"));

/// Join wrapped lines (a line ending in `-` joins without a space),
/// collapse repeated spaces, trim.
pub fn clean_str(raw: &str) -> String {
    let joined = HYPHEN_BREAK.replace_all(raw, "-");
    let joined = LINE_BREAK.replace_all(&joined, " ");
    SPACES.replace_all(&joined, " ").trim().to_string()
}

impl Table {
    /// Run [`clean_str`] over every text cell; blanks become `Empty`.
    pub fn clean_text(&mut self) {
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                if let Cell::Text(s) = cell {
                    *cell = Cell::text(clean_str(s));
                }
            }
        }
    }

    /// Carry the last non-empty value of `column` down over empty cells.
    /// Leading empties stay empty.
    pub fn forward_fill(&mut self, column: &str) -> Result<()> {
        let idx = self.require_column(column)?;
        let mut last = Cell::Empty;
        for row in &mut self.rows {
            if row[idx].is_empty() {
                row[idx] = last.clone();
            } else {
                last = row[idx].clone();
            }
        }
        Ok(())
    }

    /// Coerce a column to integer years; unparsable values become `Empty`.
    pub fn coerce_year(&mut self, column: &str) -> Result<()> {
        self.map_column(column, |cell| match cell {
            Cell::Int(v) => Cell::Int(*v),
            Cell::Text(s) => s.trim().parse::<i64>().map(Cell::Int).unwrap_or_default(),
            Cell::Empty => Cell::Empty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(column: &str, values: &[&str]) -> Table {
        let mut t = Table::new([column]);
        for v in values {
            t.push_row(vec![Cell::text(v)]).unwrap();
        }
        t
    }

    #[test]
    fn forward_fill_carries_category() {
        let mut t = single("Instrument", &["Tax", "", "", "Fee", ""]);
        t.forward_fill("Instrument").unwrap();
        let got: Vec<String> = t.rows.iter().map(|r| r[0].to_string()).collect();
        assert_eq!(got, vec!["Tax", "Tax", "Tax", "Fee", "Fee"]);
    }

    #[test]
    fn forward_fill_leaves_leading_blanks() {
        let mut t = single("Instrument", &["", "Tax"]);
        t.forward_fill("Instrument").unwrap();
        assert_eq!(t.rows[0][0], Cell::Empty);
    }

    #[test]
    fn coerce_year_marks_failures_absent() {
        let mut t = single("Year", &["2015", " 2016 ", "n/a", ""]);
        t.coerce_year("Year").unwrap();
        let got: Vec<Cell> = t.rows.into_iter().map(|mut r| r.remove(0)).collect();
        assert_eq!(
            got,
            vec![Cell::Int(2015), Cell::Int(2016), Cell::Empty, Cell::Empty]
        );
    }

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_str("Betterment\n  levy  "), "Betterment levy");
        assert_eq!(clean_str("Law 1234\nof 1995"), "Law 1234 of 1995");
        assert_eq!(clean_str("Instrument (OECD-\nLincoln taxonomy)"), "Instrument (OECD-Lincoln taxonomy)");
        let mut t = single("x", &["a\n"]);
        t.rows.push(vec![Cell::Text("\n".into())]);
        t.clean_text();
        assert_eq!(t.rows[0][0], Cell::Text("a".into()));
        assert_eq!(t.rows[1][0], Cell::Empty);
    }
}
