// src/table/merge.rs
use anyhow::{bail, Result};
use std::collections::HashMap;

use super::{Cell, Table};

/// One hand-curated record: entity key plus column → value overrides.
#[derive(Debug, Clone)]
pub struct ManualRecord {
    pub key: Cell,
    pub values: Vec<(String, Cell)>,
}

impl ManualRecord {
    pub fn new(key: impl Into<Cell>) -> Self {
        Self {
            key: key.into(),
            values: Vec::new(),
        }
    }

    pub fn with(mut self, column: &str, value: impl Into<Cell>) -> Self {
        self.values.push((column.to_string(), value.into()));
        self
    }
}

impl Table {
    /// Key-preserving outer merge on `keys`.
    ///
    /// Output columns are `self`'s columns followed by `other`'s non-key
    /// columns. Left rows keep their order; right rows without a left match
    /// are appended in their own order. Duplicate keys on both sides produce
    /// their cross product, exactly like a relational outer join.
    pub fn outer_join(&self, other: &Table, keys: &[&str]) -> Result<Table> {
        let left_keys = keys
            .iter()
            .map(|k| self.require_column(k))
            .collect::<Result<Vec<_>>>()?;
        let right_keys = keys
            .iter()
            .map(|k| other.require_column(k))
            .collect::<Result<Vec<_>>>()?;

        let right_extra: Vec<usize> = (0..other.columns.len())
            .filter(|i| !right_keys.contains(i))
            .collect();
        for &i in &right_extra {
            if self.column_index(&other.columns[i]).is_some() {
                bail!(
                    "outer join: column {:?} present on both sides",
                    other.columns[i]
                );
            }
        }

        let mut columns = self.columns.clone();
        columns.extend(right_extra.iter().map(|&i| other.columns[i].clone()));

        // 1) index right rows by key
        let mut by_key: HashMap<Vec<Cell>, Vec<usize>> = HashMap::new();
        for (ri, row) in other.rows.iter().enumerate() {
            let key: Vec<Cell> = right_keys.iter().map(|&i| row[i].clone()).collect();
            by_key.entry(key).or_default().push(ri);
        }

        // 2) walk left rows, pairing with matches
        let mut matched = vec![false; other.rows.len()];
        let mut rows = Vec::with_capacity(self.rows.len().max(other.rows.len()));
        for lrow in &self.rows {
            let key: Vec<Cell> = left_keys.iter().map(|&i| lrow[i].clone()).collect();
            match by_key.get(&key) {
                Some(hits) => {
                    for &ri in hits {
                        matched[ri] = true;
                        let mut row = lrow.clone();
                        row.extend(right_extra.iter().map(|&i| other.rows[ri][i].clone()));
                        rows.push(row);
                    }
                }
                None => {
                    let mut row = lrow.clone();
                    row.extend(std::iter::repeat(Cell::Empty).take(right_extra.len()));
                    rows.push(row);
                }
            }
        }

        // 3) right-only rows
        for (ri, rrow) in other.rows.iter().enumerate() {
            if matched[ri] {
                continue;
            }
            let mut row = vec![Cell::Empty; columns.len()];
            for (k, &li) in left_keys.iter().enumerate() {
                row[li] = rrow[right_keys[k]].clone();
            }
            for (offset, &i) in right_extra.iter().enumerate() {
                row[self.columns.len() + offset] = rrow[i].clone();
            }
            rows.push(row);
        }

        Ok(Table { columns, rows })
    }

    /// Stack tables vertically. Columns are the union in first-seen order;
    /// cells missing from a source table are `Empty`.
    pub fn concat<'a>(tables: impl IntoIterator<Item = &'a Table>) -> Table {
        let tables: Vec<&Table> = tables.into_iter().collect();
        let mut out = Table::default();
        for t in &tables {
            for c in &t.columns {
                if out.column_index(c).is_none() {
                    out.columns.push(c.clone());
                }
            }
        }
        for t in tables {
            let positions: Vec<usize> = t
                .columns
                .iter()
                .filter_map(|c| out.column_index(c))
                .collect();
            for src in &t.rows {
                let mut row = vec![Cell::Empty; out.columns.len()];
                for (cell, &pos) in src.iter().zip(&positions) {
                    row[pos] = cell.clone();
                }
                out.rows.push(row);
            }
        }
        out
    }

    /// Merge hand-curated records by `key_column`: matching rows get the
    /// record's values written over them, unknown keys are appended.
    /// Columns named by a record but absent from the table are added.
    pub fn upsert(&mut self, key_column: &str, records: &[ManualRecord]) -> Result<()> {
        let key_idx = self.require_column(key_column)?;
        for rec in records {
            let targets: Vec<(usize, Cell)> = rec
                .values
                .iter()
                .map(|(c, v)| (self.ensure_column(c), v.clone()))
                .collect();

            let mut hit = false;
            for row in self.rows.iter_mut().filter(|r| r[key_idx] == rec.key) {
                hit = true;
                for (idx, value) in &targets {
                    row[*idx] = value.clone();
                }
            }
            if !hit {
                let mut row = vec![Cell::Empty; self.columns.len()];
                row[key_idx] = rec.key.clone();
                for (idx, value) in targets {
                    row[idx] = value;
                }
                self.rows.push(row);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial(field: &str, rows: &[(&str, i64, &str)]) -> Table {
        let mut t = Table::new(["Country", "Year", field]);
        for (c, y, v) in rows {
            t.push_row(vec![(*c).into(), Cell::Int(*y), (*v).into()])
                .unwrap();
        }
        t
    }

    #[test]
    fn outer_join_shared_keys_has_no_duplicates() {
        let a = partial("e1a1", &[("Chile", 2015, "Yes"), ("Chile", 2016, "No")]);
        let b = partial("e1a2", &[("Chile", 2015, "No"), ("Chile", 2016, "Yes")]);
        let j = a.outer_join(&b, &["Country", "Year"]).unwrap();
        assert_eq!(j.columns, vec!["Country", "Year", "e1a1", "e1a2"]);
        assert_eq!(j.len(), 2);
        assert_eq!(j.get(1, "e1a2"), Some(&Cell::Text("Yes".into())));
    }

    #[test]
    fn outer_join_keeps_keys_from_either_side() {
        let a = partial("e1a1", &[("Chile", 2015, "Yes")]);
        let b = partial("e1a2", &[("Chile", 2016, "No")]);
        let j = a.outer_join(&b, &["Country", "Year"]).unwrap();
        assert_eq!(j.len(), 2);
        assert_eq!(j.get(0, "e1a1"), Some(&Cell::Text("Yes".into())));
        assert_eq!(j.get(0, "e1a2"), Some(&Cell::Empty));
        assert_eq!(j.get(1, "Year"), Some(&Cell::Int(2016)));
        assert_eq!(j.get(1, "e1a1"), Some(&Cell::Empty));
        assert_eq!(j.get(1, "e1a2"), Some(&Cell::Text("No".into())));
    }

    #[test]
    fn outer_join_rejects_overlapping_value_columns() {
        let a = partial("v", &[("Chile", 2015, "Yes")]);
        let b = partial("v", &[("Chile", 2015, "No")]);
        assert!(a.outer_join(&b, &["Country", "Year"]).is_err());
    }

    #[test]
    fn concat_unions_columns() {
        let a = partial("e1a1", &[("Chile", 2015, "Yes")]);
        let b = partial("e1a2", &[("Peru", 2015, "No")]);
        let c = Table::concat([&a, &b]);
        assert_eq!(c.columns, vec!["Country", "Year", "e1a1", "e1a2"]);
        assert_eq!(c.rows[1], vec!["Peru".into(), Cell::Int(2015), Cell::Empty, "No".into()]);
    }

    #[test]
    fn upsert_overwrites_and_appends() {
        let mut t = Table::new(["Country", "date_sign"]);
        t.push_row(vec!["France".into(), 1994.into()]).unwrap();
        let records = vec![
            ManualRecord::new("France").with("date_withdrawal_effect", 2023),
            ManualRecord::new("Spain")
                .with("date_withdrawal_notification", 2024)
                .with("date_withdrawal_effect", 2025),
        ];
        t.upsert("Country", &records).unwrap();

        assert_eq!(
            t.columns,
            vec!["Country", "date_sign", "date_withdrawal_effect", "date_withdrawal_notification"]
        );
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(0, "date_sign"), Some(&Cell::Int(1994)));
        assert_eq!(t.get(0, "date_withdrawal_effect"), Some(&Cell::Int(2023)));
        assert_eq!(t.get(1, "Country"), Some(&Cell::Text("Spain".into())));
        assert_eq!(t.get(1, "date_sign"), Some(&Cell::Empty));
    }
}
