// src/export/csv.rs
use anyhow::{Context, Result};
use std::{fs, path::Path};
use tracing::info;

use crate::table::Table;

/// Header row plus one record per table row; `Empty` cells are blank.
pub fn write(path: impl AsRef<Path>, table: &Table) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut wtr = ::csv::Writer::from_path(path)
        .with_context(|| format!("creating CSV {}", path.display()))?;
    wtr.write_record(&table.columns)?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(|c| c.to_string()))?;
    }
    wtr.flush()?;
    info!(path = %path.display(), rows = table.len(), "CSV written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;
    use tempfile::tempdir;

    #[test]
    fn writes_header_and_blank_cells() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("drr.csv");
        let mut t = Table::new(["Country", "Year", "e1a1"]);
        t.push_row(vec!["Chile, Republic of".into(), 2015.into(), Cell::Empty])?;
        write(&path, &t)?;

        let text = fs::read_to_string(&path)?;
        assert_eq!(text, "Country,Year,e1a1\n\"Chile, Republic of\",2015,\n");
        Ok(())
    }
}
