// src/export/xlsx.rs
use anyhow::{bail, Context, Result};
use rust_xlsxwriter::{Format, FormatAlign, Workbook as XlsxWorkbook, Worksheet};
use std::{fs, path::Path};
use tracing::{info, instrument};

use super::{ReadmeLine, Sheet, Workbook};
use crate::table::{Cell, Table};

const README_WIDTH: f64 = 110.0;

/// Write `workbook` to `path`, replacing any existing file.
///
/// The workbook must carry at least one data sheet and a readme with text.
/// The write is not atomic: a failure part-way leaves whatever was written.
#[instrument(level = "info", skip(path, workbook), fields(path = %path.as_ref().display()))]
pub fn write(path: impl AsRef<Path>, workbook: &Workbook) -> Result<()> {
    let path = path.as_ref();
    if workbook.data_sheets().next().is_none() {
        bail!("workbook for {} has no data sheet", path.display());
    }
    if !workbook.has_readme() {
        bail!("workbook for {} has no readme text", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {:?}", parent))?;
    }

    let header = Format::new().set_bold();
    let wrap = Format::new().set_text_wrap().set_align(FormatAlign::Top);

    let mut book = XlsxWorkbook::new();
    for sheet in &workbook.sheets {
        let ws = book.add_worksheet();
        ws.set_name(sheet.name())
            .with_context(|| format!("naming sheet {:?}", sheet.name()))?;
        match sheet {
            Sheet::Data { table, .. } => write_table(ws, table, &header)?,
            Sheet::Readme { lines, .. } => write_readme(ws, lines, &wrap)?,
        }
    }
    book.save(path)
        .with_context(|| format!("saving workbook {}", path.display()))?;

    info!(sheets = workbook.sheets.len(), "workbook written");
    Ok(())
}

fn write_table(ws: &mut Worksheet, table: &Table, header: &Format) -> Result<()> {
    for (c, name) in table.columns.iter().enumerate() {
        ws.write_string_with_format(0, c as u16, name, header)?;
    }
    for (r, row) in table.rows.iter().enumerate() {
        let r = r as u32 + 1;
        for (c, cell) in row.iter().enumerate() {
            let c = c as u16;
            match cell {
                Cell::Empty => {}
                Cell::Int(v) => {
                    ws.write_number(r, c, *v as f64)?;
                }
                Cell::Text(s) => {
                    ws.write_string(r, c, s)?;
                }
            }
        }
    }
    ws.set_freeze_panes(1, 0)?;
    Ok(())
}

fn write_readme(ws: &mut Worksheet, lines: &[ReadmeLine], wrap: &Format) -> Result<()> {
    ws.set_column_width(0, README_WIDTH)?;
    for (r, line) in lines.iter().enumerate() {
        let r = r as u32;
        match line {
            ReadmeLine::Text(s) => {
                ws.write_string_with_format(r, 0, s, wrap)?;
            }
            ReadmeLine::Link(url) => {
                ws.write_url(r, 0, url.as_str())?;
            }
        }
    }
    Ok(())
}
