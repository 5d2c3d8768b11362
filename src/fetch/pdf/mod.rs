// src/fetch/pdf/mod.rs
//! Fixed-layout table extraction from a static PDF report.

pub mod content;
pub mod font;
pub mod layout;

pub use content::TextRun;
pub use layout::{LayoutOptions, Region};

use anyhow::{anyhow, Context, Result};
use lopdf::{content::Content, Document};
use std::path::Path;
use tracing::{debug, instrument};

/// Cells of one table found on one page, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// 1-based page the table came from.
    pub page: u32,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

pub struct PdfReport {
    doc: Document,
}

impl PdfReport {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let doc = Document::load(path)
            .with_context(|| format!("Failed to open PDF: {}", path.display()))?;
        Ok(Self { doc })
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Positioned text of a 1-based page.
    pub fn page_runs(&self, page: u32) -> Result<Vec<TextRun>> {
        let page_id = *self
            .doc
            .get_pages()
            .get(&page)
            .ok_or_else(|| anyhow!("page {} out of range (1..={})", page, self.page_count()))?;
        let data = self
            .doc
            .get_page_content(page_id)
            .with_context(|| format!("reading content stream of page {}", page))?;
        let content = Content::decode(&data)
            .with_context(|| format!("decoding content stream of page {}", page))?;
        let fonts = font::page_fonts(&self.doc, page_id);
        Ok(content::text_runs(&content, &fonts))
    }

    /// Tables on `page`, restricted to `region` when given. A region with no
    /// text yields no table.
    #[instrument(level = "debug", skip(self, opts))]
    pub fn extract_tables(
        &self,
        page: u32,
        region: Option<Region>,
        opts: &LayoutOptions,
    ) -> Result<Vec<RawTable>> {
        let runs: Vec<TextRun> = self
            .page_runs(page)?
            .into_iter()
            .filter(|r| !r.text.trim().is_empty())
            .filter(|r| region.map(|reg| reg.contains(r.x, r.y)).unwrap_or(true))
            .collect();
        debug!(page, runs = runs.len(), "runs in region");

        let rows = layout::build_grid(&runs, opts);
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![RawTable { page, rows }])
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod testing {
    //! Builds small single-font PDFs for test fixtures.

    use anyhow::Result;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
    use std::path::Path;

    /// Offset between a character and its glyph id in [`write_cid_pdf`].
    pub const CID_OFFSET: u32 = 29;

    /// One page per entry; each entry lists `(x, y, text)` runs, shown in
    /// WinAnsi Helvetica at 10pt.
    pub fn write_pdf(path: &Path, pages: &[Vec<(i64, i64, &str)>]) -> Result<()> {
        let mut doc = Document::with_version("1.5");
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        save(doc, font_id, path, pages, |text| Object::string_literal(text))
    }

    /// Like [`write_pdf`] with a subset Type0 font under Identity-H: every
    /// ASCII character `c` is shown as the two-byte glyph id
    /// `c - CID_OFFSET` and mapped back through /ToUnicode. Glyphs are
    /// 600/1000 wide except `C`, which is 700.
    pub fn write_cid_pdf(path: &Path, pages: &[Vec<(i64, i64, &str)>]) -> Result<()> {
        let mut doc = Document::with_version("1.5");
        let first = 0x20 - CID_OFFSET;
        let last = 0x7E - CID_OFFSET;
        let cmap = format!(
            "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
             1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n\
             1 beginbfrange\n<{:04X}> <{:04X}> <0020>\nendbfrange\n\
             endcmap\nend\nend\n",
            first, last
        );
        let to_unicode = doc.add_object(Stream::new(dictionary! {}, cmap.into_bytes()));
        let c_glyph = i64::from('C' as u32 - CID_OFFSET);
        let cid_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => "ABCDEF+Arial",
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0,
            },
            "DW" => 600,
            "W" => vec![Object::Integer(c_glyph), vec![Object::Integer(700)].into()],
        });
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "ABCDEF+Arial",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Reference(cid_font)],
            "ToUnicode" => to_unicode,
        });
        save(doc, font_id, path, pages, |text| {
            let bytes = text
                .chars()
                .flat_map(|c| ((c as u32).saturating_sub(CID_OFFSET) as u16).to_be_bytes())
                .collect();
            Object::String(bytes, StringFormat::Hexadecimal)
        })
    }

    fn save(
        mut doc: Document,
        font_id: ObjectId,
        path: &Path,
        pages: &[Vec<(i64, i64, &str)>],
        encode: impl Fn(&str) -> Object,
    ) -> Result<()> {
        let pages_id = doc.new_object_id();
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for runs in pages {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 10.into()]),
            ];
            for (x, y, text) in runs {
                operations.push(Operation::new(
                    "Tm",
                    vec![1.into(), 0.into(), 0.into(), 1.into(), (*x).into(), (*y).into()],
                ));
                operations.push(Operation::new("Tj", vec![encode(*text)]));
            }
            operations.push(Operation::new("ET", vec![]));
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        let media_box: Vec<Object> = vec![0.into(), 0.into(), 595.into(), 842.into()];
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => media_box,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn region_limits_extracted_rows() -> Result<()> {
        let tmp = NamedTempFile::new()?;
        testing::write_pdf(
            tmp.path(),
            &[
                vec![(60, 800, "Header outside")],
                vec![
                    (60, 800, "Page heading"),
                    (60, 600, "Chile"),
                    (250, 600, "23 May 2006"),
                    (60, 580, "Peru"),
                    (250, 580, "1 June 2007"),
                ],
            ],
        )?;

        let report = PdfReport::open(tmp.path())?;
        assert_eq!(report.page_count(), 2);

        let region: Region = "50,615,550,50".parse()?;
        let tables = report.extract_tables(2, Some(region), &LayoutOptions::default())?;
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].page, 2);
        assert_eq!(
            tables[0].rows,
            vec![vec!["Chile", "23 May 2006"], vec!["Peru", "1 June 2007"]]
        );

        // whole page keeps the heading
        let all = report.extract_tables(2, None, &LayoutOptions::default())?;
        assert_eq!(all[0].rows.len(), 3);
        Ok(())
    }

    #[test]
    fn empty_region_yields_no_table() -> Result<()> {
        let tmp = NamedTempFile::new()?;
        testing::write_pdf(tmp.path(), &[vec![(60, 800, "Only heading")]])?;
        let report = PdfReport::open(tmp.path())?;
        let region: Region = "50,615,550,50".parse()?;
        assert!(report
            .extract_tables(1, Some(region), &LayoutOptions::default())?
            .is_empty());
        assert!(report.extract_tables(9, None, &LayoutOptions::default()).is_err());
        Ok(())
    }

    #[test]
    fn subset_fonts_decode_through_to_unicode() -> Result<()> {
        let tmp = NamedTempFile::new()?;
        testing::write_cid_pdf(tmp.path(), &[vec![(60, 600, "Chile"), (250, 600, "23 May 2006")]])?;
        let report = PdfReport::open(tmp.path())?;

        let runs = report.page_runs(1)?;
        assert_eq!(runs[0].text, "Chile");
        // C is 700/1000, the rest 600/1000, at 10pt
        assert!((runs[0].width - 31.0).abs() < 1e-3);

        let tables = report.extract_tables(1, None, &LayoutOptions::default())?;
        assert_eq!(tables[0].rows, vec![vec!["Chile", "23 May 2006"]]);
        Ok(())
    }

    #[test]
    fn unreadable_pdf_is_fatal() {
        assert!(PdfReport::open("/definitely/not/here.pdf").is_err());
    }
}
