// src/fetch/pdf/font.rs
//! Page fonts: character codes to text through /ToUnicode or /Encoding,
//! and glyph advances from /Widths or the CID /W array.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::collections::HashMap;
use tracing::debug;

/// Advance, in thousandths of text space, for fonts that carry no metrics.
pub const DEFAULT_WIDTH: f32 = 500.0;

/// Fonts of one page keyed by resource name (`F1`).
pub type Fonts = HashMap<Vec<u8>, Font>;

/// One shown character code.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub text: String,
    /// Advance in thousandths of text space.
    pub width: f32,
    /// Single-byte code 32; word spacing applies to it.
    pub is_space: bool,
}

#[derive(Debug, Clone)]
enum Fallback {
    /// Simple fonts: one string per byte from /Encoding and /Differences.
    Table(Vec<String>),
    /// Two-byte codes that are UCS-2 code points (`Uni*-UCS2-H`).
    Ucs2,
    /// CID fonts without a ToUnicode map.
    Unmapped,
}

#[derive(Debug, Clone)]
pub struct Font {
    /// Bytes per character code.
    code_len: usize,
    to_unicode: HashMap<u32, String>,
    fallback: Fallback,
    widths: HashMap<u32, f32>,
    default_width: f32,
}

impl Default for Font {
    /// Single-byte WinAnsi text with [`DEFAULT_WIDTH`] advances; used when
    /// `Tf` names a font the page does not define.
    fn default() -> Self {
        Self {
            code_len: 1,
            to_unicode: HashMap::new(),
            fallback: Fallback::Table(encoding_table("WinAnsiEncoding")),
            widths: HashMap::new(),
            default_width: DEFAULT_WIDTH,
        }
    }
}

impl Font {
    pub fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let to_unicode = dict
            .get_deref(b"ToUnicode", doc)
            .and_then(Object::as_stream)
            .map(|s| parse_cmap(&stream_bytes(s)))
            .unwrap_or_default();

        if dict.get(b"Subtype").and_then(Object::as_name_str).ok() == Some("Type0") {
            let encoding = dict
                .get_deref(b"Encoding", doc)
                .and_then(Object::as_name_str)
                .unwrap_or("Identity-H");
            let fallback = if encoding.starts_with("Uni") && (encoding.contains("UCS2") || encoding.contains("UTF16")) {
                Fallback::Ucs2
            } else {
                Fallback::Unmapped
            };
            let descendant = dict
                .get_deref(b"DescendantFonts", doc)
                .and_then(Object::as_array)
                .ok()
                .and_then(|fonts| fonts.first())
                .and_then(|f| doc.dereference(f).ok())
                .and_then(|(_, f)| f.as_dict().ok());
            let (widths, default_width) = descendant
                .map(|d| cid_widths(doc, d))
                .unwrap_or_else(|| (HashMap::new(), 1000.0));
            return Self {
                code_len: 2,
                to_unicode,
                fallback,
                widths,
                default_width,
            };
        }

        let (widths, default_width) = simple_widths(doc, dict);
        Self {
            code_len: 1,
            to_unicode,
            fallback: Fallback::Table(simple_encoding(doc, dict)),
            widths,
            default_width,
        }
    }

    /// Split a shown string into character codes.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        bytes
            .chunks(self.code_len)
            .map(|chunk| {
                let code = code_of(chunk);
                Glyph {
                    text: self.text(code),
                    width: self.widths.get(&code).copied().unwrap_or(self.default_width),
                    is_space: self.code_len == 1 && code == 32,
                }
            })
            .collect()
    }

    fn text(&self, code: u32) -> String {
        if let Some(t) = self.to_unicode.get(&code) {
            return t.clone();
        }
        match &self.fallback {
            Fallback::Table(table) => table.get(code as usize).cloned().unwrap_or_default(),
            Fallback::Ucs2 => char::from_u32(code).map(String::from).unwrap_or_default(),
            Fallback::Unmapped => char::REPLACEMENT_CHARACTER.to_string(),
        }
    }
}

/// Every font reachable from the page's (possibly inherited) resources.
pub fn page_fonts(doc: &Document, page_id: ObjectId) -> Fonts {
    let fonts: Fonts = doc
        .get_page_fonts(page_id)
        .into_iter()
        .map(|(name, dict)| (name, Font::from_dict(doc, dict)))
        .collect();
    debug!(fonts = fonts.len(), "page fonts loaded");
    fonts
}

fn stream_bytes(stream: &Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

fn encoding_table(name: &str) -> Vec<String> {
    (0..=255u8).map(|b| Document::decode_text(Some(name), &[b])).collect()
}

fn simple_encoding(doc: &Document, font: &Dictionary) -> Vec<String> {
    match font.get_deref(b"Encoding", doc) {
        Ok(Object::Name(name)) => encoding_table(&String::from_utf8_lossy(name)),
        Ok(Object::Dictionary(enc)) => {
            let base = enc
                .get(b"BaseEncoding")
                .and_then(Object::as_name_str)
                .unwrap_or("StandardEncoding");
            let mut table = encoding_table(base);
            if let Ok(diffs) = enc.get_deref(b"Differences", doc).and_then(Object::as_array) {
                apply_differences(&mut table, diffs);
            }
            table
        }
        _ => encoding_table("StandardEncoding"),
    }
}

/// `[code /name /name code /name ...]`: each name replaces the next code.
fn apply_differences(table: &mut [String], diffs: &[Object]) {
    let mut code = 0usize;
    for item in diffs {
        match item {
            Object::Integer(start) => code = usize::try_from(*start).unwrap_or(usize::MAX),
            Object::Name(glyph) => {
                if let (Some(slot), Some(text)) = (table.get_mut(code), glyph_text(glyph)) {
                    *slot = text;
                }
                code = code.saturating_add(1);
            }
            _ => {}
        }
    }
}

const GLYPH_NAMES: &[(&str, &str)] = &[
    ("space", " "),
    ("exclam", "!"),
    ("quotedbl", "\""),
    ("numbersign", "#"),
    ("dollar", "$"),
    ("percent", "%"),
    ("ampersand", "&"),
    ("quotesingle", "'"),
    ("parenleft", "("),
    ("parenright", ")"),
    ("asterisk", "*"),
    ("plus", "+"),
    ("comma", ","),
    ("hyphen", "-"),
    ("period", "."),
    ("slash", "/"),
    ("zero", "0"),
    ("one", "1"),
    ("two", "2"),
    ("three", "3"),
    ("four", "4"),
    ("five", "5"),
    ("six", "6"),
    ("seven", "7"),
    ("eight", "8"),
    ("nine", "9"),
    ("colon", ":"),
    ("semicolon", ";"),
    ("less", "<"),
    ("equal", "="),
    ("greater", ">"),
    ("question", "?"),
    ("at", "@"),
    ("bracketleft", "["),
    ("backslash", "\\"),
    ("bracketright", "]"),
    ("underscore", "_"),
    ("braceleft", "{"),
    ("bar", "|"),
    ("braceright", "}"),
    ("quoteleft", "\u{2018}"),
    ("quoteright", "\u{2019}"),
    ("quotedblleft", "\u{201C}"),
    ("quotedblright", "\u{201D}"),
    ("endash", "\u{2013}"),
    ("emdash", "\u{2014}"),
    ("bullet", "\u{2022}"),
    ("ellipsis", "\u{2026}"),
    ("fi", "fi"),
    ("fl", "fl"),
    ("aacute", "á"),
    ("eacute", "é"),
    ("iacute", "í"),
    ("oacute", "ó"),
    ("uacute", "ú"),
    ("agrave", "à"),
    ("egrave", "è"),
    ("adieresis", "ä"),
    ("odieresis", "ö"),
    ("udieresis", "ü"),
    ("ntilde", "ñ"),
    ("ccedilla", "ç"),
    ("atilde", "ã"),
    ("otilde", "õ"),
    ("ecircumflex", "ê"),
    ("Eacute", "É"),
];

/// Text of a glyph name: `uniXXXX`, `uXXXX[XX]`, single letters and the
/// common Latin names. Suffixes such as `.sc` are ignored.
fn glyph_text(name: &[u8]) -> Option<String> {
    let name = std::str::from_utf8(name).ok()?;
    let base = name.split('.').next().unwrap_or(name);

    if let Some(hex) = base.strip_prefix("uni") {
        if !hex.is_empty() && hex.len() % 4 == 0 {
            let units: Option<Vec<u16>> = hex
                .as_bytes()
                .chunks(4)
                .map(|c| std::str::from_utf8(c).ok().and_then(|h| u16::from_str_radix(h, 16).ok()))
                .collect();
            if let Some(units) = units {
                return Some(String::from_utf16_lossy(&units));
            }
        }
    }
    if let Some(hex) = base.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) {
            if let Some(c) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                return Some(c.to_string());
            }
        }
    }
    let mut chars = base.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            return Some(c.to_string());
        }
    }
    GLYPH_NAMES
        .iter()
        .find(|(n, _)| *n == base)
        .map(|(_, t)| t.to_string())
}

fn simple_widths(doc: &Document, font: &Dictionary) -> (HashMap<u32, f32>, f32) {
    let missing = font
        .get_deref(b"FontDescriptor", doc)
        .and_then(Object::as_dict)
        .and_then(|d| d.get(b"MissingWidth"))
        .and_then(Object::as_float)
        .ok();
    let first = font
        .get(b"FirstChar")
        .and_then(Object::as_i64)
        .map(|c| c.max(0) as u32)
        .unwrap_or(0);

    let mut widths = HashMap::new();
    if let Ok(list) = font.get_deref(b"Widths", doc).and_then(Object::as_array) {
        for (n, w) in list.iter().enumerate() {
            if let Ok(w) = doc.dereference(w).and_then(|(_, w)| w.as_float()) {
                widths.insert(first + n as u32, w);
            }
        }
    }
    (widths, missing.unwrap_or(DEFAULT_WIDTH))
}

/// `/W [c [w1 w2 ...] c_first c_last w ...]` and `/DW` of a CID font.
fn cid_widths(doc: &Document, cid: &Dictionary) -> (HashMap<u32, f32>, f32) {
    let default_width = cid.get(b"DW").and_then(Object::as_float).unwrap_or(1000.0);
    let mut widths = HashMap::new();
    let Ok(w) = cid.get_deref(b"W", doc).and_then(Object::as_array) else {
        return (widths, default_width);
    };

    let mut i = 0;
    while i < w.len() {
        let Ok(first) = w[i].as_i64() else { break };
        let first = first.max(0) as u32;
        match w.get(i + 1).map(|o| doc.dereference(o).map(|(_, o)| o)) {
            Some(Ok(Object::Array(list))) => {
                for (n, width) in list.iter().enumerate() {
                    if let Ok(width) = width.as_float() {
                        widths.insert(first + n as u32, width);
                    }
                }
                i += 2;
            }
            Some(Ok(last)) => {
                let (Ok(last), Some(Ok(width))) = (last.as_i64(), w.get(i + 2).map(Object::as_float)) else {
                    break;
                };
                let last = (last.max(0) as u32).min(first.saturating_add(0xFFFF));
                for code in first..=last {
                    widths.insert(code, width);
                }
                i += 3;
            }
            _ => break,
        }
    }
    (widths, default_width)
}

static CMAP_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([0-9A-Fa-f\s]*)>|\[|\]|[A-Za-z]+").expect("valid regex"));

#[derive(Debug, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    Open,
    Close,
    Word(String),
}

fn hex_bytes(hex: &[u8]) -> Vec<u8> {
    let digits: Vec<u8> = hex
        .iter()
        .filter_map(|&c| (c as char).to_digit(16))
        .map(|d| d as u8)
        .collect();
    digits
        .chunks(2)
        .map(|p| (p[0] << 4) | p.get(1).copied().unwrap_or(0))
        .collect()
}

fn tokens(data: &[u8]) -> Vec<Token> {
    CMAP_TOKEN
        .captures_iter(data)
        .map(|c| match c.get(1) {
            Some(hex) => Token::Hex(hex_bytes(hex.as_bytes())),
            None => match &c[0] {
                b"[" => Token::Open,
                b"]" => Token::Close,
                word => Token::Word(String::from_utf8_lossy(word).into_owned()),
            },
        })
        .collect()
}

/// UTF-16BE destination, with `offset` added to its last code unit.
fn utf16be(bytes: &[u8], offset: u32) -> String {
    let mut units: Vec<u16> = bytes
        .chunks(2)
        .map(|c| u16::from_be_bytes([c[0], c.get(1).copied().unwrap_or(0)]))
        .collect();
    if let Some(last) = units.last_mut() {
        *last = last.wrapping_add(offset as u16);
    }
    String::from_utf16_lossy(&units)
}

/// The `bfchar` and `bfrange` mappings of a ToUnicode CMap.
pub fn parse_cmap(data: &[u8]) -> HashMap<u32, String> {
    let tokens = tokens(data);
    let mut map = HashMap::new();
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Word(w) if w == "beginbfchar" => {
                i += 1;
                while let (Some(Token::Hex(src)), Some(Token::Hex(dst))) = (tokens.get(i), tokens.get(i + 1)) {
                    map.insert(code_of(src), utf16be(dst, 0));
                    i += 2;
                }
            }
            Token::Word(w) if w == "beginbfrange" => {
                i += 1;
                while let (Some(Token::Hex(lo)), Some(Token::Hex(hi))) = (tokens.get(i), tokens.get(i + 1)) {
                    let (lo, hi) = (code_of(lo), code_of(hi));
                    match tokens.get(i + 2) {
                        Some(Token::Hex(dst)) => {
                            let hi = hi.min(lo.saturating_add(0xFFFF));
                            for code in lo..=hi {
                                map.insert(code, utf16be(dst, code - lo));
                            }
                            i += 3;
                        }
                        Some(Token::Open) => {
                            let mut j = i + 3;
                            let mut code = lo;
                            while let Some(Token::Hex(dst)) = tokens.get(j) {
                                if code <= hi {
                                    map.insert(code, utf16be(dst, 0));
                                }
                                code = code.saturating_add(1);
                                j += 1;
                            }
                            // past the closing bracket
                            i = j + 1;
                        }
                        _ => break,
                    }
                }
            }
            _ => i += 1,
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    const CMAP: &[u8] = b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def
/CMapName /Adobe-Identity-UCS def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
2 beginbfchar
<0026> <0043>
<00B2> <00660069>
endbfchar
2 beginbfrange
<004B> <004C> <0068>
<0050> <0051> [<00E9> <2019>]
endbfrange
endcmap
CMapName currentdict /CMap defineresource pop
end
end";

    #[test]
    fn cmap_chars_and_ranges() {
        let map = parse_cmap(CMAP);
        assert_eq!(map.get(&0x26).map(String::as_str), Some("C"));
        assert_eq!(map.get(&0xB2).map(String::as_str), Some("fi"));
        assert_eq!(map.get(&0x4B).map(String::as_str), Some("h"));
        assert_eq!(map.get(&0x4C).map(String::as_str), Some("i"));
        assert_eq!(map.get(&0x50).map(String::as_str), Some("é"));
        assert_eq!(map.get(&0x51).map(String::as_str), Some("\u{2019}"));
        assert_eq!(map.len(), 6);
    }

    #[test]
    fn differences_and_widths_of_a_simple_font() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "FirstChar" => 65,
            "Widths" => vec![Object::Integer(600), Object::Integer(722)],
            "Encoding" => dictionary! {
                "BaseEncoding" => "WinAnsiEncoding",
                "Differences" => vec![Object::Integer(65), "uni00E9".into(), "bullet".into()],
            },
        };
        let font = Font::from_dict(&doc, &font);
        let glyphs = font.decode(b"ABC ");
        let text: Vec<&str> = glyphs.iter().map(|g| g.text.as_str()).collect();
        assert_eq!(text, vec!["é", "\u{2022}", "C", " "]);
        assert_eq!(glyphs[0].width, 600.0);
        assert_eq!(glyphs[1].width, 722.0);
        assert_eq!(glyphs[2].width, DEFAULT_WIDTH);
        assert!(glyphs[3].is_space);
    }

    #[test]
    fn type0_without_map_is_not_guessed() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "Encoding" => "Identity-H",
        };
        let glyphs = Font::from_dict(&doc, &font).decode(&[0x00, 0x26]);
        assert_eq!(glyphs.len(), 1);
        assert_eq!(glyphs[0].text, "\u{FFFD}");
        assert_eq!(glyphs[0].width, 1000.0);
    }

    #[test]
    fn glyph_names() {
        assert_eq!(glyph_text(b"a").as_deref(), Some("a"));
        assert_eq!(glyph_text(b"uni00F1").as_deref(), Some("ñ"));
        assert_eq!(glyph_text(b"u1F600").as_deref(), Some("\u{1F600}"));
        assert_eq!(glyph_text(b"hyphen").as_deref(), Some("-"));
        assert_eq!(glyph_text(b"A.sc").as_deref(), Some("A"));
        assert_eq!(glyph_text(b"uacute").as_deref(), Some("ú"));
        assert_eq!(glyph_text(b"g123"), None);
    }
}
