// src/fetch/pdf/content.rs
//! Positioned text runs from a page content stream.

use lopdf::content::{Content, Operation};
use lopdf::Object;
use tracing::{debug, trace};

use super::font::{Font, Fonts};

/// A piece of text shown at one origin, in page space (points, y up).
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f32,
    pub y: f32,
    /// Advance from the font's glyph widths, in page space.
    pub width: f32,
    pub size: f32,
    pub text: String,
}

impl TextRun {
    pub fn x_end(&self) -> f32 {
        self.x + self.width
    }
}

/// TJ adjustments below this (thousandths of an em) separate words.
const WORD_GAP_KERN: f32 = -200.0;

type Matrix = [f32; 6];
const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn mul(m: &Matrix, n: &Matrix) -> Matrix {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

fn translate(tx: f32, ty: f32) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

fn num(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn nums<const N: usize>(operands: &[Object]) -> Option<[f32; N]> {
    if operands.len() < N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, obj) in out.iter_mut().zip(&operands[operands.len() - N..]) {
        *slot = num(obj)?;
    }
    Some(out)
}

struct State<'a> {
    fonts: &'a Fonts,
    font: Option<&'a Font>,
    fallback: Font,
    ctm: Matrix,
    stack: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    leading: f32,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    h_scale: f32,
    /// Set by positioning operators; the next show starts a new run.
    moved: bool,
    runs: Vec<TextRun>,
}

impl<'a> State<'a> {
    fn new(fonts: &'a Fonts) -> Self {
        Self {
            fonts,
            font: None,
            fallback: Font::default(),
            ctm: IDENTITY,
            stack: Vec::new(),
            tm: IDENTITY,
            tlm: IDENTITY,
            leading: 0.0,
            size: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            moved: true,
            runs: Vec::new(),
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = mul(&translate(tx, ty), &self.tlm);
        self.tm = self.tlm;
        self.moved = true;
    }

    /// Append `text` at the current point and advance by `tx` (text space).
    fn emit(&mut self, text: &str, tx: f32) {
        let m = mul(&self.tm, &self.ctm);
        let scale = (m[0] * m[0] + m[1] * m[1]).sqrt();
        let end = m[4] + tx * scale;

        let appended = match self.runs.last_mut() {
            Some(run) if !self.moved => {
                run.text.push_str(text);
                run.width = end - run.x;
                true
            }
            _ => false,
        };
        if !appended && !text.trim().is_empty() {
            self.runs.push(TextRun {
                x: m[4],
                y: m[5],
                width: tx * scale,
                size: self.size * scale,
                text: text.to_string(),
            });
            self.moved = false;
        }
        self.tm = mul(&translate(tx, 0.0), &self.tm);
    }

    fn show(&mut self, bytes: &[u8]) {
        let glyphs = self.font.unwrap_or(&self.fallback).decode(bytes);
        let mut text = String::new();
        let mut tx = 0.0;
        for g in &glyphs {
            text.push_str(&g.text);
            let spacing = self.char_spacing + if g.is_space { self.word_spacing } else { 0.0 };
            tx += (g.width * self.size / 1000.0 + spacing) * self.h_scale;
        }
        self.emit(&text, tx);
    }

    fn kern(&mut self, adjust: f32) {
        let tx = -adjust * self.size / 1000.0 * self.h_scale;
        let gap = if adjust < WORD_GAP_KERN { " " } else { "" };
        self.emit(gap, tx);
    }

    fn apply(&mut self, op: &Operation) {
        let ops = &op.operands;
        match op.operator.as_str() {
            "q" => self.stack.push(self.ctm),
            "Q" => {
                if let Some(m) = self.stack.pop() {
                    self.ctm = m;
                }
                self.moved = true;
            }
            "cm" => {
                if let Some(m) = nums::<6>(ops) {
                    self.ctm = mul(&m, &self.ctm);
                    self.moved = true;
                }
            }
            "BT" => {
                self.tm = IDENTITY;
                self.tlm = IDENTITY;
                self.moved = true;
            }
            "Tf" => {
                if let Some(Object::Name(name)) = ops.first() {
                    self.font = self.fonts.get(name);
                    if self.font.is_none() {
                        debug!(font = %String::from_utf8_lossy(name), "font not in page resources");
                    }
                }
                if let Some([size]) = nums::<1>(ops) {
                    self.size = size;
                }
            }
            "Tc" => {
                if let Some([c]) = nums::<1>(ops) {
                    self.char_spacing = c;
                }
            }
            "Tw" => {
                if let Some([w]) = nums::<1>(ops) {
                    self.word_spacing = w;
                }
            }
            "Tz" => {
                if let Some([z]) = nums::<1>(ops) {
                    self.h_scale = z / 100.0;
                }
            }
            "TL" => {
                if let Some([l]) = nums::<1>(ops) {
                    self.leading = l;
                }
            }
            "Td" => {
                if let Some([tx, ty]) = nums::<2>(ops) {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = nums::<2>(ops) {
                    self.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = nums::<6>(ops) {
                    self.tm = m;
                    self.tlm = m;
                    self.moved = true;
                }
            }
            "T*" => self.move_line(0.0, -self.leading),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = ops.first() {
                    self.show(bytes);
                }
            }
            "'" => {
                self.move_line(0.0, -self.leading);
                if let Some(Object::String(bytes, _)) = ops.first() {
                    self.show(bytes);
                }
            }
            "\"" => {
                if let Some([w, c]) = ops.get(..2).and_then(nums::<2>) {
                    self.word_spacing = w;
                    self.char_spacing = c;
                }
                self.move_line(0.0, -self.leading);
                if let Some(Object::String(bytes, _)) = ops.last() {
                    self.show(bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = ops.first() {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => self.show(bytes),
                            other => {
                                if let Some(k) = num(other) {
                                    self.kern(k);
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

/// Interpret the text operators of a decoded content stream, decoding
/// shown strings with the page's `fonts`.
pub fn text_runs(content: &Content, fonts: &Fonts) -> Vec<TextRun> {
    let mut state = State::new(fonts);
    for op in &content.operations {
        state.apply(op);
    }
    trace!(runs = state.runs.len(), "collected text runs");
    state.runs
}
