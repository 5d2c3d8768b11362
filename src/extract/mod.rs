// src/extract/mod.rs
//! Row extraction helpers: anchor/positional markup lookups and the
//! free-text date parsing shared by the sources.

pub mod dates;
pub mod html;

pub use dates::{extract_year_after_prefix, parse_year_lenient, valid_years};
pub use html::{items_after_anchor, title_links, AnchorScan, AnchorSection};
