// src/fetch/mod.rs
//! Source fetchers: a WebDriver-backed browser session, plain HTTP GETs,
//! and fixed-region table extraction from PDF reports.

pub mod browser;
pub mod http;
pub mod pdf;

pub use browser::{BrowserConfig, BrowserSession, WebDriverSession};
pub use http::{get_text, get_text_with_retry};
pub use pdf::{LayoutOptions, PdfReport, RawTable, Region};
