// src/lib.rs
//! Batch collectors for treaty and policy status data: scrape, normalise,
//! reshape into year panels and export to spreadsheets.

pub mod config;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod logging;
pub mod panel;
pub mod retry;
pub mod sources;
pub mod table;
