// src/sources/mod.rs
//! One module per collection job. Each exposes a serde-backed `Config`
//! with the job's built-in defaults and a `run` entry point.

pub mod drr;
pub mod ect;
pub mod lvc;
pub mod marpol;
