//! Report rendering and persistence.

pub mod generator;
pub mod writer;

pub use generator::{render, render_raw_json};
pub use writer::ReportWriter;
