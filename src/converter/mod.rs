//! Intermediate conversions feeding the generators.

pub mod docx2md;
pub mod xlsx2csv;
