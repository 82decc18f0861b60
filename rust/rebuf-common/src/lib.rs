//! Core definitions relied upon by all rebuf-* crates: the error type and `Result` alias.

pub mod error;
pub mod result;

pub use result::Result;
