//! Markup parser module

pub mod parser;
pub mod scan;

pub use parser::{Config, Parser, DEFAULT_TEXT_KEY};
