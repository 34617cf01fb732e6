//! Text front-end for kernbind.
//!
//! Parses the textual IR produced by [`kernbind_ir::dump_module`] back into
//! a [`kernbind_ir::Module`], and reads literal sampler map files into a
//! [`kernbind_opt::SamplerMap`].

mod lexer;
mod parser;
mod sampler_map;

pub use sampler_map::{parse_sampler_map, sampler_flag_value};

/// Parse textual IR into a kernbind module.
///
/// Function headers are read before any body, so calls may refer to
/// functions defined later in the file.
pub fn parse(source: &str) -> Result<kernbind_ir::Module, ParseError> {
    parser::parse_module(source)
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: unexpected character '{ch}'")]
    UnexpectedChar { line: usize, ch: char },
    #[error("line {line}: invalid number '{text}'")]
    InvalidNumber { line: usize, text: String },
    #[error("line {line}: expected {expected}, found {found}")]
    Expected {
        line: usize,
        expected: String,
        found: String,
    },
    #[error("line {line}: use of undefined value %{name}")]
    UndefinedValue { line: usize, name: String },
    #[error("line {line}: %{name} is already defined")]
    Redefinition { line: usize, name: String },
    #[error("line {line}: unknown function @{name}")]
    UnknownFunction { line: usize, name: String },
    #[error("line {line}: function @{name} is defined twice")]
    DuplicateFunction { line: usize, name: String },
    #[error("line {line}: unknown sampler flag '{flag}'")]
    UnknownSamplerFlag { line: usize, flag: String },
}
