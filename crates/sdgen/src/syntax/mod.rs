//! The language description syntax.
//!
//! Sections appear in fixed order: `IDENT`, `TITLE`, `OPTIONS`, `DEFINE`,
//! `SCANNER`, `DEFAULT`, `PARSER`. Comments run from `%` to `%`. Terminals
//! are quoted, nonterminals bracketed in `<...>`, semantic action markers
//! written `#n`. Structural errors abort with a [`SyntaxError`]; semantic
//! problems (undefined nonterminals, duplicate tokens, alias chains) are
//! recorded on the language and suppress table emission without stopping
//! the listings.

mod lexer;
mod parser;

use crate::language::Language;
use std::io::Read;

#[derive(Debug, thiserror::Error)]
pub enum SyntaxError {
    #[error("line {line}: {message}")]
    Parse { line: u32, message: String },

    #[error("error reading language description")]
    Io(
        #[from]
        #[source]
        std::io::Error,
    ),
}

/// Parse a language description into a [`Language`], augmenting the grammar
/// with the goal production and the end-of-file sentinel.
pub fn parse_language<R: Read>(mut input: R) -> Result<Language, SyntaxError> {
    let mut source = Vec::new();
    input.read_to_end(&mut source)?;

    let tokens = lexer::scan(&source)?;
    parser::parse(tokens)
}
