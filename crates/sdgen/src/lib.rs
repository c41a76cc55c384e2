//! An LR(1) scanner and parser generator with automatic locally least-cost
//! error repair.
//!
//! From a language description holding token regular expressions and a
//! context-free grammar with embedded semantic-action markers, the generator
//! builds a minimized scanner automaton and an LALR(1) parser, resolving
//! shift-reduce conflicts by precedence and reduce-reduce conflicts by lane
//! tracing and state splitting, and emits the compressed tables interpreted
//! by the `sdgen-runtime` crate.

pub mod compress;
pub mod emit;
pub mod grammar;
pub mod lalr;
pub mod language;
pub mod listing;
pub mod regex;
pub mod scanner;
pub mod symbol;
pub mod syntax;
pub mod types;

pub use crate::language::{Language, Options};
