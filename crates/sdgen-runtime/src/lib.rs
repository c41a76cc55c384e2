//! The interpreter half of the sdgen toolchain.
//!
//! A generated language ships as a [`Tables`](tables::Tables) value: a
//! compressed scanner automaton, a compressed LALR(1) action/goto table, and
//! the cost/repair data needed for locally least-cost error repair. The
//! [`Driver`](driver::Driver) interprets those tables against an input
//! stream, invoking user [`Callbacks`](driver::Callbacks) for semantic
//! actions and installed token strings, and repairing syntax errors by
//! inserting and deleting tokens at minimum cost.

pub mod buffer;
pub mod driver;
pub mod message;
pub mod tables;

mod repair;
mod scanner;

pub use crate::{
    driver::{Callbacks, Driver, ParseEntry, TokenEntry},
    tables::Tables,
};

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// A syntax error in a state with no continuation value.
    #[error("unrepairable syntax error")]
    FatalSyntax,

    #[error("error reading input")]
    Read(#[source] io::Error),

    #[error("error writing listing")]
    Write(#[source] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum TablesError {
    #[error("tables file is truncated or malformed")]
    Malformed,

    #[error("tables file is not in the compressed format")]
    WrongType,

    #[error("I/O error reading tables")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),
}
