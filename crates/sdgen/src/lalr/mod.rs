//! LALR(1) parser generation.

pub mod collection;
pub mod first;
pub mod lookahead;
pub mod split;
pub mod table;

use crate::grammar::Productions;
use crate::language::Language;

pub use self::collection::{Collection, GotoEntry, Item, State, Target};
pub use self::first::FirstSets;

/// Everything the parser half of the tables needs: the characteristic
/// machine, the uncompressed action matrix, and the per-state repair
/// values.
#[derive(Debug)]
pub struct ParserTables {
    pub collection: Collection,
    pub first: FirstSets,
    /// `lrstates[state][token]`, both 1-based; row 0 is padding.
    pub lrstates: Vec<Vec<i32>>,
    /// Continuation automaton value per state; entry 0 is padding.
    pub errortoken: Vec<i32>,
}

impl ParserTables {
    pub fn count(&self) -> usize {
        self.collection.count()
    }
}

/// Run the full parser pipeline: canonical collection, lookaheads, table
/// construction with conflict repair, and error-repair values.
pub fn generate_parser(lang: &mut Language, productions: &Productions) -> ParserTables {
    let mut coll = collection::build_collection(lang, productions);
    tracing::debug!(states = coll.count(), "built canonical collection");

    let first = first::compute_first(lang, productions);

    lookahead::setup_lookahead(lang, productions, &first, &mut coll);
    lookahead::propagate_lookahead(lang, &mut coll);

    let lrstates = table::build_table(lang, productions, &mut coll);
    let errortoken = table::build_repair(lang, productions, &coll);

    ParserTables {
        collection: coll,
        first,
        lrstates,
        errortoken,
    }
}
