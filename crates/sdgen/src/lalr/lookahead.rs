//! LALR(1) lookahead construction.
//!
//! Each kernel item gets a unique marker terminal seeded into its
//! spontaneous follow set. Propagating spontaneous follows through the
//! closure then leaves markers exactly in the items that kernel item feeds,
//! so the update graph can be read off by searching for markers; the
//! markers are removed once the edges are recorded. Lookaheads are then the
//! least fixpoint of the update graph seeded from the spontaneous follows.

use super::collection::{Collection, Target};
use super::first::{first_of_tail, FirstSets};
use crate::grammar::Productions;
use crate::language::Language;
use crate::symbol::{SymbolId, SymbolKind, SymbolSet, SymbolValue, TokenValue};

/// Find the member of a follow set whose token number identifies a marker.
fn find_marker(lang: &Language, set: &SymbolSet, token: i32) -> Option<SymbolId> {
    set.iter().find(|&id| lang.token_of(id) == token)
}

/// Seed marker terminals, compute spontaneous follow sets within each
/// state, and record the update graph.
pub fn setup_lookahead(
    lang: &mut Language,
    productions: &Productions,
    first: &FirstSets,
    collection: &mut Collection,
) {
    let termcount = lang.termcount();

    for i in 1..collection.states.len() {
        // A unique marker terminal identifies each kernel item's follows.
        for j in 0..collection.states[i].kernel {
            let marker = lang.symbols.alloc(
                "marker",
                SymbolKind::Terminal,
                SymbolValue::Token(TokenValue {
                    token: termcount + 1 + j as i32,
                    ..TokenValue::default()
                }),
            );
            collection.states[i].items[j].follow.insert(marker);
        }

        // Propagate spontaneous follow sets throughout the item set: an
        // item dotted at a nonterminal injects FIRST of its tail (plus its
        // own follows when the tail is nullable) into every closure item
        // deriving that nonterminal.
        loop {
            let mut changed = false;
            for j in 0..collection.states[i].items.len() {
                let prod = collection.states[i].items[j].prod;
                let dot = collection.states[i].items[j].dot;
                let production = productions.get(prod);
                if dot >= production.length
                    || lang.kind_of(production.rhs[dot]) != SymbolKind::Nonterminal
                {
                    continue;
                }

                let (mut follow, nullable) = first_of_tail(lang, first, production, dot + 1);
                if nullable {
                    follow = follow.union(&collection.states[i].items[j].follow);
                }

                let token = lang.token_of(production.rhs[dot]);
                let kernel = collection.states[i].kernel;
                for k in kernel..collection.states[i].items.len() {
                    let lhs = productions.get(collection.states[i].items[k].prod).lhs;
                    if lang.token_of(lhs) == token {
                        changed |= collection.states[i].items[k].follow.union_with(&follow);
                    }
                }
            }
            if !changed {
                break;
            }
        }

        // Every item holding kernel item j's marker receives j's propagated
        // lookaheads; so do the descendants of those items, and j's own.
        for j in 0..collection.states[i].kernel {
            if let Some(descendant) = collection.states[i].items[j].descendant {
                collection.states[i].items[j].update.push(descendant);
            }

            let marker_token = termcount + 1 + j as i32;
            for k in collection.states[i].kernel..collection.states[i].items.len() {
                let Some(marker) = find_marker(lang, &collection.states[i].items[k].follow, marker_token)
                else {
                    continue;
                };
                collection.states[i].items[j].update.push(Target { state: i, item: k });
                collection.states[i].items[k].follow.delete(marker);

                if let Some(descendant) = collection.states[i].items[k].descendant {
                    let own = descendant.state == i && descendant.item == j;
                    if !own && !collection.states[i].items[j].update.contains(&descendant) {
                        collection.states[i].items[j].update.push(descendant);
                    }
                }
            }

            // Clean up the kernel marker itself.
            if let Some(marker) = find_marker(lang, &collection.states[i].items[j].follow, marker_token)
            {
                collection.states[i].items[j].follow.delete(marker);
            }
        }
    }
}

/// Initialize every lookahead from its spontaneous follows and iterate the
/// update graph to a fixpoint.
pub fn propagate_lookahead(lang: &Language, collection: &mut Collection) {
    for i in 1..collection.states.len() {
        for j in 0..collection.states[i].items.len() {
            collection.states[i].items[j].lookahead.clear();
        }
    }

    for i in 1..collection.states.len() {
        for j in 0..collection.states[i].items.len() {
            if collection.states[i].items[j].follow.is_empty() {
                continue;
            }
            let follow = collection.states[i].items[j].follow.clone();
            collection.states[i].items[j].lookahead.union_with(&follow);

            // Spontaneous follows travel with the item past the dot.
            if let Some(descendant) = collection.states[i].items[j].descendant {
                collection.states[descendant.state].items[descendant.item]
                    .lookahead
                    .union_with(&follow);
            }
        }
    }

    // The start item sees end of file.
    let sentinel = lang.sentinel.expect("grammar has an eof sentinel");
    collection.states[1].items[0].lookahead.insert(sentinel);

    // Iterate to a fixpoint. Termination is certain because lookaheads only
    // grow; the bound guards against update-graph corruption.
    let total_items: usize = collection
        .states
        .iter()
        .map(|state| state.items.len())
        .sum();
    let bound = total_items * collection.states.len() + 1;
    let mut rounds = 0;
    loop {
        let mut changed = false;
        for i in 1..collection.states.len() {
            for j in 0..collection.states[i].kernel {
                let lookahead = collection.states[i].items[j].lookahead.clone();
                let targets = collection.states[i].items[j].update.clone();
                for target in targets {
                    changed |= collection.states[target.state].items[target.item]
                        .lookahead
                        .union_with(&lookahead);
                }
            }
        }
        if !changed {
            break;
        }
        rounds += 1;
        assert!(rounds <= bound, "lookahead propagation failed to converge");
    }
}
