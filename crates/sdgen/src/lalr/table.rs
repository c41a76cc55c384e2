//! Parse-table construction and conflict handling.
//!
//! The uncompressed table is a states x tokens matrix in the shared action
//! encoding: `SHIFT_OFFSET + state` shifts, a bare production number is a
//! fused shift-reduce, a negated production number reduces, `ACCEPT_OFFSET`
//! accepts, 0 errors. Reduce-reduce conflicts trigger state splitting and a
//! full rebuild; shift-reduce conflicts go to precedence resolution.

use super::collection::Collection;
use super::lookahead::propagate_lookahead;
use super::split::split_states;
use crate::grammar::Productions;
use crate::language::Language;
use crate::symbol::{SymbolKind, TokenFlags};
use sdgen_runtime::tables::{ACCEPT_OFFSET, SHIFT_OFFSET};

const NO_ERROR: u32 = 0;
const SHIFT_REDUCE_ERROR: u32 = 0x1;
const REDUCE_REDUCE_ERROR: u32 = 0x2;

/// Store an encoded action unless the slot already holds a different one;
/// report which kind of conflict a collision is.
fn set_action(lrstates: &mut [Vec<i32>], state: usize, token: i32, action: i32) -> u32 {
    let slot = &mut lrstates[state][token as usize];
    if *slot != 0 && *slot != action {
        if *slot > 0 || action > 0 {
            SHIFT_REDUCE_ERROR
        } else {
            REDUCE_REDUCE_ERROR
        }
    } else {
        *slot = action;
        NO_ERROR
    }
}

/// Build the parser action/goto matrix, splitting states on reduce-reduce
/// conflicts and resolving shift-reduce conflicts by precedence.
pub fn build_table(
    lang: &mut Language,
    productions: &Productions,
    collection: &mut Collection,
) -> Vec<Vec<i32>> {
    let goal_token = lang.token_of(lang.goal.expect("grammar is augmented"));
    let mut splits = 0;
    let split_limit = collection.states.len() + 16;
    loop {
        let columns = (lang.termcount() + lang.nontermcount()) as usize + 1;
        let mut lrstates = vec![vec![0i32; columns]; collection.states.len()];

        let mut restart = false;
        for i in 1..collection.states.len() {
            // State 1 accepts on the augmented goal.
            if i == 1 {
                set_action(&mut lrstates, i, goal_token, ACCEPT_OFFSET);
            }

            // Shift and shift-reduce actions.
            for j in 0..collection.states[i].items.len() {
                let item = &collection.states[i].items[j];
                let production = productions.get(item.prod);
                match item.descendant {
                    Some(descendant) => {
                        let token = lang.token_of(production.rhs[item.dot]);
                        set_action(
                            &mut lrstates,
                            i,
                            token,
                            SHIFT_OFFSET + descendant.state as i32,
                        );
                    }
                    None if item.dot < production.length => {
                        let token = lang.token_of(production.rhs[item.dot]);
                        set_action(&mut lrstates, i, token, item.prod as i32);
                    }
                    None => {}
                }
            }

            // Reduce actions over the lookahead sets.
            let mut result = NO_ERROR;
            for j in 0..collection.states[i].items.len() {
                let item = &collection.states[i].items[j];
                if item.dot < productions.get(item.prod).length {
                    continue;
                }
                let prod = item.prod as i32;
                let lookahead = item.lookahead.clone();
                for symbol in lookahead.iter() {
                    let token = lang.token_of(symbol);
                    result |= set_action(&mut lrstates, i, token, -prod);
                }
            }

            // A repairable reduce-reduce conflict alters the collection, so
            // lookaheads and the whole table are recomputed. The split
            // budget keeps a repair that fails to separate lookaheads from
            // rebuilding forever.
            if result & REDUCE_REDUCE_ERROR != 0 {
                if splits >= split_limit {
                    lang.error("Reduce-Reduce conflict repair did not converge".to_owned());
                } else if split_states(lang, productions, collection, i) {
                    splits += 1;
                    propagate_lookahead(lang, collection);
                    restart = true;
                    break;
                }
            }

            if result & SHIFT_REDUCE_ERROR != 0 {
                resolve_ambiguity(lang, productions, collection, i, &mut lrstates);
            }
        }

        if !restart {
            return lrstates;
        }
    }
}

/// Use precedence and associativity to choose between a reduce and the
/// shifts it collides with.
fn resolve_ambiguity(
    lang: &mut Language,
    productions: &Productions,
    collection: &Collection,
    state: usize,
    lrstates: &mut [Vec<i32>],
) {
    // Report the collisions first.
    for item in &collection.states[state].items {
        if item.dot < productions.get(item.prod).length {
            continue;
        }
        let matches: Vec<i32> = item
            .lookahead
            .iter()
            .map(|symbol| lang.token_of(symbol))
            .filter(|&token| lrstates[state][token as usize] > 0)
            .collect();
        if !matches.is_empty() {
            let names: Vec<String> = matches
                .iter()
                .map(|&token| lang.symbols.get(lang.token_symbol(token)).name.clone())
                .collect();
            lang.warn(format!(
                "Shift-Reduce conflict in state {} on [{}]",
                state,
                names.join(" ")
            ));
        }
    }

    if !lang.options.ambiguous {
        lang.process = false;
        return;
    }

    let mut failure = false;
    for index in 0..collection.states[state].items.len() {
        let item = collection.states[state].items[index].clone();
        if item.dot < productions.get(item.prod).length {
            continue;
        }

        let collides = item
            .lookahead
            .iter()
            .any(|symbol| lrstates[state][lang.token_of(symbol) as usize] > 0);
        if !collides {
            continue;
        }

        // The reduce precedence comes from the last terminal of the
        // reducing production's right hand side.
        let mut reduceprec = -1;
        for &symbol in &productions.get(item.prod).rhs {
            if lang.kind_of(symbol) == SymbolKind::Terminal {
                reduceprec = lang.symbols.token(symbol).precedence;
            }
        }
        if reduceprec < 0 {
            lang.warn(format!(
                "The reduce by production {} has no precedence",
                item.prod
            ));
            failure = true;
            continue;
        }

        for symbol in item.lookahead.iter() {
            let token = lang.token_of(symbol);
            if lrstates[state][token as usize] <= 0 {
                continue;
            }

            // Every item shifting this token should agree on precedence and
            // associativity; disagreement gets a warning and the first item
            // wins.
            let mut shiftprec = -1;
            let mut associativity = TokenFlags::default();
            for other in &collection.states[state].items {
                let production = productions.get(other.prod);
                if other.dot >= production.length
                    || lang.token_of(production.rhs[other.dot]) != token
                {
                    continue;
                }
                let value = lang.symbols.token(production.rhs[other.dot]);
                let nextprec = value.precedence;
                let nextassoc = value.flags.mask(TokenFlags::ASSOCIATIVITY);

                if shiftprec >= 0 && nextprec != shiftprec {
                    lang.warn(format!(
                        "Shift precedence {} is not equal to the earlier precedence {}",
                        nextprec, shiftprec
                    ));
                }
                if associativity != TokenFlags::default() && nextassoc != associativity {
                    lang.warn("Shift associativity disagrees with an earlier item".to_owned());
                }
                if shiftprec < 0 {
                    shiftprec = nextprec;
                }
                if associativity == TokenFlags::default() {
                    associativity = nextassoc;
                }
            }

            if reduceprec == shiftprec && associativity == TokenFlags::NONE {
                failure = true;
            }
            set_ambiguity(
                lang,
                productions,
                collection,
                state,
                item.prod,
                token,
                reduceprec,
                shiftprec,
                associativity,
                lrstates,
            );
        }
    }

    if failure {
        lang.error("Shift-Reduce conflict cannot be resolved".to_owned());
    } else {
        lang.warn("Shift-Reduce conflict has been resolved".to_owned());
    }
}

/// Overwrite the shift action with the reduce when precedence or left
/// associativity says so.
#[allow(clippy::too_many_arguments)]
fn set_ambiguity(
    lang: &mut Language,
    productions: &Productions,
    collection: &Collection,
    state: usize,
    reduce_prod: usize,
    token: i32,
    reduceprec: i32,
    shiftprec: i32,
    associativity: TokenFlags,
    lrstates: &mut [Vec<i32>],
) {
    // A representative item shifting the conflicted token.
    let shifted = collection.states[state].items.iter().find(|item| {
        let production = productions.get(item.prod);
        item.dot < production.length && lang.token_of(production.rhs[item.dot]) == token
    });
    let Some(shifted) = shifted else {
        return;
    };
    let kind = if shifted.descendant.is_some() {
        "shift"
    } else {
        "shiftreduce"
    };

    if shiftprec < reduceprec {
        lang.warn(format!(
            "Reduce precedence {} is higher than {} precedence {}; action will be reduce",
            reduceprec, kind, shiftprec
        ));
        lrstates[state][token as usize] = -(reduce_prod as i32);
    } else if reduceprec < shiftprec {
        lang.warn(format!(
            "{} precedence {} is higher than reduce precedence {}; action will be {}",
            kind, shiftprec, reduceprec, kind
        ));
    } else if associativity == TokenFlags::LEFT {
        lang.warn(format!(
            "{} precedence {} equals reduce precedence and associativity = LEFT; action will be reduce",
            kind, shiftprec
        ));
        lrstates[state][token as usize] = -(reduce_prod as i32);
    } else if associativity == TokenFlags::RIGHT {
        lang.warn(format!(
            "{} precedence {} equals reduce precedence and associativity = RIGHT; action will be {}",
            kind, shiftprec, kind
        ));
    } else {
        lang.warn(format!(
            "{} precedence {} equals reduce precedence {} and associativity = NONE",
            kind, shiftprec, reduceprec
        ));
    }
}

/// Select the continuation-automaton value of every state: what the repair
/// engine shifts or reduces when parsing must be forced forward.
pub fn build_repair(
    lang: &Language,
    productions: &Productions,
    collection: &Collection,
) -> Vec<i32> {
    let mut errortoken = vec![0i32; collection.states.len()];
    if !lang.options.error_repair {
        return errortoken;
    }

    for i in 1..collection.states.len() {
        let first = &collection.states[i].items[0];
        if first.dot >= productions.get(first.prod).length {
            // Reduce actions are the negated production number.
            errortoken[i] = -(first.prod as i32);
            continue;
        }
        let symbol = productions.get(first.prod).rhs[first.dot];
        if lang.kind_of(symbol) == SymbolKind::Terminal {
            errortoken[i] = lang.token_of(symbol);
            continue;
        }

        // The dot is at a nonterminal: the first closure item that reduces
        // or shifts a terminal continues the parse. The ordering applied to
        // the grammar plus the depth-first closure guarantee it is on the
        // cheapest continuation.
        let mut found = false;
        let kernel = collection.states[i].kernel;
        for item in &collection.states[i].items[kernel..] {
            let production = productions.get(item.prod);
            if item.dot >= production.length {
                errortoken[i] = -(item.prod as i32);
                found = true;
                break;
            }
            if lang.kind_of(production.rhs[item.dot]) == SymbolKind::Terminal {
                errortoken[i] = lang.token_of(production.rhs[item.dot]);
                found = true;
                break;
            }
        }
        if !found {
            tracing::warn!(state = i, "state has no valid error repair value");
        }
    }
    errortoken
}
