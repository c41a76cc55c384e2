//! Per-token first sets.

use crate::grammar::Productions;
use crate::language::Language;
use crate::symbol::{SymbolSet, TokenFlags};

#[derive(Debug, Default, Clone)]
pub struct FirstEntry {
    pub symbols: SymbolSet,
    pub nullable: bool,
}

/// First sets indexed by token number (entry 0 is padding).
#[derive(Debug, Default)]
pub struct FirstSets {
    pub entries: Vec<FirstEntry>,
}

impl FirstSets {
    pub fn get(&self, token: i32) -> &FirstEntry {
        &self.entries[token as usize]
    }
}

pub fn compute_first(lang: &Language, productions: &Productions) -> FirstSets {
    let termcount = lang.termcount();
    let total = (termcount + lang.nontermcount()) as usize;
    let mut first = FirstSets {
        entries: vec![FirstEntry::default(); total + 1],
    };

    // Every terminal is its own first set; epsilon terminals are nullable.
    for token in 1..=termcount {
        let symbol = lang.token_symbol(token);
        if lang.symbols.token(symbol).flags.contains(TokenFlags::EMPTY) {
            first.entries[token as usize].nullable = true;
        } else {
            first.entries[token as usize].symbols.insert(symbol);
        }
    }

    // Grow the nonterminal first sets to a fixpoint.
    loop {
        let mut changed = false;
        for index in 1..=lang.nontermcount() {
            let token = termcount + index;
            let mut j = productions.lhsindex[index as usize];
            while j <= productions.count()
                && lang.token_of(productions.get(j).lhs) == token
            {
                let production = productions.get(j);
                let mut k = 0;
                while k < production.length {
                    let item = lang.token_of(production.rhs[k]);
                    let added = first.entries[item as usize].symbols.clone();
                    changed |= first.entries[token as usize].symbols.union_with(&added);
                    if !first.entries[item as usize].nullable {
                        break;
                    }
                    k += 1;
                }
                if k >= production.length && !first.entries[token as usize].nullable {
                    first.entries[token as usize].nullable = true;
                    changed = true;
                }
                j += 1;
            }
        }
        if !changed {
            break;
        }
    }

    first
}

/// `FIRST` of a right-hand-side tail, plus whether the whole tail is
/// nullable.
pub fn first_of_tail(
    lang: &Language,
    first: &FirstSets,
    production: &crate::grammar::Production,
    from: usize,
) -> (SymbolSet, bool) {
    let mut follow = SymbolSet::new();
    let mut k = from;
    while k < production.length {
        let token = lang.token_of(production.rhs[k]);
        follow = follow.union(&first.get(token).symbols);
        if !first.get(token).nullable {
            break;
        }
        k += 1;
    }
    (follow, k >= production.length)
}
