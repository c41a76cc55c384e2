//! The standardized production list.
//!
//! Productions are 1-indexed; production 1 is the synthesized
//! `<Goal> -> <start> <eof>`. Alternatives are collected in left-hand-side
//! token order so that each nonterminal's productions are contiguous and
//! findable through `lhsindex`. Under error repair the alternatives of every
//! nonterminal are sorted cheapest-derivation-first, which the continuation
//! automaton depends on.

use crate::language::Language;
use crate::symbol::{SymbolId, SymbolKind, TokenFlags};

#[derive(Debug, Clone)]
pub struct Production {
    pub lhs: SymbolId,
    pub rhs: Vec<SymbolId>,
    /// Index past the last non-epsilon symbol. Trailing epsilon terminals
    /// stay in `rhs` but do not count here.
    pub length: usize,
    pub semantic: i32,
    /// Minimum number of derivation expansions to reach all-terminals.
    pub steps: i32,
    /// Minimum insertion cost of deriving the right hand side.
    pub insert: i32,
}

#[derive(Debug, Default)]
pub struct Productions {
    /// Productions in number order; numbers are 1-based and mapped by
    /// [`Productions::get`].
    pub list: Vec<Production>,
    /// First production of each nonterminal, indexed by
    /// `lhs_token - termcount`; the production count when undefined.
    pub lhsindex: Vec<usize>,
}

impl Productions {
    pub fn count(&self) -> usize {
        self.list.len()
    }

    pub fn get(&self, number: usize) -> &Production {
        &self.list[number - 1]
    }

    fn push(&mut self, production: Production) {
        self.list.push(production);
    }
}

/// Convert the grammar into the standardized production list.
pub fn build_productions(lang: &mut Language) -> Productions {
    let mut productions = Productions::default();

    // Production 1: the augmented goal.
    let goal = lang.goal.expect("grammar is augmented before building");
    let start = lang.start.expect("grammar has a start symbol");
    let sentinel = lang.sentinel.expect("grammar has an eof sentinel");
    productions.push(Production {
        lhs: goal,
        rhs: vec![start, sentinel],
        length: 2,
        semantic: 0,
        steps: i32::MAX,
        insert: i32::MAX,
    });

    let termcount = lang.termcount();
    productions.lhsindex = vec![0; lang.nontermcount() as usize + 1];
    productions.lhsindex[1] = 1; // <Goal> is nonterminal number one.

    // Append each alternative in left-hand-side token order.
    for token in termcount + 2..=termcount + lang.nontermcount() {
        for ast in &lang.grammar {
            if lang.token_of(ast.lhs) != token {
                continue;
            }
            let index = (token - termcount) as usize;
            if productions.lhsindex[index] == 0 {
                productions.lhsindex[index] = productions.count() + 1;
            }
            for alt in &ast.alts {
                let mut rhs = Vec::with_capacity(alt.items.len());
                let mut length = 0;
                for &item in &alt.items {
                    rhs.push(item);
                    let epsilon = lang.kind_of(item) == SymbolKind::Terminal
                        && lang.symbols.token(item).flags.contains(TokenFlags::EMPTY);
                    if !epsilon {
                        length = rhs.len();
                    }
                }
                productions.push(Production {
                    lhs: ast.lhs,
                    rhs,
                    length,
                    semantic: alt.semantic,
                    steps: i32::MAX,
                    insert: i32::MAX,
                });
            }
        }
    }

    // Undefined nonterminals point past the last production.
    let count = productions.count() + 1;
    for index in productions.lhsindex.iter_mut().skip(1) {
        if *index == 0 {
            *index = count;
        }
    }

    if lang.options.error_repair {
        compute_sortkeys(lang, &mut productions);
        sort_productions(&mut productions);
    }
    productions
}

/// Fixpoint of the derivation-steps and minimum-insertion keys.
fn compute_sortkeys(lang: &Language, productions: &mut Productions) {
    let termcount = lang.termcount();
    loop {
        let mut changed = false;
        for number in 1..=productions.count() {
            let mut steps = 0i32;
            let mut insert = 0i32;
            for at in 0..productions.get(number).length {
                let item = productions.get(number).rhs[at];
                if lang.kind_of(item) == SymbolKind::Nonterminal {
                    // Cheapest alternative of the nonterminal.
                    let mut minsteps = i32::MAX;
                    let mut mininsert = i32::MAX;
                    let index = (lang.token_of(item) - termcount) as usize;
                    let mut k = productions.lhsindex[index];
                    while k <= productions.count() && productions.get(k).lhs == item {
                        minsteps = minsteps.min(productions.get(k).steps);
                        mininsert = mininsert.min(productions.get(k).insert);
                        k += 1;
                    }
                    steps = saturating(steps, minsteps);
                    insert = saturating(insert, mininsert);
                } else if !lang.symbols.token(item).flags.contains(TokenFlags::EMPTY) {
                    insert = saturating(insert, lang.symbols.token(item).insert);
                }
            }

            let production = &mut productions.list[number - 1];
            if steps < i32::MAX && steps + 1 < production.steps {
                production.steps = steps + 1;
                changed = true;
            }
            if insert < production.insert {
                production.insert = insert;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

fn saturating(total: i32, step: i32) -> i32 {
    if total < i32::MAX && step < i32::MAX {
        total + step
    } else {
        i32::MAX
    }
}

/// Order each nonterminal's alternatives by `(steps, insert)` ascending, so
/// the cheapest derivation comes first.
fn sort_productions(productions: &mut Productions) {
    for index in 1..productions.lhsindex.len() {
        let mut j = productions.lhsindex[index];
        if j > productions.count() {
            continue;
        }
        let lhs = productions.get(j).lhs;
        while j <= productions.count() && productions.get(j).lhs == lhs {
            let mut min = j;
            let mut k = j + 1;
            while k <= productions.count() && productions.get(k).lhs == lhs {
                let better = productions.get(k).steps < productions.get(min).steps
                    || (productions.get(k).steps == productions.get(min).steps
                        && productions.get(k).insert < productions.get(min).insert);
                if better {
                    min = k;
                }
                k += 1;
            }
            if j != min {
                productions.list.swap(j - 1, min - 1);
            }
            j += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_language;

    #[test]
    fn trailing_epsilon_terminals_shrink_effective_length() {
        let source = r#"
            IDENT effective;
            OPTIONS ERRORREPAIR;
            SCANNER
                "a" = 'a';
                "mark" = ;
            PARSER
                <s> = "a" "mark";
        "#;
        let mut lang = parse_language(source.as_bytes()).unwrap();
        let productions = build_productions(&mut lang);
        // Production 2 is <s>: raw RHS keeps both symbols, the effective
        // length stops before the epsilon terminal.
        assert_eq!(productions.get(2).rhs.len(), 2);
        assert_eq!(productions.get(2).length, 1);
    }

    #[test]
    fn alternatives_sort_cheapest_first() {
        let source = r#"
            IDENT cheapest;
            OPTIONS ERRORREPAIR;
            SCANNER
                "a" = 'a', INSERT=5;
                "b" = 'b', INSERT=1;
            PARSER
                <s> = "a" <s> "a"
                    | "b";
        "#;
        let mut lang = parse_language(source.as_bytes()).unwrap();
        let productions = build_productions(&mut lang);
        // <s> -> "b" derives in one step at cost 1 and must sort ahead of
        // the recursive alternative.
        assert_eq!(productions.get(2).rhs.len(), 1);
        assert_eq!(productions.get(2).insert, 1);
        assert_eq!(productions.get(3).rhs.len(), 3);
    }
}
