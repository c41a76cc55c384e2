//! The canonical LR(0) collection.
//!
//! States are arena entries addressed by 1-based index; state 1 holds the
//! single kernel item `[1, 0]`. Items carry their goto wiring directly:
//! `descendant` points at the kernel item reached by shifting past the dot,
//! and kernel items list the (state, item) pairs that shift into them.
//! Under error repair the closure is depth-first and kernel equality is
//! order-sensitive, because item order then selects the continuation
//! automaton.

use crate::grammar::Productions;
use crate::language::Language;
use crate::symbol::{SymbolKind, SymbolSet, TokenFlags};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Target {
    pub state: usize,
    pub item: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Item {
    pub prod: usize,
    pub dot: usize,
    /// Kernel item in the goto state created by this item.
    pub descendant: Option<Target>,
    /// Spontaneous follow set.
    pub follow: SymbolSet,
    /// Spontaneous plus propagated lookaheads.
    pub lookahead: SymbolSet,
    /// Items in other states which created this kernel item.
    pub ancestors: Vec<Target>,
    /// Items this kernel item propagates lookaheads to.
    pub update: Vec<Target>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GotoEntry {
    pub token: i32,
    pub state: usize,
}

#[derive(Debug, Clone, Default)]
pub struct State {
    /// Kernel items first, then closure items.
    pub items: Vec<Item>,
    /// Number of kernel items.
    pub kernel: usize,
    pub gotos: Vec<GotoEntry>,
}

#[derive(Debug, Default)]
pub struct Collection {
    /// Entry 0 is padding; state numbers are 1-based.
    pub states: Vec<State>,
}

impl Collection {
    pub fn count(&self) -> usize {
        self.states.len() - 1
    }
}

/// Skip over leading or trailing epsilon terminals from `dot`.
fn skip_epsilon(lang: &Language, productions: &Productions, prod: usize, mut dot: usize) -> usize {
    let rhs = &productions.get(prod).rhs;
    while dot < rhs.len() {
        let item = rhs[dot];
        if lang.kind_of(item) != SymbolKind::Terminal
            || !lang.symbols.token(item).flags.contains(TokenFlags::EMPTY)
        {
            break;
        }
        dot += 1;
    }
    dot
}

/// Add closure items until no new items are added. Depth-first under error
/// repair so the first added item lies on the continuation path.
fn apply_closure(
    lang: &Language,
    productions: &Productions,
    collection: &mut Collection,
    state: usize,
    index: usize,
) {
    let mut i = index;
    while i < collection.states[state].items.len() {
        let prod = collection.states[state].items[i].prod;
        let dot = collection.states[state].items[i].dot;

        let production = productions.get(prod);
        if dot < production.length && lang.kind_of(production.rhs[dot]) == SymbolKind::Nonterminal
        {
            let token = lang.token_of(production.rhs[dot]);
            let index = (token - lang.termcount()) as usize;

            let mut j = productions.lhsindex[index];
            while j <= productions.count() && lang.token_of(productions.get(j).lhs) == token {
                let kernel = collection.states[state].kernel;
                let present = collection.states[state].items[kernel..]
                    .iter()
                    .any(|item| item.prod == j);
                if !present {
                    let dot = skip_epsilon(lang, productions, j, 0);
                    collection.states[state].items.push(Item {
                        prod: j,
                        dot,
                        ..Item::default()
                    });

                    if lang.options.error_repair {
                        let added = collection.states[state].items.len() - 1;
                        apply_closure(lang, productions, collection, state, added);
                    }
                }
                j += 1;
            }
        }
        i += 1;
    }
}

/// Check whether a state's kernel matches a candidate goto kernel. Under
/// error repair the items must also be in the same order.
fn kernel_equal(
    lang: &Language,
    state: &State,
    candidate: &[(usize, usize)],
) -> bool {
    if state.kernel != candidate.len() {
        return false;
    }
    if lang.options.error_repair {
        state.items[..state.kernel]
            .iter()
            .zip(candidate)
            .all(|(item, &(prod, dot))| item.prod == prod && item.dot == dot)
    } else {
        candidate.iter().all(|&(prod, dot)| {
            state.items[..state.kernel]
                .iter()
                .any(|item| item.prod == prod && item.dot == dot)
        })
    }
}

/// Find or create the goto state of `state` on `token`, then wire up the
/// descendant and ancestor links.
fn lookup_goto(
    lang: &Language,
    productions: &Productions,
    collection: &mut Collection,
    state: usize,
    token: i32,
) -> usize {
    // The goto kernel: every dotted occurrence of the token advanced one
    // symbol, skipping trailing epsilon terminals.
    let mut kernel = Vec::new();
    for item in &collection.states[state].items {
        let production = productions.get(item.prod);
        if item.dot < production.length && lang.token_of(production.rhs[item.dot]) == token {
            let dot = skip_epsilon(lang, productions, item.prod, item.dot + 1);
            kernel.push((item.prod, dot));
        }
    }

    let mut target = 0;
    for i in 2..collection.states.len() {
        if kernel_equal(lang, &collection.states[i], &kernel) {
            target = i;
            break;
        }
    }
    if target == 0 {
        let items = kernel
            .iter()
            .map(|&(prod, dot)| Item {
                prod,
                dot,
                ..Item::default()
            })
            .collect::<Vec<_>>();
        collection.states.push(State {
            kernel: items.len(),
            items,
            gotos: Vec::new(),
        });
        target = collection.states.len() - 1;
        apply_closure(lang, productions, collection, target, 0);
    }

    // Wire descendants in the source and ancestors in the target. The k-th
    // advanced item of the source becomes kernel item k of the target.
    let mut k = 0;
    for j in 0..collection.states[state].items.len() {
        let prod = collection.states[state].items[j].prod;
        let dot = collection.states[state].items[j].dot;
        let production = productions.get(prod);
        if dot < production.length && lang.token_of(production.rhs[dot]) == token {
            collection.states[state].items[j].descendant = Some(Target {
                state: target,
                item: k,
            });
            collection.states[target].items[k]
                .ancestors
                .push(Target { state, item: j });
            k += 1;
        }
    }
    target
}

/// Build the canonical collection: state 1 plus the goto closure of every
/// state, suppressing goto states for default shift-reduce items.
pub fn build_collection(lang: &Language, productions: &Productions) -> Collection {
    let mut collection = Collection {
        states: vec![State::default()],
    };

    collection.states.push(State {
        items: vec![Item {
            prod: 1,
            dot: 0,
            ..Item::default()
        }],
        kernel: 1,
        gotos: Vec::new(),
    });
    apply_closure(lang, productions, &mut collection, 1, 0);

    let total = lang.termcount() + lang.nontermcount();
    let mut i = 1;
    while i < collection.states.len() {
        for token in 1..=total {
            let mut count = 0;
            let mut found = 0;
            for (j, item) in collection.states[i].items.iter().enumerate() {
                let production = productions.get(item.prod);
                if item.dot < production.length
                    && lang.token_of(production.rhs[item.dot]) == token
                {
                    found = j;
                    count += 1;
                }
            }

            // A lone item with the dot on its final symbol becomes a
            // shift-reduce action instead of a new state.
            if lang.options.default_reduce && count == 1 {
                let item = &collection.states[i].items[found];
                if item.dot == productions.get(item.prod).length - 1 {
                    continue;
                }
            }

            if count > 0 {
                let state = lookup_goto(lang, productions, &mut collection, i, token);
                collection.states[i].gotos.push(GotoEntry { token, state });
            }
        }
        i += 1;
    }

    collection
}
