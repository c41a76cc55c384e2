//! The language description being generated.
//!
//! A [`Language`] aggregates everything the input file declares: the symbol
//! store, scanner rules, the grammar, and configuration. Grammar-building
//! errors clear the `process` flag instead of stopping the run, so listings
//! and debug output still complete; table emission is suppressed.

use crate::regex::TreeNode;
use crate::symbol::{SymbolId, SymbolKind, SymbolTable};

/// Options selected in the input file, plus the repair parameters from the
/// DEFAULT section.
#[derive(Debug, Clone)]
pub struct Options {
    /// Resolve shift-reduce conflicts by precedence and associativity.
    pub ambiguous: bool,
    /// Generate error repair tables.
    pub error_repair: bool,
    /// Fuse shift+reduce into shift-reduce actions to shrink the tables.
    pub default_reduce: bool,
    /// Split states to resolve reduce-reduce conflicts.
    pub split_states: bool,
    /// Number of forward context tokens weighed by error repair.
    pub context: i32,
    /// Assumed cost of a repair beyond the context window.
    pub default_cost: i32,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            ambiguous: false,
            error_repair: false,
            default_reduce: false,
            split_states: false,
            context: 0,
            default_cost: 0,
        }
    }
}

/// One scanner rule: a regex tree ending at a terminal. Ignored rules hang
/// off placeholder terminals whose token number is 0.
#[derive(Debug, Clone)]
pub struct ScannerRule {
    pub tree: TreeNode,
    pub symbol: SymbolId,
}

/// One grammar production as written: a left hand side with its alternative
/// right hand sides.
#[derive(Debug, Clone)]
pub struct ProductionAst {
    pub lhs: SymbolId,
    pub alts: Vec<AltAst>,
}

/// One alternative right hand side with its semantic-action number.
#[derive(Debug, Clone, Default)]
pub struct AltAst {
    pub items: Vec<SymbolId>,
    pub semantic: i32,
}

#[derive(Debug, Default)]
pub struct Language {
    pub symbols: SymbolTable,
    pub options: Options,
    pub name: String,
    pub title: String,

    /// Terminals in token-number order; `terms[0]` is token 1.
    pub terms: Vec<SymbolId>,
    /// Nonterminals in token-number order; `nonterms[0]` is token
    /// `termcount + 1`.
    pub nonterms: Vec<SymbolId>,
    /// Scanner token count including ignored regexes.
    pub ntokens: i32,

    pub scanner: Vec<ScannerRule>,
    pub grammar: Vec<ProductionAst>,

    /// The user start symbol.
    pub start: Option<SymbolId>,
    /// The synthesized end-of-file terminal.
    pub sentinel: Option<SymbolId>,
    /// The synthesized goal nonterminal of the augmented grammar.
    pub goal: Option<SymbolId>,

    /// False once a grammar-building error has been recorded.
    pub process: bool,
    pub diagnostics: Vec<String>,
}

impl Language {
    pub fn new() -> Self {
        Language {
            process: true,
            ..Language::default()
        }
    }

    pub fn termcount(&self) -> i32 {
        self.terms.len() as i32
    }

    pub fn nontermcount(&self) -> i32 {
        self.nonterms.len() as i32
    }

    /// The symbol carrying a terminal or nonterminal token number.
    pub fn token_symbol(&self, token: i32) -> SymbolId {
        if token <= self.termcount() {
            self.terms[token as usize - 1]
        } else {
            self.nonterms[(token - self.termcount()) as usize - 1]
        }
    }

    pub fn token_of(&self, id: SymbolId) -> i32 {
        self.symbols.token(id).token
    }

    pub fn kind_of(&self, id: SymbolId) -> SymbolKind {
        self.symbols.get(id).kind
    }

    /// Record a grammar-building error and suppress table emission.
    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(%message, "grammar error");
        self.diagnostics.push(message);
        self.process = false;
    }

    /// Record a warning without affecting table emission.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.diagnostics.push(message.into());
    }
}
