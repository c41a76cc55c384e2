//! Human-readable listings and debug dumps.
//!
//! Every listing is assembled from [`Fragment`]s: deferred pieces of output
//! that render straight into the caller's formatter, so symbols, items, and
//! whole tables nest inside `write!` without intermediate strings.

use crate::grammar::Productions;
use crate::lalr::{Collection, FirstSets};
use crate::language::Language;
use crate::regex::TreeNode;
use crate::symbol::{SymbolId, SymbolKind, SymbolTable};
use sdgen_runtime::tables::{ACCEPT_OFFSET, SHIFT_OFFSET};
use std::fmt;

/// A piece of a listing, rendered on demand by the closure it wraps.
struct Fragment<F>(F);

impl<F> fmt::Display for Fragment<F>
where
    F: Fn(&mut fmt::Formatter<'_>) -> fmt::Result,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self.0)(f)
    }
}

fn fragment<F>(render: F) -> Fragment<F>
where
    F: Fn(&mut fmt::Formatter<'_>) -> fmt::Result,
{
    Fragment(render)
}

/// A symbol as the listings spell it: nonterminals in angle brackets,
/// terminals quoted (with single quotes when the name itself has a double
/// quote).
fn display_symbol<'a>(table: &'a SymbolTable, id: SymbolId) -> impl fmt::Display + 'a {
    fragment(move |f| {
        let data = table.get(id);
        match data.kind {
            SymbolKind::Nonterminal => write!(f, "<{}>", data.name),
            _ => {
                if data.name.contains('"') {
                    write!(f, "'{}'", data.name)
                } else {
                    write!(f, "\"{}\"", data.name)
                }
            }
        }
    })
}

fn item_line<'a>(
    lang: &'a Language,
    productions: &'a Productions,
    prod: usize,
    dot: usize,
) -> impl fmt::Display + 'a {
    fragment(move |f| {
        let production = productions.get(prod);
        write!(f, "{} -->", display_symbol(&lang.symbols, production.lhs))?;
        for (i, &symbol) in production.rhs.iter().enumerate() {
            if i == dot {
                write!(f, " .")?;
            }
            write!(f, " {}", display_symbol(&lang.symbols, symbol))?;
        }
        if dot != usize::MAX && dot >= production.rhs.len() {
            write!(f, " .")?;
        }
        Ok(())
    })
}

/// The standardized grammar productions (`-g`).
pub fn display_productions<'a>(
    lang: &'a Language,
    productions: &'a Productions,
) -> impl fmt::Display + 'a {
    fragment(move |f| {
        writeln!(
            f,
            "{}\t{}\tStandardized Grammar Productions",
            lang.name, lang.title
        )?;
        for number in 1..=productions.count() {
            let production = productions.get(number);
            write!(f, "{:4}.  ", number)?;
            if lang.options.error_repair {
                write!(f, "{:5} {:6}  ", production.steps, production.insert)?;
            }
            write!(f, "{:5}  ", production.semantic)?;
            writeln!(f, "{}", item_line(lang, productions, number, usize::MAX))?;
        }
        Ok(())
    })
}

/// The token regular expressions (`-r`).
pub fn display_regexes(lang: &Language) -> impl fmt::Display + '_ {
    fragment(move |f| {
        writeln!(f, "{}\t{}\tToken Regular Expressions", lang.name, lang.title)?;
        for rule in &lang.scanner {
            writeln!(
                f,
                "{:5}.  {} = {}",
                lang.token_of(rule.symbol),
                display_symbol(&lang.symbols, rule.symbol),
                display_tree(&rule.tree)
            )?;
        }
        Ok(())
    })
}

fn display_tree(tree: &TreeNode) -> impl fmt::Display + '_ {
    fragment(move |f| format_tree(tree, f))
}

fn format_tree(tree: &TreeNode, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match tree {
        TreeNode::Epsilon => write!(f, "\"\""),
        TreeNode::Lookahead => write!(f, "/"),
        TreeNode::Reference(_) => write!(f, "<ref>"),
        TreeNode::Character(bytes) => {
            write!(f, "'")?;
            for &byte in bytes {
                if byte.is_ascii_graphic() || byte == b' ' {
                    write!(f, "{}", byte as char)?;
                } else {
                    write!(f, "\\{:03o}", byte)?;
                }
            }
            write!(f, "'")
        }
        TreeNode::Class(bits) => {
            write!(f, "[")?;
            let mut run: Option<(u8, u8)> = None;
            let mut emit = |f: &mut fmt::Formatter<'_>, run: (u8, u8)| -> fmt::Result {
                let show = |f: &mut fmt::Formatter<'_>, byte: u8| -> fmt::Result {
                    if byte.is_ascii_graphic() {
                        write!(f, "{}", byte as char)
                    } else {
                        write!(f, "\\{:03o}", byte)
                    }
                };
                show(f, run.0)?;
                if run.1 > run.0 {
                    write!(f, "-")?;
                    show(f, run.1)?;
                }
                Ok(())
            };
            for byte in bits.iter() {
                run = match run {
                    Some((low, high)) if byte == high + 1 => Some((low, byte)),
                    Some(done) => {
                        emit(f, done)?;
                        Some((byte, byte))
                    }
                    None => Some((byte, byte)),
                };
            }
            if let Some(done) = run {
                emit(f, done)?;
            }
            write!(f, "]")
        }
        TreeNode::ZeroByte => write!(f, "NUL"),
        TreeNode::EndOfFile => write!(f, "EOF"),
        TreeNode::Semantic(number) => write!(f, "#{}", number),
        TreeNode::Concat(children) => {
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                format_tree(child, f)?;
            }
            Ok(())
        }
        TreeNode::Alt(children) => {
            write!(f, "(")?;
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    write!(f, " | ")?;
                }
                format_tree(child, f)?;
            }
            write!(f, ")")
        }
        TreeNode::Star(child) => {
            write!(f, "(")?;
            format_tree(child, f)?;
            write!(f, ")*")
        }
        TreeNode::Plus(child) => {
            write!(f, "(")?;
            format_tree(child, f)?;
            write!(f, ")+")
        }
        TreeNode::Diff(left, right) => {
            format_tree(left, f)?;
            write!(f, " - ")?;
            format_tree(right, f)
        }
        TreeNode::Complement(child) => {
            write!(f, "~")?;
            format_tree(child, f)
        }
        TreeNode::Range(low, high) => {
            format_tree(low, f)?;
            write!(f, " : ")?;
            format_tree(high, f)
        }
        TreeNode::Repeat(child, low, high) => {
            write!(f, "{{ ")?;
            format_tree(child, f)?;
            write!(f, " }} {} : {}", low, high)
        }
    }
}

/// The nonterminal first sets (`-df`).
pub fn display_first<'a>(lang: &'a Language, first: &'a FirstSets) -> impl fmt::Display + 'a {
    fragment(move |f| {
        writeln!(f, "{}\t{}\tNonterminal First Sets", lang.name, lang.title)?;
        for index in 1..=lang.nontermcount() {
            let token = lang.termcount() + index;
            let entry = first.get(token);
            write!(
                f,
                "{:4}.  {}  {} [",
                token,
                if entry.nullable { 'N' } else { ' ' },
                display_symbol(&lang.symbols, lang.token_symbol(token))
            )?;
            for (i, symbol) in entry.symbols.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", display_symbol(&lang.symbols, symbol))?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    })
}

/// The canonical collection of LR items with lookaheads (`-di`).
pub fn display_collection<'a>(
    lang: &'a Language,
    productions: &'a Productions,
    collection: &'a Collection,
) -> impl fmt::Display + 'a {
    fragment(move |f| {
        writeln!(
            f,
            "{}\t{}\tCanonical Collection of LR Items",
            lang.name, lang.title
        )?;
        for i in 1..collection.states.len() {
            let state = &collection.states[i];
            writeln!(f, "{:5}.", i)?;
            for (j, item) in state.items.iter().enumerate() {
                write!(f, "       {}", item_line(lang, productions, item.prod, item.dot))?;
                if !item.lookahead.is_empty() {
                    write!(f, ", [")?;
                    for (k, symbol) in item.lookahead.iter().enumerate() {
                        if k > 0 {
                            write!(f, " ")?;
                        }
                        write!(f, "{}", display_symbol(&lang.symbols, symbol))?;
                    }
                    write!(f, "]")?;
                }
                writeln!(f)?;
                if j + 1 == state.kernel && state.items.len() > state.kernel {
                    writeln!(f, "       ---")?;
                }
            }
            for entry in &state.gotos {
                writeln!(
                    f,
                    "       Goto state {} on {}",
                    entry.state,
                    display_symbol(&lang.symbols, lang.token_symbol(entry.token))
                )?;
            }
            writeln!(f)?;
        }
        Ok(())
    })
}

/// Each state's ancestors and the goto symbol that led to it (`-da`).
pub fn display_ancestors<'a>(
    lang: &'a Language,
    collection: &'a Collection,
) -> impl fmt::Display + 'a {
    fragment(move |f| {
        writeln!(f, "{}\t{}\tAncestor States", lang.name, lang.title)?;
        let count = collection.states.len();
        let mut ancestors = vec![Vec::new(); count];
        let mut symbols = vec![0i32; count];
        for i in 1..count {
            for entry in &collection.states[i].gotos {
                ancestors[entry.state].push(i);
                symbols[entry.state] = entry.token;
            }
        }
        for i in 1..count {
            write!(f, "{:5}.  ", i)?;
            if symbols[i] != 0 {
                write!(
                    f,
                    "{}",
                    display_symbol(&lang.symbols, lang.token_symbol(symbols[i]))
                )?;
            }
            write!(f, "  ")?;
            for (j, ancestor) in ancestors[i].iter().enumerate() {
                if j > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", ancestor)?;
            }
            writeln!(f)?;
        }
        Ok(())
    })
}

/// The error repair values (`-de`).
pub fn display_repair<'a>(lang: &'a Language, errortoken: &'a [i32]) -> impl fmt::Display + 'a {
    fragment(move |f| {
        writeln!(f, "{}\t{}\tError Repair Values", lang.name, lang.title)?;
        for (state, &value) in errortoken.iter().enumerate().skip(1) {
            write!(f, "{:5}.  ", state)?;
            if value > 0 {
                writeln!(
                    f,
                    "Shift or shiftreduce {}",
                    display_symbol(&lang.symbols, lang.token_symbol(value))
                )?;
            } else if value < 0 {
                writeln!(f, "Reduce by production {}", -value)?;
            } else {
                writeln!(f, "Error")?;
            }
        }
        Ok(())
    })
}

/// The parse table as a matrix (`-t`).
pub fn display_table<'a>(lang: &'a Language, lrstates: &'a [Vec<i32>]) -> impl fmt::Display + 'a {
    fragment(move |f| {
        writeln!(f, "{}\t{}\tLR Parsing Tables", lang.name, lang.title)?;
        for token in 1..=lang.termcount() + lang.nontermcount() {
            write!(
                f,
                "{:20} ",
                display_symbol(&lang.symbols, lang.token_symbol(token)).to_string()
            )?;
            for row in lrstates.iter().skip(1) {
                let action = row[token as usize];
                if action > SHIFT_OFFSET {
                    write!(f, " S{:<4}", action - SHIFT_OFFSET)?;
                } else if action > 0 {
                    write!(f, " SR{:<3}", action)?;
                } else if action <= ACCEPT_OFFSET {
                    write!(f, " A    ")?;
                } else if action < 0 {
                    write!(f, " R{:<4}", -action)?;
                } else {
                    write!(f, " .    ")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    })
}

/// Token cross-reference (`-x`).
pub fn display_crossref<'a>(
    lang: &'a Language,
    productions: &'a Productions,
) -> impl fmt::Display + 'a {
    fragment(move |f| {
        writeln!(f, "{}\t{}\tToken Cross-Reference", lang.name, lang.title)?;
        let total = (lang.termcount() + lang.nontermcount()) as usize;
        let mut lhsref = vec![Vec::new(); total + 1];
        let mut rhsref = vec![Vec::new(); total + 1];
        for number in 1..=productions.count() {
            let production = productions.get(number);
            lhsref[lang.token_of(production.lhs) as usize].push(number);
            for &symbol in &production.rhs {
                rhsref[lang.token_of(symbol) as usize].push(number);
            }
        }
        for token in 1..=total as i32 {
            write!(
                f,
                "{:4}.  {}  ",
                token,
                display_symbol(&lang.symbols, lang.token_symbol(token))
            )?;
            let uses = &rhsref[token as usize];
            if token > lang.termcount() {
                let defs = &lhsref[token as usize];
                if defs.is_empty() {
                    write!(f, "Undefined")?;
                } else {
                    write!(f, "LHS")?;
                    for number in defs {
                        write!(f, " {}", number)?;
                    }
                }
                write!(f, "  ")?;
            }
            if uses.is_empty() {
                write!(f, "Unused")?;
            } else {
                write!(f, "RHS")?;
                for number in uses {
                    write!(f, " {}", number)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    })
}
