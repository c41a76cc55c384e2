//! The uncompressed (type 0) tables file.
//!
//! This is the generator's direct output: full scanner transition rows and
//! full parser action rows, whitespace-separated and wrapped at 80 columns,
//! carrying everything the packer needs to produce the compressed form the
//! runtime interprets.

use crate::grammar::Productions;
use crate::lalr::ParserTables;
use crate::language::Language;
use crate::scanner::ScannerTables;
use crate::symbol::{SymbolKind, TokenFlags};
use sdgen_runtime::tables::{
    digit_count, write_string, write_table, TableReader, ACCEPT_OFFSET, MAP_COUNT, MAX_LINE,
    SHIFT_OFFSET,
};
use sdgen_runtime::TablesError;
use std::io::{BufRead, Write};

/// The complete uncompressed table set. Per-state and per-token arrays are
/// stored base 1 with a padding entry at index 0.
#[derive(Debug, Default)]
pub struct RawTables {
    pub name: String,
    pub tnumber: i32,
    pub ntokens: i32,
    pub snumber: i32,
    pub ntnumber: i32,
    pub gnumber: i32,
    pub pnumber: i32,
    pub context: i32,
    pub defcost: i32,

    pub tokenindex: Vec<i32>,
    pub tokentable: Vec<i32>,
    pub finals: Vec<i32>,
    pub install: Vec<i32>,
    /// Full scanner transition rows, `MAP_COUNT` columns each.
    pub strans: Vec<Vec<i32>>,

    pub inscost: Vec<i32>,
    pub delcost: Vec<i32>,
    pub lhsymbol: Vec<i32>,
    pub rhslength: Vec<i32>,
    pub semantics: Vec<i32>,
    pub repair: Vec<i32>,
    pub stringindex: Vec<i32>,
    pub stringtable: String,
    /// Full parser action rows; column 0 of each row is unused.
    pub actions: Vec<Vec<i32>>,
}

/// Collect generator results into one uncompressed table set.
pub fn assemble(
    lang: &Language,
    scanner: &ScannerTables,
    parser: &ParserTables,
    productions: &Productions,
) -> RawTables {
    let tnumber = lang.termcount();
    let ntnumber = lang.nontermcount();
    let gnumber = productions.count() as i32;
    let pnumber = parser.count() as i32;

    debug_assert!(gnumber < SHIFT_OFFSET, "production count exceeds encoding");
    debug_assert!(pnumber < -ACCEPT_OFFSET, "state count exceeds encoding");

    let mut raw = RawTables {
        name: lang.name.clone(),
        tnumber,
        ntokens: lang.ntokens,
        snumber: scanner.count as i32,
        ntnumber,
        gnumber,
        pnumber,
        context: lang.options.context,
        defcost: lang.options.default_cost,
        tokenindex: scanner.tokenindex.clone(),
        tokentable: scanner.tokentable.clone(),
        finals: scanner.finals.clone(),
        install: scanner.install.clone(),
        strans: scanner.trans.clone(),
        ..RawTables::default()
    };

    raw.inscost.push(0);
    raw.delcost.push(0);
    for token in 1..=tnumber {
        let value = lang.symbols.token(lang.token_symbol(token));
        raw.inscost.push(value.insert);
        raw.delcost.push(value.delete);
    }

    raw.lhsymbol.push(0);
    raw.rhslength.push(0);
    raw.semantics.push(0);
    for number in 1..=productions.count() {
        let production = productions.get(number);
        raw.lhsymbol.push(lang.token_of(production.lhs));
        // The popped length counts the non-epsilon symbols of the RHS.
        let length = production.rhs[..production.length]
            .iter()
            .filter(|&&symbol| {
                lang.kind_of(symbol) != SymbolKind::Terminal
                    || !lang.symbols.token(symbol).flags.contains(TokenFlags::EMPTY)
            })
            .count();
        raw.rhslength.push(length as i32);
        raw.semantics.push(production.semantic);
    }

    raw.repair = parser.errortoken.clone();

    raw.stringindex.push(0);
    let mut table = String::new();
    for token in 1..=tnumber + ntnumber {
        raw.stringindex.push(table.len() as i32);
        table.push_str(&lang.symbols.get(lang.token_symbol(token)).name);
    }
    raw.stringindex.push(table.len() as i32);
    raw.stringtable = table;

    raw.actions = parser.lrstates.clone();
    raw
}

/// Width of the widest entry in a sparse row table, with the sign widening
/// rule shared by every text table.
fn row_width(rows: &[Vec<i32>]) -> usize {
    let mut width = 0;
    for row in rows {
        for (column, &value) in row.iter().enumerate() {
            width = width.max(column as i32);
            if value < 0 {
                width = width.max(-value * 10);
            } else {
                width = width.max(value);
            }
        }
    }
    digit_count(width)
}

/// Write sparse rows: a count line, then `(index, value)` pairs for the
/// non-zero cells, wrapped at the table line width.
fn write_rows<W: Write>(
    rows: &[Vec<i32>],
    one_based: bool,
    out: &mut W,
) -> std::io::Result<()> {
    let width = row_width(rows);
    for row in rows {
        let columns = if one_based { &row[1..] } else { &row[..] };
        let offset = usize::from(one_based);
        let pairs: Vec<(usize, i32)> = columns
            .iter()
            .enumerate()
            .filter(|&(_, &value)| value != 0)
            .map(|(column, &value)| (column + offset, value))
            .collect();

        writeln!(out, "{}", pairs.len())?;
        let mut length = 0;
        let mut full = false;
        for (i, &(column, value)) in pairs.iter().enumerate() {
            if length + 2 * width + 1 > MAX_LINE || full {
                writeln!(out)?;
                full = false;
                length = 0;
            }
            write!(out, "{:width$} {:width$}", column, value)?;
            length += 2 * width + 1;
            if i + 1 < pairs.len() && length + 2 * width + 2 <= MAX_LINE {
                write!(out, " ")?;
                length += 1;
            } else {
                full = true;
            }
        }
        if length > 0 {
            writeln!(out)?;
        }
    }
    Ok(())
}

/// Write the uncompressed tables file.
pub fn write_uncompressed<W: Write>(raw: &RawTables, out: &mut W) -> std::io::Result<()> {
    writeln!(
        out,
        "0 {} {} {} {} {} {} {} {} {}",
        raw.tnumber,
        raw.ntokens,
        raw.snumber,
        raw.ntnumber,
        raw.gnumber,
        raw.pnumber,
        raw.context,
        raw.defcost,
        raw.name,
    )?;
    write_table(&raw.tokenindex[1..], out)?;
    write_table(&raw.tokentable, out)?;
    write_table(&raw.finals[1..], out)?;
    write_table(&raw.install[1..], out)?;
    write_rows(&raw.strans[1..], false, out)?;
    write_table(&raw.inscost[1..], out)?;
    write_table(&raw.delcost[1..], out)?;
    write_table(&raw.lhsymbol[1..], out)?;
    write_table(&raw.rhslength[1..], out)?;
    write_table(&raw.semantics[1..], out)?;
    write_table(&raw.repair[1..], out)?;
    write_table(&raw.stringindex[1..], out)?;
    write_string(&raw.stringtable, out)?;
    write_rows(&raw.actions[1..], true, out)?;
    Ok(())
}

/// Read the uncompressed tables file back.
pub fn read_uncompressed<R: BufRead>(reader: R) -> Result<RawTables, TablesError> {
    let mut input = TableReader::new(reader)?;

    if input.int()? != 0 {
        return Err(TablesError::WrongType);
    }
    let mut raw = RawTables {
        tnumber: input.int()?,
        ntokens: input.int()?,
        snumber: input.int()?,
        ntnumber: input.int()?,
        gnumber: input.int()?,
        pnumber: input.int()?,
        context: input.int()?,
        defcost: input.int()?,
        ..RawTables::default()
    };
    raw.name = input.word()?;

    raw.tokenindex = input.table(raw.snumber as usize + 1, 1)?;
    let length = *raw.tokenindex.last().unwrap() as usize;
    raw.tokentable = input.table(length, 0)?;
    raw.finals = input.table(raw.snumber as usize, 1)?;
    raw.install = input.table(raw.snumber as usize, 1)?;

    raw.strans.push(Vec::new());
    for _ in 0..raw.snumber {
        let mut row = vec![0i32; MAP_COUNT];
        let count = input.int()?;
        for _ in 0..count {
            let column = input.int()? as usize;
            let value = input.int()?;
            row[column] = value;
        }
        raw.strans.push(row);
    }

    raw.inscost = input.table(raw.tnumber as usize, 1)?;
    raw.delcost = input.table(raw.tnumber as usize, 1)?;
    raw.lhsymbol = input.table(raw.gnumber as usize, 1)?;
    raw.rhslength = input.table(raw.gnumber as usize, 1)?;
    raw.semantics = input.table(raw.gnumber as usize, 1)?;
    raw.repair = input.table(raw.pnumber as usize, 1)?;
    raw.stringindex = input.table((raw.tnumber + raw.ntnumber) as usize + 1, 1)?;
    let length = *raw.stringindex.last().unwrap() as usize;
    raw.stringtable = input.string_block(length)?;

    let columns = (raw.tnumber + raw.ntnumber) as usize + 1;
    raw.actions.push(Vec::new());
    for _ in 0..raw.pnumber {
        let mut row = vec![0i32; columns];
        let count = input.int()?;
        for _ in 0..count {
            let token = input.int()? as usize;
            let value = input.int()?;
            row[token] = value;
        }
        raw.actions.push(row);
    }

    Ok(raw)
}
