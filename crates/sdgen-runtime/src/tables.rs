//! The persisted scanner/parser tables.
//!
//! Tables travel as a whitespace-separated text file. The generator emits an
//! uncompressed file (header type 0) holding the full transition matrices;
//! the packer rewrites it as this compressed form (header type 1), which is
//! the only form the runtime interprets. Every per-state and per-token array
//! is stored base-1: element 0 is a padding entry so that the 1-based state
//! and token numbers used throughout the toolchain index directly.

use crate::TablesError;
use std::io::{BufRead, Write};

/// Shift actions are encoded as `SHIFT_OFFSET + state`. Shift-reduce actions
/// are the bare production number, which must stay below `SHIFT_OFFSET`.
/// Reduce actions are the negated production number, which must stay above
/// `ACCEPT_OFFSET`. Accept is exactly `ACCEPT_OFFSET` and error is 0.
pub const SHIFT_OFFSET: i32 = 10_000;
pub const ACCEPT_OFFSET: i32 = -10_000;

/// Scanner transition columns: every byte value plus end of file.
pub const MAP_COUNT: usize = 256 + 1;

/// The pseudo-character delivered at end of input.
pub const ENDFILE: i32 = 256;

/// Output line width for the text table formats.
pub const MAX_LINE: usize = 80;

/// Compressed scanner and parser tables for one generated language.
#[derive(Debug, Clone)]
pub struct Tables {
    pub name: String,
    /// Number of terminals known to the parser.
    pub tnumber: i32,
    /// Number of scanner tokens including ignored regexes.
    pub ntokens: i32,
    /// Number of scanner states.
    pub snumber: i32,
    /// Number of nonterminals.
    pub ntnumber: i32,
    /// Number of productions.
    pub gnumber: i32,
    /// Number of parser states.
    pub pnumber: i32,
    /// Number of forward context tokens examined by error repair.
    pub context: i32,
    /// Assumed cost of a repair beyond the context window.
    pub defcost: i32,

    /// Index into `tokentable` per scanner state; entry `snumber + 1` fences
    /// the final run.
    pub tokenindex: Vec<i32>,
    /// Concatenated token numbers whose end-of-match location must be
    /// recorded while passing through each state.
    pub tokentable: Vec<i32>,
    /// Accepted token per scanner state, 0 if not final.
    pub finals: Vec<i32>,
    /// Per-state flag: the matched text must be captured and installed.
    pub install: Vec<i32>,

    /// Default state chain for the compressed scanner.
    pub sdefault: Vec<i32>,
    pub sbase: Vec<i32>,
    pub scheck: Vec<i32>,
    pub snext: Vec<i32>,

    /// Per-terminal repair costs.
    pub inscost: Vec<i32>,
    pub delcost: Vec<i32>,

    /// Per-production left hand side token, effective RHS length, and
    /// semantic routine number.
    pub lhsymbol: Vec<i32>,
    pub rhslength: Vec<i32>,
    pub semantics: Vec<i32>,

    /// Continuation automaton value per parser state: positive shifts that
    /// terminal, negative reduces by that production, 0 means no repair.
    pub repair: Vec<i32>,

    /// Name table: `stringindex[t] .. stringindex[t + 1]` spans token `t`'s
    /// name inside `stringtable`.
    pub stringindex: Vec<i32>,
    pub stringtable: String,

    /// First-fit compressed parser actions.
    pub pbase: Vec<i32>,
    pub pcheck: Vec<i32>,
    pub pnext: Vec<i32>,
}

/// A decoded parsing action for a terminal lookahead.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    Shift(i32),
    ShiftReduce(i32),
    Reduce(i32),
    Error,
}

/// A decoded parsing action for a nonterminal produced by a reduce. The
/// entry is valid by construction, so the only outcomes are a shift, the
/// shift half of a shift-reduce, or acceptance.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GotoAction {
    Shift(i32),
    ShiftReduce(i32),
    Accept,
}

impl Tables {
    /// Decode the parsing action for a state and terminal lookahead.
    pub fn action(&self, state: i32, token: i32) -> Action {
        let entry = (self.pbase[state as usize] + token) as usize;
        if self.pcheck.get(entry).copied() != Some(state) {
            return Action::Error;
        }
        let next = self.pnext[entry];
        if next < 0 {
            Action::Reduce(-next)
        } else if next > SHIFT_OFFSET {
            Action::Shift(next - SHIFT_OFFSET)
        } else {
            Action::ShiftReduce(next)
        }
    }

    /// Decode the parsing action for a state and the nonterminal just
    /// recognized by a reduce.
    pub fn goto_action(&self, state: i32, token: i32) -> GotoAction {
        let entry = (self.pbase[state as usize] + token) as usize;
        debug_assert_eq!(self.pcheck.get(entry).copied(), Some(state));
        let next = self.pnext.get(entry).copied().unwrap_or(0);
        if next > SHIFT_OFFSET {
            GotoAction::Shift(next - SHIFT_OFFSET)
        } else if next > 0 {
            GotoAction::ShiftReduce(next)
        } else {
            GotoAction::Accept
        }
    }

    /// Follow the scanner default chain for a state/character pair. Returns
    /// the next state, or 0 when no transition exists.
    pub fn scan_next(&self, mut state: i32, ch: i32) -> i32 {
        while state != 0 {
            let entry = (self.sbase[state as usize] + ch) as usize;
            if self.scheck.get(entry).copied() == Some(state) {
                return self.snext[entry];
            }
            state = self.sdefault[state as usize];
        }
        0
    }

    /// The name of a terminal or nonterminal token.
    pub fn token_name(&self, token: i32) -> &str {
        let start = self.stringindex[token as usize] as usize;
        let end = self.stringindex[token as usize + 1] as usize;
        &self.stringtable[start..end]
    }

    /// Read tables in the compressed (type 1) format.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, TablesError> {
        let mut input = TableReader::new(reader)?;

        if input.int()? != 1 {
            return Err(TablesError::WrongType);
        }
        let tnumber = input.int()?;
        let ntokens = input.int()?;
        let snumber = input.int()?;
        let ntnumber = input.int()?;
        let gnumber = input.int()?;
        let pnumber = input.int()?;
        let context = input.int()?;
        let defcost = input.int()?;
        let name = input.word()?;

        let tokenindex = input.table(snumber as usize + 1, 1)?;
        let length = *tokenindex.last().unwrap() as usize;
        let tokentable = input.table(length, 0)?;
        let finals = input.table(snumber as usize, 1)?;
        let install = input.table(snumber as usize, 1)?;
        let sdefault = input.table(snumber as usize, 1)?;
        let sbase = input.table(snumber as usize, 1)?;
        let length = input.int()? as usize;
        let scheck = input.table(length, 0)?;
        let snext = input.table(length, 0)?;

        let inscost = input.table(tnumber as usize, 1)?;
        let delcost = input.table(tnumber as usize, 1)?;
        let lhsymbol = input.table(gnumber as usize, 1)?;
        let rhslength = input.table(gnumber as usize, 1)?;
        let semantics = input.table(gnumber as usize, 1)?;
        let repair = input.table(pnumber as usize, 1)?;

        let stringindex = input.table((tnumber + ntnumber) as usize + 1, 1)?;
        let length = *stringindex.last().unwrap() as usize;
        let stringtable = input.string_block(length)?;

        let pbase = input.table(pnumber as usize, 1)?;
        let length = input.int()? as usize;
        let pcheck = input.table(length, 1)?;
        let pnext = input.table(length, 1)?;

        Ok(Tables {
            name,
            tnumber,
            ntokens,
            snumber,
            ntnumber,
            gnumber,
            pnumber,
            context,
            defcost,
            tokenindex,
            tokentable,
            finals,
            install,
            sdefault,
            sbase,
            scheck,
            snext,
            inscost,
            delcost,
            lhsymbol,
            rhslength,
            semantics,
            repair,
            stringindex,
            stringtable,
            pbase,
            pcheck,
            pnext,
        })
    }

    /// Write tables in the compressed (type 1) format.
    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(
            out,
            "1 {} {} {} {} {} {} {} {} {}",
            self.tnumber,
            self.ntokens,
            self.snumber,
            self.ntnumber,
            self.gnumber,
            self.pnumber,
            self.context,
            self.defcost,
            self.name,
        )?;
        write_table(&self.tokenindex[1..], out)?;
        write_table(&self.tokentable, out)?;
        write_table(&self.finals[1..], out)?;
        write_table(&self.install[1..], out)?;
        write_table(&self.sdefault[1..], out)?;
        write_table(&self.sbase[1..], out)?;
        writeln!(out, "{}", self.scheck.len())?;
        write_table(&self.scheck, out)?;
        write_table(&self.snext, out)?;
        write_table(&self.inscost[1..], out)?;
        write_table(&self.delcost[1..], out)?;
        write_table(&self.lhsymbol[1..], out)?;
        write_table(&self.rhslength[1..], out)?;
        write_table(&self.semantics[1..], out)?;
        write_table(&self.repair[1..], out)?;
        write_table(&self.stringindex[1..], out)?;
        write_string(&self.stringtable, out)?;
        write_table(&self.pbase[1..], out)?;
        writeln!(out, "{}", self.pcheck.len() - 1)?;
        write_table(&self.pcheck[1..], out)?;
        write_table(&self.pnext[1..], out)?;
        Ok(())
    }
}

/// Number of decimal digits needed for a non-negative value.
pub fn digit_count(mut value: i32) -> usize {
    let mut count = 1;
    while value >= 10 {
        value /= 10;
        count += 1;
    }
    count
}

/// Write a table of integers wrapped at [`MAX_LINE`] columns. Negative
/// entries widen the field by one column for the minus sign.
pub fn write_table<W: Write>(table: &[i32], out: &mut W) -> std::io::Result<()> {
    let mut width = 0;
    for &value in table {
        let value = if value < 0 { -value * 10 } else { value };
        width = width.max(value);
    }
    let width = digit_count(width);

    let mut length = 0;
    let mut full = false;
    for (i, &value) in table.iter().enumerate() {
        if length + width > MAX_LINE || full {
            writeln!(out)?;
            full = false;
            length = 0;
        }
        write!(out, "{:width$}", value)?;
        length += width;
        if i + 1 < table.len() && length + 1 + width <= MAX_LINE {
            write!(out, " ")?;
            length += 1;
        } else {
            full = true;
        }
    }
    if length > 0 {
        writeln!(out)?;
    }
    Ok(())
}

/// Write a concatenated-name string as a line-width header followed by the
/// raw text chopped into lines.
pub fn write_string<W: Write>(string: &str, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "{}", MAX_LINE)?;
    let bytes = string.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let end = (i + MAX_LINE).min(bytes.len());
        out.write_all(&bytes[i..end])?;
        writeln!(out)?;
        i = end;
    }
    Ok(())
}

/// A whitespace-separated integer scanner over a fully buffered tables file.
pub struct TableReader {
    data: Vec<u8>,
    pos: usize,
}

impl TableReader {
    pub fn new<R: BufRead>(mut reader: R) -> Result<Self, TablesError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(TableReader { data, pos: 0 })
    }

    fn skip_space(&mut self) {
        while self
            .data
            .get(self.pos)
            .is_some_and(|ch| ch.is_ascii_whitespace())
        {
            self.pos += 1;
        }
    }

    pub fn int(&mut self) -> Result<i32, TablesError> {
        self.skip_space();
        let start = self.pos;
        if self.data.get(self.pos) == Some(&b'-') {
            self.pos += 1;
        }
        while self.data.get(self.pos).is_some_and(u8::is_ascii_digit) {
            self.pos += 1;
        }
        std::str::from_utf8(&self.data[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(TablesError::Malformed)
    }

    pub fn word(&mut self) -> Result<String, TablesError> {
        self.skip_space();
        let start = self.pos;
        while self
            .data
            .get(self.pos)
            .is_some_and(|ch| !ch.is_ascii_whitespace())
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(TablesError::Malformed);
        }
        String::from_utf8(self.data[start..self.pos].to_vec()).map_err(|_| TablesError::Malformed)
    }

    /// Read `size` integers. With `base` 1 a padding zero is prepended so
    /// the result can be indexed by 1-based state and token numbers.
    pub fn table(&mut self, size: usize, base: usize) -> Result<Vec<i32>, TablesError> {
        let mut table = Vec::with_capacity(size + base);
        table.resize(base, 0);
        for _ in 0..size {
            table.push(self.int()?);
        }
        Ok(table)
    }

    /// Read a concatenated-name string: a line-width header, then `length`
    /// characters spread over width-limited lines.
    pub fn string_block(&mut self, length: usize) -> Result<String, TablesError> {
        let line_width = self.int()? as usize;
        // Skip the rest of the header line.
        while self.data.get(self.pos).is_some_and(|&ch| ch != b'\n') {
            self.pos += 1;
        }
        self.pos += 1;

        let mut string = Vec::with_capacity(length);
        let mut line = 0;
        while string.len() < length {
            let &ch = self.data.get(self.pos).ok_or(TablesError::Malformed)?;
            self.pos += 1;
            if line >= line_width {
                if ch == b'\n' {
                    line = 0;
                }
                continue;
            }
            if ch == b'\n' {
                line = 0;
                continue;
            }
            string.push(ch);
            line += 1;
        }
        String::from_utf8(string).map_err(|_| TablesError::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_wrapping_round_trips() {
        let table: Vec<i32> = (0..200).map(|i| (i * 37) % 1000 - 250).collect();
        let mut out = Vec::new();
        write_table(&table, &mut out).unwrap();
        for line in out.split(|&ch| ch == b'\n') {
            assert!(line.len() <= MAX_LINE);
        }
        let mut reader = TableReader::new(&out[..]).unwrap();
        let read = reader.table(table.len(), 0).unwrap();
        assert_eq!(read, table);
    }

    #[test]
    fn string_block_round_trips() {
        let text: String = std::iter::repeat("terminal<nonterminal>")
            .take(12)
            .collect();
        let mut out = Vec::new();
        write_string(&text, &mut out).unwrap();
        let mut reader = TableReader::new(&out[..]).unwrap();
        assert_eq!(reader.string_block(text.len()).unwrap(), text);
    }
}
