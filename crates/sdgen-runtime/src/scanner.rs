//! The compressed-table scanner interpreter.

use crate::buffer::Location;
use crate::driver::{Callbacks, Driver, TokenEntry};
use crate::tables::ENDFILE;
use crate::DriverError;
use std::io::{Read, Write};

impl<R, C, W> Driver<'_, R, C, W>
where
    R: Read,
    C: Callbacks,
    W: Write,
{
    /// Read the next character, recording its location. Delivers [`ENDFILE`]
    /// once the input is exhausted.
    pub(crate) fn input_char(&mut self) -> Result<(i32, Location), DriverError> {
        let mut position = self.position;
        let more = self
            .chain
            .fill(&mut self.input, &mut position)
            .map_err(DriverError::Read)?;
        self.position = position;
        if !more {
            // End of file is hypothetically the start of the next line.
            self.beginning = self.position;
            return Ok((ENDFILE, self.position));
        }

        let at = self.position;
        if self.newline {
            self.beginning = self.position;
            self.newline = false;
        }

        let ch = self.chain.byte_at(self.position);
        self.position.offset += 1;
        if ch == b'\n' {
            self.newline = true;
        }
        Ok((ch as i32, at))
    }

    /// Scan the next token onto the token queue. Undefined characters are
    /// reported and skipped; ignored regexes loop without emitting.
    pub(crate) fn input_token(&mut self) -> Result<(), DriverError> {
        let (token, fin, locus, start) = loop {
            let (mut ch, mut at) = self.input_char()?;
            let locus = self.beginning;
            let start = at;

            // Number of the last final state encountered.
            let mut fin = 0;

            // Run the automaton until no transition is possible, tracking
            // where each still-reachable token's match would end.
            let mut state = 1;
            while state != 0 {
                let lo = self.tables.tokenindex[state as usize] as usize;
                let hi = self.tables.tokenindex[state as usize + 1] as usize;
                for i in lo..hi {
                    self.tokenend[self.tables.tokentable[i] as usize] = at;
                }

                if self.tables.finals[state as usize] != 0 {
                    fin = state;
                }

                state = self.tables.scan_next(state, ch);
                if state != 0 {
                    let next = self.input_char()?;
                    ch = next.0;
                    at = next.1;
                }
            }

            if fin == 0 {
                // No final state was seen: report a lexical error, skip one
                // character, and try again.
                self.record_error(start, None);
                self.position = start;
                self.position.offset += 1;
                continue;
            }

            // Roll the input position back to the end of the chosen token.
            let token = self.tables.finals[fin as usize];
            self.position = self.tokenend[token as usize];

            // Ignored regexes carry token numbers above tnumber: scan again
            // without emitting.
            if token <= self.tables.tnumber {
                break (token, fin, locus, start);
            }
        };

        let mut entry = TokenEntry {
            token,
            symbol: None,
            locus,
            start,
        };

        if self.tables.install[fin as usize] != 0 {
            let text = self.chain.copy_span(start, self.position);
            entry.symbol = Some(String::from_utf8_lossy(&text).into_owned());
            self.callbacks.install_token(&mut entry);
        }

        self.tknqueue.push_back(entry);
        Ok(())
    }
}
