//! Location-sorted error messages and source-line echoing.
//!
//! Messages queue up until the line they point at is complete, then print
//! beneath it with a caret at the offending column. A message with no text
//! is a scanner error: consecutive ones coalesce into a single deleted-range
//! report.

use crate::buffer::Location;
use crate::driver::{Callbacks, Driver};
use crate::DriverError;
use std::io::{Read, Write};

#[derive(Debug)]
pub(crate) struct Message {
    /// Location the message points at.
    pub point: Location,
    /// Last consecutive ignored character, for scanner errors.
    pub last: Location,
    /// None marks a scanner error.
    pub text: Option<String>,
}

/// Column width of a character at a column, honoring tab stops.
fn char_width(ch: u8, column: usize) -> usize {
    if ch == b'\t' {
        8 - column % 8
    } else {
        1
    }
}

impl<R, C, W> Driver<'_, R, C, W>
where
    R: Read,
    C: Callbacks,
    W: Write,
{
    /// Queue an error message at a location. `None` records a scanner error
    /// (an undefined character).
    pub fn record_error(&mut self, point: Location, text: Option<String>) {
        if self.msgqueue.is_empty() {
            self.msgqueue.push(Message {
                point,
                last: point,
                text,
            });
            return;
        }

        // Consecutive scanner errors extend the previous one into a range.
        if text.is_none() && self.msgqueue.last().unwrap().text.is_none() {
            let next = self.chain.bump(self.msgqueue.last().unwrap().last);
            if next == point {
                self.msgqueue.last_mut().unwrap().last = point;
                return;
            }
        }

        let mut i = self.msgqueue.len();
        while i > 0 && self.msgqueue[i - 1].point > point {
            i -= 1;
        }
        self.msgqueue.insert(
            i,
            Message {
                point,
                last: point,
                text,
            },
        );
    }

    /// Write (or silently skip) the line starting at the unwritten mark,
    /// followed by any messages pointing into it, then release input blocks
    /// that precede the new mark.
    pub(crate) fn write_line(&mut self) -> Result<(), DriverError> {
        // Find the start of the next line. At end of file pretend the next
        // line starts one character further on, so every remaining message
        // sorts before it.
        let mut nextline = self.unwritten;
        if nextline.offset >= self.chain.len_of(nextline.order) {
            nextline.offset = self.chain.len_of(nextline.order) + 1;
        } else {
            loop {
                if nextline.offset >= self.chain.len_of(nextline.order)
                    && !self
                        .chain
                        .fill(&mut self.input, &mut nextline)
                        .map_err(DriverError::Read)?
                {
                    break;
                }
                let ch = self.chain.byte_at(nextline);
                nextline.offset += 1;
                if ch == b'\n' {
                    let mut after = nextline;
                    if after.offset >= self.chain.len_of(after.order) {
                        self.chain
                            .fill(&mut self.input, &mut after)
                            .map_err(DriverError::Read)?;
                        nextline = after;
                    }
                    break;
                }
            }
        }

        self.lineno += 1;

        let pending = self
            .msgqueue
            .first()
            .is_some_and(|message| message.point < nextline);
        if self.listing || pending {
            if self.msgwritten {
                writeln!(self.out).map_err(DriverError::Write)?;
                self.msgwritten = false;
            }

            let mut at = self.unwritten;
            if at.offset < self.chain.len_of(at.order) {
                write!(self.out, "{:6}: ", self.lineno).map_err(DriverError::Write)?;
                while at < nextline {
                    if at.offset >= self.chain.len_of(at.order) {
                        at = Location {
                            order: at.order + 1,
                            offset: 0,
                        };
                        continue;
                    }
                    let ch = self.chain.byte_at(at);
                    at.offset += 1;
                    if ch == b'\n' {
                        break;
                    }
                    self.out.write_all(&[ch]).map_err(DriverError::Write)?;
                }
            } else {
                // A line for end of file, for insertions before EOF.
                write!(self.out, " <EOF>:").map_err(DriverError::Write)?;
                nextline.offset += 1;
            }
            writeln!(self.out).map_err(DriverError::Write)?;

            // Display every message on the line just written.
            let mut at = self.unwritten;
            let mut column = 0;
            while self
                .msgqueue
                .first()
                .is_some_and(|message| message.point < nextline)
            {
                let message = self.msgqueue.remove(0);

                while at < message.point {
                    if at.offset >= self.chain.len_of(at.order) {
                        at = Location {
                            order: at.order + 1,
                            offset: 0,
                        };
                        continue;
                    }
                    column += char_width(self.chain.byte_at(at), column);
                    at.offset += 1;
                }

                // A caret pointing at the error location. The leading tab
                // steps over the line number prefix.
                write!(self.out, "\t").map_err(DriverError::Write)?;
                let mut i = column;
                while i >= 8 {
                    write!(self.out, "\t").map_err(DriverError::Write)?;
                    i -= 8;
                }
                writeln!(self.out, "{:>width$}", '^', width = i + 1).map_err(DriverError::Write)?;

                match message.text {
                    None => {
                        write!(self.out, " *****\tDeleted: ").map_err(DriverError::Write)?;
                        loop {
                            let ch = self.chain.byte_at(at);
                            self.out.write_all(&[ch]).map_err(DriverError::Write)?;
                            column += char_width(ch, column);
                            at.offset += 1;
                            if at.offset >= self.chain.len_of(at.order)
                                && at.order < message.last.order
                            {
                                at = Location {
                                    order: at.order + 1,
                                    offset: 0,
                                };
                            }
                            if at > message.last {
                                break;
                            }
                        }
                        writeln!(self.out).map_err(DriverError::Write)?;
                    }
                    Some(text) => {
                        writeln!(self.out, " *****\t{}", text).map_err(DriverError::Write)?;
                    }
                }
                self.msgwritten = true;
            }
        }

        self.unwritten = nextline;

        // Input blocks preceding the first unwritten line are dead.
        self.chain.release_before(self.unwritten.order);
        Ok(())
    }
}
