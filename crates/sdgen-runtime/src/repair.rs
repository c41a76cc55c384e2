//! Locally least-cost syntax error repair.
//!
//! On error the parse stack is frozen. A legal continuation of the parse is
//! simulated with the per-state repair values, recording the insertion cost
//! of each prefix and the shortest prefix after which each terminal becomes
//! legal. The repair search then weighs single-token insertions and
//! continuation-prefix insertions against deleting input tokens, extending
//! the deleted range only while it can still beat the best repair found.
//! The winning repair is applied to the token queue; the parse never sees
//! the error.

use crate::buffer::Location;
use crate::driver::{Callbacks, Driver, InsertEntry};
use crate::tables::{Action, GotoAction};
use crate::DriverError;
use std::io::{Read, Write};

/// Cost no real repair can reach.
const MAX_COST: i32 = 99_999;

#[derive(Debug, Copy, Clone)]
struct Repair {
    /// Single terminal to insert, -1 for a continuation prefix.
    token: i32,
    cost: i32,
}

impl<R, C, W> Driver<'_, R, C, W>
where
    R: Read,
    C: Callbacks,
    W: Write,
{
    /// Determine and apply the locally least-cost repair for the syntax
    /// error at the current lookahead.
    pub(crate) fn repair_error(&mut self) -> Result<(), DriverError> {
        // Freeze the state column of the parse stack.
        self.errstack.clear();
        self.errstack
            .extend(self.parstack.iter().map(|entry| entry.state));

        // The top may be a shift-reduce placeholder rather than a real
        // state. Apply queued reduces until it is real; shift-reduce actions
        // have no state of their own, so this cannot hurt repair quality.
        let mut i = 0;
        while *self.errstack.last().unwrap() == 0 {
            let reduce = self.redqueue[i];
            self.errstack.truncate(reduce.pointer);
            self.errstack.push(reduce.state);
            i += 1;
        }

        // Build the continuation string and learn which terminals become
        // legal after each of its prefixes.
        self.build_continuation()?;

        // The repair adopted so far.
        let mut choice = Repair {
            token: -1,
            cost: MAX_COST,
        };
        let mut delete = 0;

        self.scnstack.clear();
        self.deletion.clear();

        loop {
            // Cheapest single terminal whose insertion makes the next input
            // token legal.
            let mut insert = Repair {
                token: -1,
                cost: MAX_COST,
            };
            for token in 1..=self.tables.tnumber {
                if self.followset[token as usize] != 0
                    || token == self.insertion.get(1).map_or(0, |entry| entry.token)
                {
                    continue;
                }
                if self.look_ahead(token, 0, 1)? != 0 {
                    continue;
                }

                // Charge a fraction of the default repair cost for every
                // context token left unparsed after a later error.
                let mut cost = delete + self.tables.inscost[token as usize];
                if self.tables.context > 1 {
                    let miss = self.look_ahead(token, 0, self.tables.context as usize)? as i32;
                    cost += miss * self.tables.defcost / self.tables.context;
                }
                if cost < insert.cost {
                    insert.token = token;
                    insert.cost = cost;
                }
            }

            if self.tknqueue.is_empty() {
                self.input_token()?;
            }
            let token = self.tknqueue[0].token;

            // Continuation-prefix insertion that makes the next input token
            // legal directly.
            let mut prefix = Repair {
                token: -1,
                cost: MAX_COST,
            };
            if self.followset[token as usize] >= 0 {
                let length = self.followset[token as usize];
                let mut cost = delete + self.insertion[length as usize].cost;
                if self.tables.context > 0 {
                    let miss = self
                        .look_ahead(0, length as usize, self.tables.context as usize)?
                        as i32;
                    cost += miss * self.tables.defcost / self.tables.context;
                }
                prefix.cost = cost;
            }

            if insert.cost < choice.cost || prefix.cost < choice.cost {
                choice = if insert.cost <= prefix.cost {
                    insert
                } else {
                    prefix
                };

                // A new least-cost repair: the tokens scanned over to reach
                // it become deletions.
                self.deletion.append(&mut self.scnstack);
            }

            // Keep scanning only while deleting up to the next token can
            // still beat the current best.
            if delete + self.tables.delcost[token as usize] < choice.cost {
                delete += self.tables.delcost[token as usize];
                let scanned = self.tknqueue.pop_front().unwrap();
                self.scnstack.push(scanned);
            } else {
                break;
            }
        }

        // Scanned but not deleted tokens return to the input.
        while let Some(entry) = self.scnstack.pop() {
            self.tknqueue.push_front(entry);
        }

        // A single-token insertion is rewritten as a length-1 continuation
        // prefix so one code path applies and reports the repair.
        let token = self.tknqueue[0].token as usize;
        if choice.token > 0 {
            if self.insertion.len() < 2 {
                self.insertion.push(InsertEntry {
                    token: 0,
                    symbol: None,
                    cost: 0,
                    known: false,
                });
            }
            self.insertion[1].token = choice.token;
            self.followset[token] = 1;
        }

        let count = self.followset[token];
        tracing::debug!(
            cost = choice.cost,
            deleted = self.deletion.len(),
            inserted = count,
            "repairing syntax error"
        );
        self.record_repair(count);
        self.deletion.clear();

        // Push the inserted tokens in front of the input, at the location
        // of the token they precede.
        if count > 0 {
            let locus = self.tknqueue[0].locus;
            let start = self.tknqueue[0].start;
            for i in (1..=count as usize).rev() {
                let entry = &mut self.insertion[i];
                self.tknqueue.push_front(crate::driver::TokenEntry {
                    token: entry.token,
                    symbol: entry.symbol.take(),
                    locus,
                    start,
                });
            }
        }
        self.insertion.clear();
        Ok(())
    }

    /// Parse to acceptance using the per-state repair values, accumulating
    /// the continuation string and its prefix costs.
    fn build_continuation(&mut self) -> Result<(), DriverError> {
        self.lclstack.clear();
        self.lclstack.extend_from_slice(&self.errstack);

        self.insertion.clear();
        self.insertion.push(InsertEntry {
            token: 0,
            symbol: None,
            cost: 0,
            known: false,
        });
        self.followset.fill(-1);

        loop {
            let value = self.error_value()?;

            let action = if value < 0 {
                Action::Reduce(-value)
            } else {
                self.tables
                    .action(*self.lclstack.last().unwrap(), value)
            };

            match action {
                Action::Shift(next) => {
                    self.lclstack.push(next);
                }
                Action::ShiftReduce(prod) => {
                    // Stand-in slot for the shifted terminal; the goto loop
                    // pops it with the rest of the right hand side.
                    self.lclstack.push(prod);
                    if self.continuation_gotos(prod) {
                        return Ok(());
                    }
                }
                Action::Reduce(prod) => {
                    if self.continuation_gotos(prod) {
                        return Ok(());
                    }
                }
                Action::Error => unreachable!("repair value decodes to an action"),
            }
        }
    }

    /// The goto chain after a reduce on the continuation stack. Returns true
    /// on acceptance.
    fn continuation_gotos(&mut self, prod: i32) -> bool {
        let mut entry = prod;
        loop {
            let length = self.lclstack.len() - self.tables.rhslength[entry as usize] as usize;
            self.lclstack.truncate(length);
            let action = self
                .tables
                .goto_action(*self.lclstack.last().unwrap(), self.tables.lhsymbol[entry as usize]);
            match action {
                GotoAction::Shift(next) => {
                    self.lclstack.push(next);
                    return false;
                }
                GotoAction::ShiftReduce(next) => {
                    self.lclstack.push(next);
                    entry = next;
                }
                GotoAction::Accept => {
                    self.lclstack.push(0);
                    return true;
                }
            }
        }
    }

    /// The next repair value, extending the continuation string and, once
    /// per prefix, the followset of terminals that become legal here.
    fn error_value(&mut self) -> Result<i32, DriverError> {
        let state = *self.lclstack.last().unwrap();
        let value = self.tables.repair[state as usize];
        if value == 0 {
            // No continuation from this state: the error is fatal.
            let at = self.tknqueue[0].start;
            let locus = self.tknqueue[0].locus;
            self.record_error(at, Some("Syntax error".to_owned()));
            while self.unwritten.order < locus.order
                || (self.unwritten.order == locus.order && self.unwritten.offset <= locus.offset)
            {
                self.write_line()?;
            }
            return Err(DriverError::FatalSyntax);
        }

        // Reduce actions revisit prefixes of the continuation, so the
        // followset of a prefix is determined once.
        if !self.insertion.last().unwrap().known {
            let prefix = self.insertion.len() as i32 - 1;
            for token in 1..=self.tables.tnumber {
                if self.followset[token as usize] >= 0 {
                    continue;
                }
                match self.tables.action(state, token) {
                    Action::Shift(_) | Action::ShiftReduce(_) => {
                        // The current state shifts the terminal: legal by
                        // inspection.
                        self.followset[token as usize] = prefix;
                    }
                    Action::Reduce(prod) => {
                        // Legal only if it is eventually shifted when the
                        // reduces are carried out.
                        if self.reduces_to_shift(prod, token) {
                            self.followset[token as usize] = prefix;
                        }
                    }
                    Action::Error => {}
                }
            }
            self.insertion.last_mut().unwrap().known = true;
        }

        if value > 0 {
            let cost = self.insertion.last().unwrap().cost + self.tables.inscost[value as usize];
            self.insertion.push(InsertEntry {
                token: value,
                symbol: None,
                cost,
                known: false,
            });
        }
        Ok(value)
    }

    /// Simulate the reduce chain for a terminal from the continuation stack
    /// and report whether the terminal is eventually shifted.
    fn reduces_to_shift(&mut self, prod: i32, token: i32) -> bool {
        self.stastack.clear();
        self.stastack.extend_from_slice(&self.lclstack);

        let mut entry = prod;
        loop {
            // Carry out the reduce and its goto chain.
            loop {
                let length = self.stastack.len() - self.tables.rhslength[entry as usize] as usize;
                self.stastack.truncate(length);
                let action = self.tables.goto_action(
                    *self.stastack.last().unwrap(),
                    self.tables.lhsymbol[entry as usize],
                );
                match action {
                    GotoAction::Shift(next) => {
                        self.stastack.push(next);
                        break;
                    }
                    GotoAction::ShiftReduce(next) => {
                        self.stastack.push(next);
                        entry = next;
                    }
                    GotoAction::Accept => return true,
                }
            }

            match self
                .tables
                .action(*self.stastack.last().unwrap(), token)
            {
                Action::Shift(_) | Action::ShiftReduce(_) => return true,
                Action::Reduce(next) => entry = next,
                Action::Error => return false,
            }
        }
    }

    /// Parse ahead over a trial token stream: `token` (if nonzero), then
    /// `count` tokens of the continuation, then `number` input tokens.
    /// Returns how many trial tokens were left when an error stopped the
    /// parse, or 0 if all were consumed.
    fn look_ahead(&mut self, token: i32, count: usize, number: usize) -> Result<usize, DriverError> {
        self.stastack.clear();
        self.stastack.extend_from_slice(&self.errstack);

        self.chkqueue.clear();
        if token > 0 {
            self.chkqueue.push(token);
        }
        for i in 1..=count {
            let inserted = self.insertion[i].token;
            self.chkqueue.push(inserted);
        }
        while self.tknqueue.len() < number {
            self.input_token()?;
        }
        for i in 0..number {
            let queued = self.tknqueue[i].token;
            self.chkqueue.push(queued);
        }

        let mut i = 0;
        loop {
            match self
                .tables
                .action(*self.stastack.last().unwrap(), self.chkqueue[i])
            {
                Action::Shift(next) => {
                    self.stastack.push(next);
                    i += 1;
                    if i >= self.chkqueue.len() {
                        return Ok(0);
                    }
                }
                Action::ShiftReduce(prod) => {
                    self.stastack.push(prod);
                    i += 1;
                    if i >= self.chkqueue.len() {
                        return Ok(0);
                    }
                    if self.lookahead_gotos(prod) {
                        return Ok(0);
                    }
                }
                Action::Reduce(prod) => {
                    if self.lookahead_gotos(prod) {
                        return Ok(0);
                    }
                }
                Action::Error => return Ok(self.chkqueue.len() - i),
            }
        }
    }

    /// The goto chain for [`Self::look_ahead`]. Returns true on acceptance.
    fn lookahead_gotos(&mut self, prod: i32) -> bool {
        let mut entry = prod;
        loop {
            let length = self.stastack.len() - self.tables.rhslength[entry as usize] as usize;
            self.stastack.truncate(length);
            let action = self.tables.goto_action(
                *self.stastack.last().unwrap(),
                self.tables.lhsymbol[entry as usize],
            );
            match action {
                GotoAction::Shift(next) => {
                    self.stastack.push(next);
                    return false;
                }
                GotoAction::ShiftReduce(next) => {
                    self.stastack.push(next);
                    entry = next;
                }
                GotoAction::Accept => return true,
            }
        }
    }

    /// Report the applied repair as deletion, insertion, or replacement
    /// messages.
    fn record_repair(&mut self, insert: i32) {
        let mut message = String::new();
        let mut at = Location::default();

        let mut i = 0;
        while i < self.deletion.len() {
            at = self.deletion[i].start;

            // Group deletions sharing a source line. Only the final group
            // can merge with an insertion into a replacement message.
            let mut j = i + 1;
            while j < self.deletion.len() && self.deletion[j].locus == self.deletion[j - 1].locus {
                j += 1;
            }

            message.clear();
            message.push_str(if j < self.deletion.len() || insert == 0 {
                "Deleted:"
            } else {
                "Replaced:"
            });
            while i < j {
                message.push(' ');
                match &self.deletion[i].symbol {
                    Some(symbol) => message.push_str(symbol),
                    None => message.push_str(self.tables.token_name(self.deletion[i].token)),
                }
                i += 1;
            }

            if i < self.deletion.len() || insert == 0 {
                let text = message.clone();
                self.record_error(at, Some(text));
            }
        }

        if insert > 0 {
            if self.deletion.is_empty() {
                at = self.tknqueue[0].start;
                message.clear();
                message.push_str("Inserted:");
            } else {
                message.push_str("  with ");

                // An inserted token with the same number as a deleted one
                // keeps the deleted token's installed string.
                for i in 1..=insert as usize {
                    if self.insertion[i].symbol.is_some() {
                        continue;
                    }
                    let token = self.insertion[i].token;
                    if let Some(deleted) = self
                        .deletion
                        .iter_mut()
                        .find(|entry| entry.token == token && entry.symbol.is_some())
                    {
                        self.insertion[i].symbol = deleted.symbol.take();
                    }
                }
            }

            for i in 1..=insert as usize {
                message.push(' ');
                match &self.insertion[i].symbol {
                    Some(symbol) => message.push_str(symbol),
                    None => message.push_str(self.tables.token_name(self.insertion[i].token)),
                }
            }

            let text = message;
            self.record_error(at, Some(text));
        }
    }
}
