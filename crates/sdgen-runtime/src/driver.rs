//! The queued-reduce LALR(1) parse driver.
//!
//! Reduce actions are not applied to the parse stack when decoded. They are
//! appended to a queue and replayed when the next terminal is shifted, so
//! that a syntax error discovered between reduces can be repaired against
//! the untouched pre-error stack, before any semantic action has fired.
//! While reduces are queued, the current state is tracked by simulating pops
//! against the queue (`pointer`/`knownptr`).

use crate::buffer::{BufferChain, Location, MAX_BUFFER};
use crate::message::Message;
use crate::tables::{Action, GotoAction, Tables};
use crate::DriverError;
use std::collections::VecDeque;
use std::io::{Read, Write};

/// One scanned token waiting in the lookahead queue.
#[derive(Debug, Clone)]
pub struct TokenEntry {
    /// Token number handed to the parser.
    pub token: i32,
    /// The matched text, when the token carries the install flag.
    pub symbol: Option<String>,
    /// Start of the line containing the token.
    pub locus: Location,
    /// Start of the token itself.
    pub start: Location,
}

/// One entry on the parse stack. State 0 marks the placeholder pushed by the
/// shift half of a shift-reduce action.
#[derive(Debug, Clone)]
pub struct ParseEntry {
    pub state: i32,
    pub start: Location,
    pub token: i32,
    pub symbol: Option<String>,
}

/// One delayed reduce.
#[derive(Debug, Copy, Clone)]
pub(crate) struct ReduceEntry {
    /// Production number.
    pub number: i32,
    /// Stack height after the RHS is popped and the LHS pushed.
    pub pointer: usize,
    /// State after the goto on the LHS, 0 for a shift-reduce placeholder.
    pub state: i32,
}

/// One entry in the continuation string built during error repair.
#[derive(Debug, Clone)]
pub(crate) struct InsertEntry {
    pub token: i32,
    pub symbol: Option<String>,
    pub cost: i32,
    pub known: bool,
}

/// User hooks driven by the runtime.
pub trait Callbacks {
    /// A production with a nonzero semantic number is about to be popped.
    /// `rhs` is the slice of parse-stack entries forming its right hand
    /// side. Semantic errors pushed onto `errors` are queued and reported
    /// with the source line they point at.
    fn semantic_action(
        &mut self,
        number: i32,
        rhs: &[ParseEntry],
        errors: &mut Vec<(Location, String)>,
    ) {
        let _ = (number, rhs, errors);
    }

    /// A token with the install flag was scanned. The hook may rewrite the
    /// token number (keyword screening) or take the symbol text.
    fn install_token(&mut self, token: &mut TokenEntry) {
        let _ = token;
    }
}

impl Callbacks for () {}

/// The scanner/parser interpreter. One driver owns every stack and queue of
/// a parse; nothing is shared.
pub struct Driver<'t, R, C, W> {
    pub(crate) tables: &'t Tables,
    pub(crate) input: R,
    pub(crate) callbacks: C,
    pub(crate) out: W,
    /// Print every source line, not only lines carrying messages.
    pub listing: bool,

    pub(crate) chain: BufferChain,
    pub(crate) position: Location,
    pub(crate) newline: bool,
    pub(crate) lineno: u32,
    pub(crate) unwritten: Location,
    pub(crate) msgwritten: bool,
    pub(crate) beginning: Location,

    /// End-of-match location per scanner token.
    pub(crate) tokenend: Vec<Location>,
    /// Shortest continuation prefix after which a terminal becomes legal.
    pub(crate) followset: Vec<i32>,

    pub(crate) msgqueue: Vec<Message>,
    pub(crate) parstack: Vec<ParseEntry>,
    pub(crate) redqueue: Vec<ReduceEntry>,
    pub(crate) tknqueue: VecDeque<TokenEntry>,
    pub(crate) errstack: Vec<i32>,
    pub(crate) lclstack: Vec<i32>,
    pub(crate) stastack: Vec<i32>,
    pub(crate) chkqueue: Vec<i32>,
    pub(crate) scnstack: Vec<TokenEntry>,
    pub(crate) deletion: Vec<TokenEntry>,
    pub(crate) insertion: Vec<InsertEntry>,
}

impl<'t, R, C, W> Driver<'t, R, C, W>
where
    R: Read,
    C: Callbacks,
    W: Write,
{
    pub fn new(tables: &'t Tables, input: R, callbacks: C, out: W) -> Self {
        Self::with_block_size(tables, input, callbacks, out, MAX_BUFFER)
    }

    /// As [`Driver::new`] with an explicit input block size. Small blocks
    /// force tokens to straddle block boundaries, which the tests use.
    pub fn with_block_size(
        tables: &'t Tables,
        input: R,
        callbacks: C,
        out: W,
        block_size: usize,
    ) -> Self {
        Driver {
            tables,
            input,
            callbacks,
            out,
            listing: false,
            chain: BufferChain::new(block_size),
            position: Location::default(),
            newline: true,
            lineno: 0,
            unwritten: Location::default(),
            msgwritten: false,
            beginning: Location::default(),
            tokenend: vec![Location::default(); tables.ntokens as usize + 2],
            followset: vec![-1; tables.tnumber as usize + 1],
            msgqueue: Vec::new(),
            parstack: Vec::new(),
            redqueue: Vec::new(),
            tknqueue: VecDeque::new(),
            errstack: Vec::new(),
            lclstack: Vec::new(),
            stastack: Vec::new(),
            chkqueue: Vec::new(),
            scnstack: Vec::new(),
            deletion: Vec::new(),
            insertion: Vec::new(),
        }
    }

    pub fn callbacks_mut(&mut self) -> &mut C {
        &mut self.callbacks
    }

    /// Parse the input to acceptance, repairing syntax errors along the way.
    pub fn parse(&mut self) -> Result<(), DriverError> {
        self.parstack.push(ParseEntry {
            state: 1,
            start: Location::default(),
            token: 0,
            symbol: None,
        });

        // Current state and top of the parse stack unaffected by delayed
        // reduces.
        let mut state = 1;
        let mut pointer = 0usize;
        let mut knownptr = 0usize;
        let mut attribute = Location::default();
        let mut accepted = false;
        while !accepted {
            if self.tknqueue.is_empty() {
                self.input_token()?;
            }

            match self.tables.action(state, self.tknqueue[0].token) {
                Action::Shift(next) => {
                    attribute = self.parstack.last().unwrap().start;
                    self.shift_terminal(next, attribute, &mut state, &mut pointer, &mut knownptr)?;
                }
                Action::ShiftReduce(prod) => {
                    attribute = self.parstack.last().unwrap().start;
                    self.shift_terminal(0, attribute, &mut state, &mut pointer, &mut knownptr)?;
                    accepted = self.queue_reduces(prod, &mut state, &mut pointer, &mut knownptr);
                }
                Action::Reduce(prod) => {
                    accepted = self.queue_reduces(prod, &mut state, &mut pointer, &mut knownptr);
                }
                Action::Error => {
                    self.repair_error()?;
                }
            }
        }

        // Finish off the postponed reduce actions left over by the accept.
        self.perform_reduces(attribute)?;

        // There is no next line after end of file, so flush every queued
        // message.
        while !self.msgqueue.is_empty() {
            self.write_line()?;
        }
        Ok(())
    }

    /// Shift the front lookahead token, draining queued reduces first.
    /// `next` is 0 for the shift half of a shift-reduce.
    fn shift_terminal(
        &mut self,
        next: i32,
        attribute: Location,
        state: &mut i32,
        pointer: &mut usize,
        knownptr: &mut usize,
    ) -> Result<(), DriverError> {
        self.perform_reduces(attribute)?;

        *state = next;
        *pointer = self.parstack.len();
        *knownptr = *pointer;

        let token = self.tknqueue.pop_front().unwrap();
        self.parstack.push(ParseEntry {
            state: next,
            start: token.start,
            token: token.token,
            symbol: token.symbol,
        });

        // Shifting a terminal completes every line before it.
        while self.unwritten < token.locus {
            self.write_line()?;
        }
        Ok(())
    }

    /// Queue the reduce chain starting with `prod`, simulating the pops it
    /// would perform. Returns true when the chain ends in acceptance.
    fn queue_reduces(
        &mut self,
        prod: i32,
        state: &mut i32,
        pointer: &mut usize,
        knownptr: &mut usize,
    ) -> bool {
        let mut entry = prod;
        loop {
            let number = entry;
            *pointer -= self.tables.rhslength[number as usize] as usize;
            if *pointer < *knownptr {
                *knownptr = *pointer;
            }

            if *pointer > *knownptr {
                // This part of the stack has been popped by queued reduces.
                // The most recent reduce that left the stack at this height
                // holds the state; if none does, this is an epsilon reduce
                // and the state is unchanged.
                let mut i = self.redqueue.len();
                while i > 0 && self.redqueue[i - 1].pointer > *pointer {
                    i -= 1;
                }
                if i > 0 && self.redqueue[i - 1].pointer == *pointer {
                    *state = self.redqueue[i - 1].state;
                }
            } else {
                *state = self.parstack[*pointer].state;
            }

            let action = self
                .tables
                .goto_action(*state, self.tables.lhsymbol[number as usize]);
            *state = match action {
                GotoAction::Shift(next) => next,
                _ => 0,
            };

            *pointer += 1;
            self.redqueue.push(ReduceEntry {
                number,
                pointer: *pointer,
                state: *state,
            });

            match action {
                GotoAction::ShiftReduce(next) => entry = next,
                GotoAction::Shift(_) => return false,
                GotoAction::Accept => return true,
            }
        }
    }

    /// Replay every queued reduce: fire its semantic action, pop its right
    /// hand side, push its left hand side at `attribute`.
    pub(crate) fn perform_reduces(&mut self, attribute: Location) -> Result<(), DriverError> {
        for i in 0..self.redqueue.len() {
            let reduce = self.redqueue[i];
            let number = reduce.number as usize;

            if self.tables.semantics[number] != 0 {
                let mut errors = Vec::new();
                let rhs = &self.parstack[reduce.pointer..];
                self.callbacks
                    .semantic_action(self.tables.semantics[number], rhs, &mut errors);
                for (at, text) in errors {
                    self.record_error(at, Some(text));
                }
            }

            self.parstack.truncate(reduce.pointer);
            self.parstack.push(ParseEntry {
                state: reduce.state,
                start: attribute,
                token: self.tables.lhsymbol[number],
                symbol: None,
            });
        }
        self.redqueue.clear();
        Ok(())
    }
}
