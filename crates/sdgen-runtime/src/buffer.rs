//! Input buffering.
//!
//! Input is read into a chain of fixed-size blocks, each carrying a sequence
//! number so positions in different blocks stay comparable after earlier
//! blocks are released. A [`Location`] never dangles: blocks are only
//! released once the line writer has moved past them, and every location
//! still held by a queued token or parse-stack entry is at or past that
//! point.

use std::collections::VecDeque;
use std::io::{self, Read};

/// Amount of data requested from the input in one read.
pub const MAX_BUFFER: usize = 8192;

/// A position within the input: block sequence number plus byte offset.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Location {
    pub order: u64,
    pub offset: usize,
}

#[derive(Debug)]
struct Block {
    order: u64,
    data: Vec<u8>,
}

/// The chain of live input blocks.
#[derive(Debug)]
pub struct BufferChain {
    blocks: VecDeque<Block>,
    block_size: usize,
    endfile: bool,
}

impl BufferChain {
    pub fn new(block_size: usize) -> Self {
        let mut blocks = VecDeque::new();
        blocks.push_back(Block {
            order: 0,
            data: Vec::new(),
        });
        BufferChain {
            blocks,
            block_size,
            endfile: false,
        }
    }

    fn block(&self, order: u64) -> &Block {
        let head = self.blocks[0].order;
        &self.blocks[(order - head) as usize]
    }

    fn back_order(&self) -> u64 {
        self.blocks.back().unwrap().order
    }

    /// Length of the data currently in a block. Blocks grow in place until
    /// they reach the block size, so this is not a constant per block.
    pub fn len_of(&self, order: u64) -> usize {
        self.block(order).data.len()
    }

    pub fn byte_at(&self, at: Location) -> u8 {
        self.block(at.order).data[at.offset]
    }

    /// Step a location one byte forward, crossing into the next block when
    /// the current one is exhausted.
    pub fn bump(&self, mut at: Location) -> Location {
        at.offset += 1;
        if at.offset >= self.len_of(at.order) && at.order < self.back_order() {
            at = Location {
                order: at.order + 1,
                offset: 0,
            };
        }
        at
    }

    /// Ensure a character is available at `at`, reading more input if
    /// necessary and advancing `at` across block boundaries. Returns false
    /// at end of file.
    pub fn fill(&mut self, input: &mut impl Read, at: &mut Location) -> io::Result<bool> {
        loop {
            if at.order < self.back_order() && at.offset >= self.len_of(at.order) {
                *at = Location {
                    order: at.order + 1,
                    offset: 0,
                };
            }
            if at.offset < self.len_of(at.order) {
                return Ok(true);
            }
            if self.endfile {
                return Ok(false);
            }
            if self.blocks.back().unwrap().data.len() >= self.block_size {
                let order = self.back_order() + 1;
                self.blocks.push_back(Block {
                    order,
                    data: Vec::with_capacity(self.block_size),
                });
                continue;
            }

            let block_size = self.block_size;
            let back = self.blocks.back_mut().unwrap();
            let start = back.data.len();
            back.data.resize(block_size, 0);
            let count = input.read(&mut back.data[start..])?;
            back.data.truncate(start + count);
            if count == 0 {
                self.endfile = true;
            }
        }
    }

    /// Release every block preceding the given sequence number.
    pub fn release_before(&mut self, order: u64) {
        while self.blocks[0].order < order {
            self.blocks.pop_front();
        }
    }

    /// Copy the span `[from, to)` into a contiguous string, crossing block
    /// boundaries as needed.
    pub fn copy_span(&self, from: Location, to: Location) -> Vec<u8> {
        let mut text = Vec::new();
        let mut at = from;
        while at < to {
            if at.offset >= self.len_of(at.order) {
                at = Location {
                    order: at.order + 1,
                    offset: 0,
                };
                continue;
            }
            text.push(self.byte_at(at));
            at.offset += 1;
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_cross_block_boundaries() {
        let mut chain = BufferChain::new(4);
        let mut input: &[u8] = b"0123456789";
        let mut at = Location::default();
        while chain.fill(&mut input, &mut at).unwrap() {
            at.offset += 1;
        }
        let end = at;
        let text = chain.copy_span(Location::default(), end);
        assert_eq!(text, b"0123456789");
        assert_eq!(end.order, 2);
    }
}
