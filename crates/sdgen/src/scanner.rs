//! The scanner builder.
//!
//! Every scanner rule becomes a set of positions (one per character leaf,
//! plus an end marker carrying the rule's token number), the followpos
//! relation is computed over the rule trees, and subset construction yields
//! a DFA which is then minimized by partition refinement. End markers are
//! transparent: they occupy no input character but ride along in the state
//! sets, marking where each token's match ends. A rule with a lookahead
//! boundary gets its end marker at the boundary and a separate accept marker
//! at the very end, so the automaton runs through the trailing context while
//! the match is cut at the boundary.

use crate::language::Language;
use crate::regex::{class_bits, expand_repeats, ClassBits, TreeNode};
use crate::symbol::{IntSet, TokenFlags};
use sdgen_runtime::tables::MAP_COUNT;

/// The uncompressed scanner automaton.
#[derive(Debug, Default)]
pub struct ScannerTables {
    /// Number of states; state numbers are 1-based.
    pub count: usize,
    /// Accepted token per state, 0 when not final.
    pub finals: Vec<i32>,
    /// Per-state install flag.
    pub install: Vec<i32>,
    /// `tokenindex[s] .. tokenindex[s + 1]` spans the tokens whose
    /// end-of-match location must be recorded in state `s`.
    pub tokenindex: Vec<i32>,
    pub tokentable: Vec<i32>,
    /// Transition rows, `MAP_COUNT` columns each; 0 means no transition.
    pub trans: Vec<Vec<i32>>,
}

/// Transition characters of one position: a byte set plus the end-of-file
/// column.
#[derive(Debug, Default, Copy, Clone)]
struct PosBits {
    bytes: ClassBits,
    eof: bool,
}

impl PosBits {
    fn is_empty(&self) -> bool {
        self.bytes.is_empty() && !self.eof
    }

    fn test(&self, column: usize) -> bool {
        if column == MAP_COUNT - 1 {
            self.eof
        } else {
            self.bytes.test(column as u8)
        }
    }
}

#[derive(Debug, Default)]
struct Position {
    bits: PosBits,
    follow: IntSet,
    /// Token whose match ends at this position, 0 if none.
    ends: i32,
    /// Token accepted when a state holds this position, 0 if none.
    accepts: i32,
    install: bool,
}

/// nullable/firstpos/lastpos of a subtree.
#[derive(Debug, Default, Clone)]
struct TreeInfo {
    nullable: bool,
    first: IntSet,
    last: IntSet,
}

#[derive(Debug, Default)]
struct Builder {
    positions: Vec<Position>,
}

impl Builder {
    fn position(&mut self, bits: PosBits) -> usize {
        self.positions.push(Position {
            bits,
            ..Position::default()
        });
        self.positions.len() - 1
    }

    fn marker(&mut self) -> TreeInfo {
        let index = self.position(PosBits::default());
        let mut info = TreeInfo {
            nullable: true,
            ..TreeInfo::default()
        };
        info.first.insert(index);
        info.last.insert(index);
        info
    }

    fn leaf(&mut self, bits: PosBits) -> TreeInfo {
        let index = self.position(bits);
        let mut info = TreeInfo::default();
        info.first.insert(index);
        info.last.insert(index);
        info
    }

    fn concat(&mut self, left: TreeInfo, right: TreeInfo) -> TreeInfo {
        for position in left.last.iter() {
            self.positions[position].follow = self.positions[position].follow.union(&right.first);
        }
        TreeInfo {
            nullable: left.nullable && right.nullable,
            first: if left.nullable {
                left.first.union(&right.first)
            } else {
                left.first
            },
            last: if right.nullable {
                right.last.union(&left.last)
            } else {
                right.last
            },
        }
    }

    fn repeat(&mut self, child: TreeInfo, nullable: bool) -> TreeInfo {
        for position in child.last.iter() {
            self.positions[position].follow = self.positions[position].follow.union(&child.first);
        }
        TreeInfo {
            nullable: nullable || child.nullable,
            first: child.first,
            last: child.last,
        }
    }

    /// Build the info of a rule subtree. `fold` widens letters to both
    /// cases.
    fn build(&mut self, tree: &TreeNode, fold: bool, lang: &mut Language) -> TreeInfo {
        match tree {
            TreeNode::Epsilon | TreeNode::Semantic(_) => TreeInfo {
                nullable: true,
                ..TreeInfo::default()
            },
            TreeNode::Character(bytes) => {
                let mut info = TreeInfo {
                    nullable: true,
                    ..TreeInfo::default()
                };
                for &byte in bytes {
                    let leaf = self.leaf(PosBits {
                        bytes: fold_bits(ClassBits::single(byte), fold),
                        eof: false,
                    });
                    info = self.concat(info, leaf);
                }
                info
            }
            TreeNode::ZeroByte => self.leaf(PosBits {
                bytes: ClassBits::single(0),
                eof: false,
            }),
            TreeNode::EndOfFile => self.leaf(PosBits {
                bytes: ClassBits::default(),
                eof: true,
            }),
            TreeNode::Class(bits) => self.leaf(PosBits {
                bytes: fold_bits(*bits, fold),
                eof: false,
            }),
            TreeNode::Diff(..) | TreeNode::Complement(..) | TreeNode::Range(..) => {
                match class_bits(tree) {
                    Some(bits) => self.leaf(PosBits {
                        bytes: fold_bits(bits, fold),
                        eof: false,
                    }),
                    None => {
                        lang.error("Invalid range in character expression".to_owned());
                        TreeInfo {
                            nullable: true,
                            ..TreeInfo::default()
                        }
                    }
                }
            }
            TreeNode::Concat(children) => {
                let mut info = TreeInfo {
                    nullable: true,
                    ..TreeInfo::default()
                };
                for child in children {
                    let next = self.build(child, fold, lang);
                    info = self.concat(info, next);
                }
                info
            }
            TreeNode::Alt(children) => {
                let mut info = TreeInfo::default();
                for child in children {
                    let next = self.build(child, fold, lang);
                    info.nullable |= next.nullable;
                    info.first = info.first.union(&next.first);
                    info.last = info.last.union(&next.last);
                }
                info
            }
            TreeNode::Star(child) => {
                let info = self.build(child, fold, lang);
                self.repeat(info, true)
            }
            TreeNode::Plus(child) => {
                let info = self.build(child, fold, lang);
                self.repeat(info, false)
            }
            TreeNode::Lookahead => {
                // Handled a level up; a bare lookahead is epsilon here.
                TreeInfo {
                    nullable: true,
                    ..TreeInfo::default()
                }
            }
            TreeNode::Repeat(..) => {
                // Expanded before building.
                let expanded = expand_repeats(tree.clone());
                self.build(&expanded, fold, lang)
            }
            TreeNode::Reference(_) => {
                lang.error("Definition reference inside a scanner expression".to_owned());
                TreeInfo {
                    nullable: true,
                    ..TreeInfo::default()
                }
            }
        }
    }
}

fn fold_bits(bits: ClassBits, fold: bool) -> ClassBits {
    if !fold {
        return bits;
    }
    let mut folded = bits;
    for byte in bits.iter() {
        if byte.is_ascii_lowercase() {
            folded.set(byte.to_ascii_uppercase());
        } else if byte.is_ascii_uppercase() {
            folded.set(byte.to_ascii_lowercase());
        }
    }
    folded
}

/// Split a rule tree at its lookahead boundary, if any.
fn split_lookahead(tree: &TreeNode) -> Option<(TreeNode, TreeNode)> {
    if let TreeNode::Concat(children) = tree {
        if let Some(at) = children
            .iter()
            .position(|child| matches!(child, TreeNode::Lookahead))
        {
            let before = TreeNode::Concat(children[..at].to_vec());
            let after = TreeNode::Concat(children[at + 1..].to_vec());
            return Some((before, after));
        }
    }
    None
}

/// Build the minimized scanner automaton from the language's scanner rules.
/// Ignored rules are numbered past the real terminals as they are met.
pub fn generate_scanner(lang: &mut Language) -> ScannerTables {
    let tnumber = lang.termcount();
    let mut next_ignored = tnumber;

    let mut builder = Builder::default();
    let mut start = IntSet::new();

    let rules = lang.scanner.clone();
    for rule in &rules {
        let value = lang.symbols.token(rule.symbol).clone();
        if value.flags.contains(TokenFlags::EMPTY) {
            // An epsilon rule defines a terminal without scanner presence.
            continue;
        }

        let token = if value.token != 0 {
            value.token
        } else {
            // An ignored regex; assign the next sentinel number.
            next_ignored += 1;
            lang.symbols.token_mut(rule.symbol).token = next_ignored;
            next_ignored
        };
        let fold = value.flags.contains(TokenFlags::CASE);
        let tree = expand_repeats(rule.tree.clone());

        let info = match split_lookahead(&tree) {
            Some((before, after)) => {
                let before = builder.build(&before, fold, lang);
                if before.nullable {
                    let name = lang.symbols.get(rule.symbol).name.clone();
                    lang.error(format!("Token \"{}\" can match the empty string", name));
                    continue;
                }
                let end = builder.marker();
                let end_position = end.first.get(0);
                builder.positions[end_position].ends = token;
                let after = builder.build(&after, fold, lang);
                let accept = builder.marker();
                let accept_position = accept.first.get(0);
                builder.positions[accept_position].accepts = token;
                builder.positions[accept_position].install =
                    value.flags.contains(TokenFlags::INSTALL);

                let info = builder.concat(before, end);
                let info = builder.concat(info, after);
                builder.concat(info, accept)
            }
            None => {
                let body = builder.build(&tree, fold, lang);
                if body.nullable {
                    let name = lang.symbols.get(rule.symbol).name.clone();
                    lang.error(format!("Token \"{}\" can match the empty string", name));
                    continue;
                }
                let end = builder.marker();
                let end_position = end.first.get(0);
                builder.positions[end_position].ends = token;
                builder.positions[end_position].accepts = token;
                builder.positions[end_position].install =
                    value.flags.contains(TokenFlags::INSTALL);
                builder.concat(body, end)
            }
        };
        start = start.union(&info.first);
    }
    lang.ntokens = next_ignored;

    // Subset construction over position sets.
    let positions = &builder.positions;
    let mut states: Vec<IntSet> = vec![start];
    let mut trans: Vec<Vec<i32>> = Vec::new();
    let mut i = 0;
    while i < states.len() {
        let mut row = vec![0i32; MAP_COUNT];
        for column in 0..MAP_COUNT {
            let mut next = IntSet::new();
            for position in states[i].iter() {
                if positions[position].bits.test(column) {
                    next = next.union(&positions[position].follow);
                }
            }
            if next.is_empty() {
                continue;
            }
            let target = match states.iter().position(|state| *state == next) {
                Some(found) => found,
                None => {
                    states.push(next);
                    states.len() - 1
                }
            };
            row[column] = target as i32 + 1;
        }
        trans.push(row);
        i += 1;
    }

    // Per-state accept/end/install data.
    let accepts = |state: &IntSet| -> i32 {
        state
            .iter()
            .map(|position| positions[position].accepts)
            .filter(|&token| token != 0)
            .min()
            .unwrap_or(0)
    };
    let ends = |state: &IntSet| -> IntSet {
        state
            .iter()
            .map(|position| positions[position].ends as usize)
            .filter(|&token| token != 0)
            .collect()
    };
    let installs = |state: &IntSet| -> bool {
        let token = accepts(state);
        token != 0
            && state.iter().any(|position| {
                positions[position].accepts == token && positions[position].install
            })
    };

    minimize(&states, &trans, &accepts, &ends, &installs)
}

/// Partition-refinement minimization. The initial partition separates
/// states by accepted token, tracked token ends, and install flag.
fn minimize(
    states: &[IntSet],
    trans: &[Vec<i32>],
    accepts: &dyn Fn(&IntSet) -> i32,
    ends: &dyn Fn(&IntSet) -> IntSet,
    installs: &dyn Fn(&IntSet) -> bool,
) -> ScannerTables {
    let count = states.len();
    let signatures: Vec<(i32, Vec<usize>, bool)> = states
        .iter()
        .map(|state| {
            (
                accepts(state),
                ends(state).iter().collect(),
                installs(state),
            )
        })
        .collect();

    // Partition ids per state; 0 is reserved for the dead state.
    let mut partition = vec![0usize; count];
    {
        let mut keys: Vec<&(i32, Vec<usize>, bool)> = Vec::new();
        for (state, signature) in signatures.iter().enumerate() {
            match keys.iter().position(|key| **key == *signature) {
                Some(found) => partition[state] = found + 1,
                None => {
                    keys.push(signature);
                    partition[state] = keys.len();
                }
            }
        }
    }

    loop {
        let mut next = vec![0usize; count];
        let mut keys: Vec<(usize, Vec<usize>)> = Vec::new();
        for state in 0..count {
            let signature: Vec<usize> = trans[state]
                .iter()
                .map(|&target| {
                    if target == 0 {
                        0
                    } else {
                        partition[target as usize - 1]
                    }
                })
                .collect();
            let key = (partition[state], signature);
            match keys.iter().position(|existing| *existing == key) {
                Some(found) => next[state] = found + 1,
                None => {
                    keys.push(key);
                    next[state] = keys.len();
                }
            }
        }
        if next == partition {
            break;
        }
        partition = next;
    }

    // Renumber so the start state's partition is state 1 and the rest keep
    // first-appearance order.
    let classes = *partition.iter().max().unwrap_or(&0);
    let mut order = vec![0usize; classes + 1];
    let mut snumber = 0;
    order[partition[0]] = {
        snumber += 1;
        snumber
    };
    for state in 1..count {
        if order[partition[state]] == 0 {
            snumber += 1;
            order[partition[state]] = snumber;
        }
    }

    let mut tables = ScannerTables {
        count: snumber,
        finals: vec![0; snumber + 1],
        install: vec![0; snumber + 1],
        tokenindex: vec![0; snumber + 2],
        tokentable: Vec::new(),
        trans: vec![vec![0; MAP_COUNT]; snumber + 1],
    };

    let mut token_ends: Vec<Option<IntSet>> = vec![None; snumber + 1];
    for state in 0..count {
        let renumbered = order[partition[state]];
        tables.finals[renumbered] = accepts(&states[state]);
        tables.install[renumbered] = installs(&states[state]) as i32;
        token_ends[renumbered].get_or_insert_with(|| ends(&states[state]));
        for column in 0..MAP_COUNT {
            let target = trans[state][column];
            tables.trans[renumbered][column] = if target == 0 {
                0
            } else {
                order[partition[target as usize - 1]] as i32
            };
        }
    }

    for state in 1..=snumber {
        tables.tokenindex[state] = tables.tokentable.len() as i32;
        if let Some(ends) = &token_ends[state] {
            for token in ends.iter() {
                tables.tokentable.push(token as i32);
            }
        }
    }
    tables.tokenindex[snumber + 1] = tables.tokentable.len() as i32;

    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_language;

    fn scan_all(tables: &ScannerTables, input: &[u8]) -> Vec<(i32, usize)> {
        // A tiny uncompressed interpreter: longest match with rollback.
        let mut tokens = Vec::new();
        let mut at = 0;
        while at < input.len() {
            let mut state = 1i32;
            let mut i = at;
            let mut last = None;
            let mut ends = vec![at; tables.tokentable.len().max(1) + 256];
            loop {
                let lo = tables.tokenindex[state as usize] as usize;
                let hi = tables.tokenindex[state as usize + 1] as usize;
                for entry in lo..hi {
                    ends[tables.tokentable[entry] as usize] = i;
                }
                if tables.finals[state as usize] != 0 {
                    last = Some(tables.finals[state as usize]);
                }
                let column = if i < input.len() {
                    input[i] as usize
                } else {
                    MAP_COUNT - 1
                };
                state = tables.trans[state as usize][column];
                if state == 0 {
                    break;
                }
                i += 1;
            }
            // Undefined input reports token 0 and skips one byte, the way
            // the runtime records a lexical error.
            let Some(token) = last else {
                tokens.push((0, 1));
                at += 1;
                continue;
            };
            tokens.push((token, ends[token as usize] - at));
            at = ends[token as usize].max(at + 1);
        }
        tokens
    }

    #[test]
    fn bounded_repetition_builds_expected_finals() {
        let source = r#"
            IDENT runs;
            SCANNER
                "run" = { [0-9] } 2 : 4;
        "#;
        let mut lang = parse_language(source.as_bytes()).unwrap();
        let tables = generate_scanner(&mut lang);

        // Runs of two, three, and four digits accept; the accepting states
        // are distinct because each still allows a different continuation.
        let finals = (1..=tables.count)
            .filter(|&state| tables.finals[state] == 1)
            .count();
        assert_eq!(finals, 3);

        assert_eq!(scan_all(&tables, b"12"), vec![(1, 2)]);
        assert_eq!(scan_all(&tables, b"123"), vec![(1, 3)]);
        assert_eq!(scan_all(&tables, b"1234"), vec![(1, 4)]);
        // Five digits roll back to the longest match; the leftover digit
        // cannot start a new token.
        assert_eq!(scan_all(&tables, b"12345"), vec![(1, 4), (0, 1)]);
    }

    #[test]
    fn ignored_rules_number_past_terminals() {
        let source = r#"
            IDENT ignored;
            SCANNER
                "word" = [a-z]+;
                = [\ \t]+;
        "#;
        let mut lang = parse_language(source.as_bytes()).unwrap();
        let tables = generate_scanner(&mut lang);
        assert_eq!(lang.termcount(), 2); // "word" plus the eof sentinel
        assert_eq!(lang.ntokens, 3);
        assert_eq!(scan_all(&tables, b"abc"), vec![(1, 3)]);
        // Blanks scan to the ignored sentinel, which is numbered past every
        // terminal.
        assert_eq!(scan_all(&tables, b" "), vec![(3, 1)]);
    }

    #[test]
    fn case_folding_widens_letters() {
        let source = r#"
            IDENT folded;
            SCANNER
                "kw" = 'if', IGNORE CASE;
        "#;
        let mut lang = parse_language(source.as_bytes()).unwrap();
        let tables = generate_scanner(&mut lang);
        assert_eq!(scan_all(&tables, b"if"), vec![(1, 2)]);
        assert_eq!(scan_all(&tables, b"IF"), vec![(1, 2)]);
    }
}
