//! Row-displacement table compression.
//!
//! The scanner uses a default-state chain: states are inserted most-similar
//! first, each later state defaults to the already-inserted state it
//! mismatches least, and only the differing transitions are first-fit
//! packed. A final pass walks states by decreasing chain length and fills
//! leftover holes with their own transitions, shortening average lookup
//! chains without changing any decode result. The parser table packs whole
//! rows first-fit with no default, densest states first.

use crate::emit::RawTables;
use sdgen_runtime::tables::{Tables, MAP_COUNT};

/// Pack an uncompressed table set into the compressed runtime form.
pub fn pack(raw: &RawTables) -> Tables {
    let (sdefault, sbase, scheck, snext) = pack_scanner(raw);
    let (pbase, pcheck, pnext) = pack_parser(raw);

    Tables {
        name: raw.name.clone(),
        tnumber: raw.tnumber,
        ntokens: raw.ntokens,
        snumber: raw.snumber,
        ntnumber: raw.ntnumber,
        gnumber: raw.gnumber,
        pnumber: raw.pnumber,
        context: raw.context,
        defcost: raw.defcost,
        tokenindex: raw.tokenindex.clone(),
        tokentable: raw.tokentable.clone(),
        finals: raw.finals.clone(),
        install: raw.install.clone(),
        sdefault,
        sbase,
        scheck,
        snext,
        inscost: raw.inscost.clone(),
        delcost: raw.delcost.clone(),
        lhsymbol: raw.lhsymbol.clone(),
        rhslength: raw.rhslength.clone(),
        semantics: raw.semantics.clone(),
        repair: raw.repair.clone(),
        stringindex: raw.stringindex.clone(),
        stringtable: raw.stringtable.clone(),
        pbase,
        pcheck,
        pnext,
    }
}

/// Transition mismatch count between two scanner states.
fn state_mismatch(actions: &[Vec<i32>], state1: usize, state2: usize) -> usize {
    if state1 == state2 {
        return 0;
    }
    (0..MAP_COUNT)
        .filter(|&column| actions[state1][column] != actions[state2][column])
        .count()
}

/// Distance-weighted mean mismatch of each state against all others. States
/// whose transitions resemble many others sort first and seed the default
/// chains.
fn compute_average(compare: &[Vec<usize>], states: usize) -> Vec<f64> {
    let mut average = vec![0.0; states];
    for i in 0..states {
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for j in 0..states {
            if j == i {
                continue;
            }
            let spread: f64 = (0..states)
                .filter(|&k| k != i)
                .map(|k| (compare[i][j] as f64 - compare[i][k] as f64).abs())
                .sum();
            let weight = (states as f64 - 2.0) / spread;
            numerator += weight * compare[i][j] as f64;
            denominator += weight;
        }
        average[i] = numerator / denominator;
    }
    average
}

fn ensure(cells: &mut Vec<i32>, length: usize) {
    if cells.len() < length {
        cells.resize(length, 0);
    }
}

fn pack_scanner(raw: &RawTables) -> (Vec<i32>, Vec<i32>, Vec<i32>, Vec<i32>) {
    let states = raw.snumber as usize;
    let actions: Vec<Vec<i32>> = (1..=states).map(|s| raw.strans[s].clone()).collect();

    let mut compare = vec![vec![0usize; states]; states];
    for i in 0..states {
        for j in i..states {
            let mismatch = state_mismatch(&actions, i, j);
            compare[i][j] = mismatch;
            compare[j][i] = mismatch;
        }
    }

    let average = compute_average(&compare, states);
    let mut index: Vec<usize> = (0..states).collect();
    // Tiny automata yield zero spreads and non-finite averages; such states
    // sort as equal and keep their insertion order.
    index.sort_by(|&a, &b| average[a].partial_cmp(&average[b]).unwrap_or(std::cmp::Ordering::Equal));

    let mut tdefault = vec![0i32; states];
    let mut tbase = vec![0i32; states];
    let mut chain = vec![0usize; states];
    let mut tcheck: Vec<i32> = Vec::new();
    let mut tnext: Vec<i32> = Vec::new();

    // The first state is fully populated with default 0.
    let first = index[0];
    tdefault[first] = 0;
    chain[first] = 1;
    tbase[first] = tcheck.len() as i32;
    ensure(&mut tcheck, MAP_COUNT);
    ensure(&mut tnext, MAP_COUNT);
    for column in 0..MAP_COUNT {
        tcheck[column] = first as i32 + 1;
        tnext[column] = actions[first][column];
    }

    // Each later state defaults to the most similar earlier insertion and
    // first-fits only its differing transitions.
    for entry in 1..states {
        let state = index[entry];
        let mut min = 0;
        let mut value = MAP_COUNT + 1;
        for i in 0..entry {
            if compare[state][index[i]] < value {
                value = compare[state][index[i]];
                min = i;
            }
        }
        let default = index[min];
        tdefault[state] = default as i32 + 1;
        chain[state] = chain[default] + 1;

        let diff: Vec<bool> = (0..MAP_COUNT)
            .map(|column| actions[state][column] != actions[default][column])
            .collect();

        let mut base = 0;
        'fit: for i in 0..=tcheck.len() {
            for (column, &differs) in diff.iter().enumerate() {
                if differs && tcheck.get(i + column).copied().unwrap_or(0) != 0 {
                    continue 'fit;
                }
            }
            base = i;
            break;
        }
        tbase[state] = base as i32;
        ensure(&mut tcheck, base + MAP_COUNT);
        ensure(&mut tnext, base + MAP_COUNT);
        for (column, &differs) in diff.iter().enumerate() {
            if differs {
                tcheck[base + column] = state as i32 + 1;
                tnext[base + column] = actions[state][column];
            }
        }
    }

    // Fill residual holes starting with the longest chains, so their
    // lookups hit directly instead of walking defaults.
    let mut order: Vec<usize> = (0..states).collect();
    order.sort_by(|&a, &b| chain[b].cmp(&chain[a]));
    for &state in &order {
        let base = tbase[state] as usize;
        for column in 0..MAP_COUNT {
            if tcheck[base + column] == 0 {
                tcheck[base + column] = state as i32 + 1;
                tnext[base + column] = actions[state][column];
            }
        }
    }

    let mut sdefault = vec![0i32; states + 1];
    let mut sbase = vec![0i32; states + 1];
    for state in 0..states {
        sdefault[state + 1] = tdefault[state];
        sbase[state + 1] = tbase[state];
    }
    (sdefault, sbase, tcheck, tnext)
}

fn pack_parser(raw: &RawTables) -> (Vec<i32>, Vec<i32>, Vec<i32>) {
    let states = raw.pnumber as usize;
    let tokens = (raw.tnumber + raw.ntnumber) as usize;
    let actions: Vec<Vec<i32>> = (1..=states)
        .map(|s| raw.actions[s][1..=tokens].to_vec())
        .collect();

    let count: Vec<usize> = actions
        .iter()
        .map(|row| row.iter().filter(|&&action| action != 0).count())
        .collect();
    let mut index: Vec<usize> = (0..states).collect();
    index.sort_by(|&a, &b| count[b].cmp(&count[a]));

    let mut tbase = vec![0i32; states];
    let mut tcheck: Vec<i32> = Vec::new();
    let mut tnext: Vec<i32> = Vec::new();

    for &state in &index {
        let mut base = 0;
        'fit: for i in 0..=tcheck.len() {
            for (column, &action) in actions[state].iter().enumerate() {
                if action != 0 && tcheck.get(i + column).copied().unwrap_or(0) != 0 {
                    continue 'fit;
                }
            }
            base = i;
            break;
        }
        tbase[state] = base as i32;
        ensure(&mut tcheck, base + tokens);
        ensure(&mut tnext, base + tokens);
        for (column, &action) in actions[state].iter().enumerate() {
            if action != 0 {
                tcheck[base + column] = state as i32 + 1;
                tnext[base + column] = action;
            }
        }
    }

    let mut pbase = vec![0i32; states + 1];
    for state in 0..states {
        pbase[state + 1] = tbase[state];
    }
    // The check and next arrays are stored base 1 like every other
    // state-indexed table.
    let mut pcheck = vec![0i32];
    pcheck.extend_from_slice(&tcheck);
    let mut pnext = vec![0i32];
    pnext.extend_from_slice(&tnext);
    (pbase, pcheck, pnext)
}
