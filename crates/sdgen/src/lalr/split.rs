//! Reduce-reduce repair by lane tracing and state splitting.
//!
//! A conflicted state's reduce items become the lanes of a collision. Lanes
//! walk backward through the update graph and the ancestor links toward the
//! states where their lookaheads originate, duplicating the collision once
//! per ancestor so every distinct context is traced separately. A collision
//! succeeds when the lookaheads its lanes would accumulate are pairwise
//! disjoint; collisions whose lookaheads cannot cross-conflict share one
//! set of state copies. Copying clones every lane state except the lane
//! end, then rewires descendants, ancestors, update targets, and gotos so
//! each context reaches its own copy of the conflicted state.

use super::collection::{Collection, Target};
use crate::grammar::Productions;
use crate::language::Language;
use crate::symbol::{IntSet, SymbolSet};

#[derive(Debug, Clone)]
struct LaneEntry {
    state: usize,
    /// Items in `state` contributing to the lane's lookahead.
    items: IntSet,
}

#[derive(Debug, Clone)]
struct Trace {
    /// True once the lane has reached the end of its context.
    complete: bool,
    lane: Vec<LaneEntry>,
    /// Spontaneous follow accumulated along the lane.
    follow: SymbolSet,
}

#[derive(Debug, Clone)]
struct Collision {
    lanes: Vec<Trace>,
    success: bool,
}

/// Attempt to repair a reduce-reduce conflict in `state`. Returns true when
/// the collection was altered and the table must be rebuilt.
pub fn split_states(
    lang: &mut Language,
    productions: &Productions,
    collection: &mut Collection,
    state: usize,
) -> bool {
    let mut conflicts = vec![find_conflict(lang, productions, collection, state)];

    if !lang.options.split_states {
        lang.error(format!(
            "Reduce-Reduce conflict in state {} (SPLITSTATES not selected)",
            state
        ));
        return false;
    }

    let mut failure = false;
    let bound = collection.states.len() * collection.states.len() + 16;
    let mut rounds = 0;
    loop {
        // A conflict already present in the spontaneous follows cannot be
        // repaired by splitting.
        for conflict in conflicts.iter().filter(|conflict| !conflict.success) {
            if spontaneous_conflict(lang, conflict) {
                failure = true;
            }
        }
        if failure {
            break;
        }

        for conflict in conflicts.iter_mut().filter(|conflict| !conflict.success) {
            kernel_items(collection, conflict);
        }

        previous_states(collection, &mut conflicts);

        if !check_conflicts(collection, &mut conflicts) {
            break;
        }

        rounds += 1;
        if rounds > bound {
            failure = true;
            break;
        }
    }

    if failure {
        lang.error("Reduce-Reduce conflict cannot be resolved".to_owned());
        return false;
    }

    let groups = group_conflicts(collection, &conflicts);
    copy_states(collection, &conflicts, &groups);
    lang.warn("Reduce-Reduce conflict has been resolved".to_owned());
    true
}

/// Collect the reduce items whose lookaheads pairwise intersect into the
/// lanes of a fresh collision.
fn find_conflict(
    lang: &mut Language,
    productions: &Productions,
    collection: &Collection,
    state: usize,
) -> Collision {
    let mut matches = IntSet::new();
    let items = &collection.states[state].items;
    for i in 0..items.len() {
        if items[i].dot < productions.get(items[i].prod).length {
            continue;
        }
        for j in i + 1..items.len() {
            if items[j].dot < productions.get(items[j].prod).length {
                continue;
            }
            let intersect = items[i].lookahead.intersect(&items[j].lookahead);
            if !intersect.is_empty() {
                let names: Vec<String> = intersect
                    .iter()
                    .map(|symbol| lang.symbols.get(symbol).name.clone())
                    .collect();
                lang.warn(format!(
                    "Reduce-Reduce conflict in state {} on [{}] between productions {} and {}",
                    state,
                    names.join(" "),
                    items[i].prod,
                    items[j].prod
                ));
                matches.insert(i);
                matches.insert(j);
            }
        }
    }

    let lanes = matches
        .iter()
        .map(|item| Trace {
            complete: false,
            lane: vec![LaneEntry {
                state,
                items: [item].into_iter().collect(),
            }],
            follow: items[item].follow.clone(),
        })
        .collect();
    Collision {
        lanes,
        success: false,
    }
}

/// A conflict between the accumulated spontaneous follows themselves is
/// unrepairable.
fn spontaneous_conflict(lang: &mut Language, conflict: &Collision) -> bool {
    let mut failure = false;
    for i in 0..conflict.lanes.len() {
        for j in i + 1..conflict.lanes.len() {
            if conflict.lanes[i].follow.intersects(&conflict.lanes[j].follow) {
                lang.warn(format!(
                    "Spontaneous lookahead conflict between lanes {} and {}",
                    i + 1,
                    j + 1
                ));
                failure = true;
            }
        }
    }
    failure
}

/// Replace each lane tip with the kernel items that propagate into it. A
/// lane with no propagating kernel items is complete.
fn kernel_items(collection: &Collection, conflict: &mut Collision) {
    for trace in conflict.lanes.iter_mut().filter(|trace| !trace.complete) {
        let tip = trace.lane.last().unwrap().clone();
        let state = &collection.states[tip.state];

        let mut kernel = IntSet::new();
        for item in tip.items.iter() {
            if item < state.kernel {
                kernel.insert(item);
            } else {
                let target = Target {
                    state: tip.state,
                    item,
                };
                for k in 0..state.kernel {
                    if state.items[k].update.contains(&target) {
                        kernel.insert(k);
                    }
                }
            }
        }

        if kernel.is_empty() {
            trace.complete = true;
        } else if kernel != tip.items {
            trace.lane.push(LaneEntry {
                state: tip.state,
                items: kernel,
            });
        }
    }
}

/// Fan each incomplete lane out to the ancestors of its tip, duplicating
/// the whole collision once per additional ancestor. A lane that revisits a
/// state is a loop and completes instead of growing.
fn previous_states(collection: &Collection, conflicts: &mut Vec<Collision>) {
    let mut i = 0;
    while i < conflicts.len() {
        if conflicts[i].success {
            i += 1;
            continue;
        }

        // Every kernel item of a state has the same ancestor states, so the
        // first incomplete lane determines the fanout.
        let mut count = 0;
        for trace in &conflicts[i].lanes {
            if !trace.complete {
                let tip = trace.lane.last().unwrap();
                let item = tip.items.get(0);
                count = collection.states[tip.state].items[item].ancestors.len();
                break;
            }
        }

        if count == 0 {
            for trace in &mut conflicts[i].lanes {
                trace.complete = true;
            }
            i += 1;
            continue;
        }

        for k in 1..count {
            let copy = conflicts[i].clone();
            conflicts.insert(i + k, copy);
        }

        for j in 0..conflicts[i].lanes.len() {
            if conflicts[i].lanes[j].complete {
                continue;
            }
            let tip = conflicts[i].lanes[j].lane.last().unwrap().clone();

            for k in 0..count {
                let mut state = 0;
                let mut items = IntSet::new();
                let mut follow = conflicts[i + k].lanes[j].follow.clone();
                for item in tip.items.iter() {
                    let ancestor = collection.states[tip.state].items[item].ancestors[k];
                    state = ancestor.state;
                    items.insert(ancestor.item);
                    follow = follow
                        .union(&collection.states[ancestor.state].items[ancestor.item].follow);
                }
                let destination = &mut conflicts[i + k].lanes[j];
                destination.follow = follow;
                destination.lane.push(LaneEntry { state, items });

                // A state appearing earlier in the lane closes a loop.
                let length = destination.lane.len();
                if destination.lane[..length - 1]
                    .iter()
                    .any(|entry| entry.state == state)
                {
                    destination.complete = true;
                }
            }
        }

        i += count;
    }
}

/// The lookahead a lane contributes: its accumulated follow plus, while the
/// lane is still open, the propagated lookaheads of its tip items.
fn lane_lookahead(collection: &Collection, trace: &Trace) -> SymbolSet {
    let mut lookahead = trace.follow.clone();
    if !trace.complete {
        let tip = trace.lane.last().unwrap();
        for item in tip.items.iter() {
            lookahead = lookahead.union(&collection.states[tip.state].items[item].lookahead);
        }
    }
    lookahead
}

/// Mark collisions whose lanes have become pairwise disjoint as successes.
/// Returns true while any collision is still unresolved.
fn check_conflicts(collection: &Collection, conflicts: &mut [Collision]) -> bool {
    for conflict in conflicts.iter_mut().filter(|conflict| !conflict.success) {
        let mut failure = false;
        for j in 0..conflict.lanes.len() {
            let follow1 = lane_lookahead(collection, &conflict.lanes[j]);
            for k in j + 1..conflict.lanes.len() {
                let follow2 = lane_lookahead(collection, &conflict.lanes[k]);
                if follow1.intersects(&follow2) {
                    failure = true;
                    break;
                }
            }
            if failure {
                break;
            }
        }
        if !failure {
            conflict.success = true;
        }
    }

    conflicts.iter().any(|conflict| !conflict.success)
}

/// Greedily merge collisions whose per-lane lookaheads stay pairwise
/// disjoint when combined; members of a group can share state copies.
fn group_conflicts(collection: &Collection, conflicts: &[Collision]) -> Vec<IntSet> {
    let count = conflicts[0].lanes.len();

    let mut groups: Vec<IntSet> = (0..conflicts.len())
        .map(|index| [index].into_iter().collect())
        .collect();
    let mut lookaheads: Vec<Vec<SymbolSet>> = conflicts
        .iter()
        .map(|conflict| {
            conflict
                .lanes
                .iter()
                .map(|trace| lane_lookahead(collection, trace))
                .collect()
        })
        .collect();

    loop {
        let mut merged = None;
        'search: for i in 0..groups.len() {
            for j in i + 1..groups.len() {
                let combine: Vec<SymbolSet> = (0..count)
                    .map(|k| lookaheads[i][k].union(&lookaheads[j][k]))
                    .collect();
                let conflicted = (0..count).any(|k| {
                    (k + 1..count).any(|l| combine[k].intersects(&combine[l]))
                });
                if !conflicted {
                    merged = Some((i, j, combine));
                    break 'search;
                }
            }
        }
        match merged {
            Some((i, j, combine)) => {
                groups[i] = groups[i].union(&groups[j]);
                lookaheads[i] = combine;
                groups.remove(j);
                lookaheads.remove(j);
            }
            None => return groups,
        }
    }
}

fn map_state(map: &[(usize, usize)], state: usize) -> usize {
    map.iter()
        .find(|&&(old, _)| old == state)
        .map_or(state, |&(_, new)| new)
}

/// Clone a state for a collision group: item set, kernel boundary, follow
/// sets, update targets, and gotos. Ancestors are regenerated during
/// rewiring and lookaheads by the next propagation pass.
fn clone_state(collection: &mut Collection, state: usize) -> usize {
    let source = &collection.states[state];
    let mut copy = source.clone();
    for item in &mut copy.items {
        item.ancestors.clear();
        item.lookahead.clear();
    }
    collection.states.push(copy);
    collection.states.len() - 1
}

/// Remap every edge of one state through the old-to-new state map, fixing
/// the ancestor lists on both ends of each moved descendant edge.
fn remap_state(collection: &mut Collection, state: usize, map: &[(usize, usize)]) {
    for l in 0..collection.states[state].items.len() {
        if let Some(descendant) = collection.states[state].items[l].descendant {
            let new = map_state(map, descendant.state);
            if new != descendant.state {
                collection.states[state].items[l].descendant = Some(Target {
                    state: new,
                    item: descendant.item,
                });

                collection.states[new].items[descendant.item]
                    .ancestors
                    .push(Target { state, item: l });

                let old = &mut collection.states[descendant.state].items[descendant.item];
                if let Some(at) = old
                    .ancestors
                    .iter()
                    .position(|ancestor| ancestor.state == state && ancestor.item == l)
                {
                    old.ancestors.remove(at);
                }
            }
        }

        if l < collection.states[state].kernel {
            for u in 0..collection.states[state].items[l].update.len() {
                let target = collection.states[state].items[l].update[u];
                collection.states[state].items[l].update[u] = Target {
                    state: map_state(map, target.state),
                    item: target.item,
                };
            }
        }
    }

    for g in 0..collection.states[state].gotos.len() {
        let target = collection.states[state].gotos[g].state;
        collection.states[state].gotos[g].state = map_state(map, target);
    }
}

/// Make the state copies for each group and rewire every lane onto them.
fn copy_states(collection: &mut Collection, conflicts: &[Collision], groups: &[IntSet]) {
    let mut used = IntSet::new();
    let mut maps: Vec<Vec<(usize, usize)>> = vec![Vec::new(); groups.len()];

    for (g, group) in groups.iter().enumerate() {
        // All the states the group's lanes pass through, except each lane's
        // end: the end is where the lookaheads originate and stays shared.
        let mut list = IntSet::new();
        for index in group.iter() {
            for trace in &conflicts[index].lanes {
                for entry in &trace.lane[..trace.lane.len() - 1] {
                    list.insert(entry.state);
                }
            }
        }

        // The first group to claim a state keeps the original; later
        // claims copy it.
        for state in list.iter() {
            if used.contains(state) {
                let new = clone_state(collection, state);
                maps[g].push((state, new));
            } else {
                used.insert(state);
            }
        }
    }

    for (g, group) in groups.iter().enumerate() {
        if maps[g].is_empty() {
            continue;
        }
        for index in group.iter() {
            for trace in &conflicts[index].lanes {
                // Retarget the lane end first, then walk back down the lane
                // remapping inside each copy.
                let end = trace.lane.last().unwrap().state;
                remap_state(collection, end, &maps[g]);

                let mut l = trace.lane.len() as isize - 2;
                while l >= 0 {
                    let state = map_state(&maps[g], trace.lane[l as usize].state);
                    remap_state(collection, state, &maps[g]);

                    // Consecutive lane entries in the same state only need
                    // one pass.
                    if l > 0 && map_state(&maps[g], trace.lane[l as usize - 1].state) == state {
                        l -= 1;
                    }
                    l -= 1;
                }
            }
        }
    }
}
