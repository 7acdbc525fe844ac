//! Subset construction with ε (spec §4.3b).
//!
//! Given an NFA-ε, produces a deterministic FSA over the alphabet of
//! `(move, label)` pairs that are neither `Epsilon` nor `Call` — both of
//! which must already be eliminated by the time this runs (the extractor
//! resolves every `Call` edge, by inlining or by rewriting unknown callees
//! to ε, before calling in here). `Send`, `Recv`, and `Spawn` transitions
//! are preserved with their original label and payload.

use std::collections::{BTreeSet, VecDeque};

use crate::transition::{Move, Transition};
use crate::{Fsa, StateId};

/// Run subset construction on `nfa`, returning a deterministic, ε-free
/// `Fsa` accepting the same language over `{Send, Recv, Spawn}`-labeled
/// sequences.
pub fn determinize(nfa: &Fsa) -> Fsa {
    let mut dfa = Fsa::create();

    let start = nfa.epsilon_closure(&BTreeSet::from([StateId(0)]));
    if subset_is_accepting(nfa, &start) {
        dfa.mark_accepting(StateId(0)).expect("state 0 always exists");
    }

    // Ordered by smallest member id for deterministic discovery order,
    // independent of hash iteration (spec §4.3b / §5).
    let mut discovered: Vec<(BTreeSet<StateId>, StateId)> = vec![(start.clone(), StateId(0))];
    let mut worklist: VecDeque<BTreeSet<StateId>> = VecDeque::from([start]);

    while let Some(current) = worklist.pop_front() {
        let current_id = discovered
            .iter()
            .find(|(set, _)| *set == current)
            .map(|(_, id)| *id)
            .expect("worklist entries are always pre-registered in `discovered`");

        for (mv, label) in outgoing_symbols(nfa, &current) {
            let reach = reach_on(nfa, &current, mv, label.as_str());
            let closure = nfa.epsilon_closure(&reach);
            if closure.is_empty() {
                continue;
            }

            let to_id = match discovered.iter().find(|(set, _)| *set == closure) {
                Some((_, id)) => *id,
                None => {
                    let id = dfa.fresh_state_for_determinizer();
                    if subset_is_accepting(nfa, &closure) {
                        dfa.mark_accepting(id).expect("just allocated");
                    }
                    discovered.push((closure.clone(), id));
                    worklist.push_back(closure);
                    id
                }
            };

            let representative = representative_transition(nfa, &current, mv, label.as_str());
            dfa.insert_raw(current_id, to_id, representative);
        }
    }

    dfa
}

fn subset_is_accepting(nfa: &Fsa, set: &BTreeSet<StateId>) -> bool {
    set.iter().any(|s| nfa.is_accepting(*s))
}

/// The `(move, label)` pairs leaving any member of `set`, excluding the
/// symbols that never survive subset construction.
fn outgoing_symbols(nfa: &Fsa, set: &BTreeSet<StateId>) -> BTreeSet<(Move, String)> {
    let mut symbols = BTreeSet::new();
    for &s in set {
        for (_, t) in nfa.transitions_from(s) {
            if matches!(t.mv, Move::Send | Move::Recv | Move::Spawn) {
                symbols.insert((t.mv, t.label.to_string()));
            }
        }
    }
    symbols
}

fn reach_on(nfa: &Fsa, set: &BTreeSet<StateId>, mv: Move, label: &str) -> BTreeSet<StateId> {
    let mut reach = BTreeSet::new();
    for &s in set {
        for (to, t) in nfa.transitions_from(s) {
            if t.mv == mv && t.label.as_str() == label {
                reach.insert(to);
            }
        }
    }
    reach
}

/// Picks the first (in ascending source-state order) matching transition
/// as the representative whose label/payload the DFA edge carries.
fn representative_transition(nfa: &Fsa, set: &BTreeSet<StateId>, mv: Move, label: &str) -> Transition {
    for &s in set {
        for (_, t) in nfa.transitions_from(s) {
            if t.mv == mv && t.label.as_str() == label {
                return t.clone();
            }
        }
    }
    unreachable!("caller only invokes this for symbols known to be outgoing from `set`")
}

impl Fsa {
    /// Allocate a state directly, bypassing `add_transition`'s cursor
    /// bookkeeping — the determinizer builds a fresh graph from scratch and
    /// has no use for a cursor.
    fn fresh_state_for_determinizer(&mut self) -> StateId {
        self.allocate_bare_state()
    }
}
