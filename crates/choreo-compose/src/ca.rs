//! The choreography composer (spec §4.4): product of frozen views,
//! synchronized-pair reachability from the entry pair, CA emission.
//!
//! Grounded on `peeps-waitgraph/src/detect.rs`'s BFS-over-graph-states
//! idiom — an explicit worklist of not-yet-processed states, each
//! discovered state indexed exactly once.

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, info_span};

use choreo_extract::LocalView;
use choreo_fsa::{Move, StateId, Transition};
use choreo_types::Error;

use crate::pair::{Frozen, Pair};

/// The choreography automaton: states are discovered synchronized pairs,
/// numbered in discovery order; edges carry the stable textual labels of
/// spec §6.
#[derive(Clone, Debug)]
pub struct Ca {
    pub states: Vec<Pair>,
    pub accepting: Vec<bool>,
    pub edges: Vec<(usize, usize, String)>,
}

impl Ca {
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

fn view_name(views: &[LocalView], idx: usize) -> &str {
    &views[idx].name
}

fn is_accepting(views: &[LocalView], f: Frozen) -> bool {
    match f {
        Frozen::Wildcard => true,
        Frozen::View { view, state } => views[view].fsa.is_accepting(state),
    }
}

fn spawn_target_name<'a>(views: &'a [LocalView], t: &'a Transition) -> &'a str {
    t.payload
        .as_ref()
        .and_then(|p| p.view_ref.as_ref())
        .map(|vr| vr.name.as_str())
        .unwrap_or(t.label.as_str())
}

/// The index into `views` of the local view a resolved `Spawn` transition
/// produced, by matching `payload.view_ref`'s name. `None` for a spawn with
/// no `view_ref` — an opaque anonymous-literal spawn (spec §9) — which has
/// no view to pair with and stays a `Wildcard` partner.
fn spawn_target_view(views: &[LocalView], t: &Transition) -> Option<usize> {
    let view_ref = t.payload.as_ref()?.view_ref.as_ref()?;
    views.iter().position(|v| v.name == view_ref.name)
}

fn spawn_steps(views: &[LocalView], view: usize, state: StateId) -> Vec<(Pair, String)> {
    views[view]
        .fsa
        .transitions_from(state)
        .into_iter()
        .filter(|(_, t)| t.mv == Move::Spawn)
        .map(|(dest, t)| {
            let label = format!("{} ⋁ {}", view_name(views, view), spawn_target_name(views, t));
            let target = match spawn_target_view(views, t) {
                Some(spawned) => Frozen::View {
                    view: spawned,
                    state: StateId::new(0),
                },
                None => Frozen::Wildcard,
            };
            (Pair::new(Frozen::View { view, state: dest }, target), label)
        })
        .collect()
}

fn matched_send_recv(ta: &Transition, tb: &Transition) -> bool {
    matches!(
        (ta.mv, tb.mv),
        (Move::Send, Move::Recv) | (Move::Recv, Move::Send)
    ) && ta.label == tb.label
}

/// Outgoing synchronization steps from `pair` (spec §4.4's reachability
/// rule): spawn steps from either side, and Send/Recv matches between both
/// sides when both are concrete views.
fn step(views: &[LocalView], pair: Pair) -> Vec<(Pair, String)> {
    let Pair(a, b) = pair;
    match (a, b) {
        (Frozen::View { view: vi, state: si }, Frozen::View { view: vj, state: sj }) => {
            let mut out = spawn_steps(views, vi, si);
            out.extend(spawn_steps(views, vj, sj));

            let outs_a = views[vi].fsa.transitions_from(si);
            let outs_b = views[vj].fsa.transitions_from(sj);
            for (sa2, ta) in &outs_a {
                for (sb2, tb) in &outs_b {
                    if matched_send_recv(ta, tb) {
                        let dest = Pair::new(
                            Frozen::View { view: vi, state: *sa2 },
                            Frozen::View { view: vj, state: *sb2 },
                        );
                        let label = if ta.mv == Move::Send {
                            format!("{} ← {}", view_name(views, vj), view_name(views, vi))
                        } else {
                            format!("{} ← {}", view_name(views, vi), view_name(views, vj))
                        };
                        out.push((dest, label));
                    }
                }
            }
            out
        }
        (Frozen::View { view, state }, Frozen::Wildcard)
        | (Frozen::Wildcard, Frozen::View { view, state }) => spawn_steps(views, view, state),
        (Frozen::Wildcard, Frozen::Wildcard) => Vec::new(),
    }
}

/// Runs spec §4.4 over already-determinized local views. `views[0]` must be
/// the entry procedure's view — the contract `extract_local_views` returns.
/// `pair_cap` is the composer's safety-valve worklist bound (spec §5);
/// `None` means unbounded.
pub fn compose(views: &[LocalView], pair_cap: Option<usize>) -> Result<Ca, Error> {
    if views.is_empty() {
        return Err(Error::MissingEntry {
            name: "main".to_string(),
        });
    }
    let span = info_span!("compose", views = views.len());
    let _enter = span.enter();

    let entry = Pair::new(
        Frozen::View {
            view: 0,
            state: StateId::new(0),
        },
        Frozen::Wildcard,
    );

    let mut index: BTreeMap<Pair, usize> = BTreeMap::new();
    let mut discovered: Vec<Pair> = Vec::new();
    let mut edges: Vec<(usize, usize, String)> = Vec::new();
    let mut worklist: VecDeque<Pair> = VecDeque::new();

    index.insert(entry, 0);
    discovered.push(entry);
    worklist.push_back(entry);

    while let Some(pair) = worklist.pop_front() {
        let from_idx = index[&pair];
        for (dest, label) in step(views, pair) {
            let dest_idx = match index.get(&dest) {
                Some(&idx) => idx,
                None => {
                    let idx = discovered.len();
                    if let Some(cap) = pair_cap {
                        if idx >= cap {
                            return Err(Error::ComplexityExceeded { cap });
                        }
                    }
                    discovered.push(dest);
                    index.insert(dest, idx);
                    worklist.push_back(dest);
                    idx
                }
            };
            debug!(from = from_idx, to = dest_idx, %label, "synchronization step");
            edges.push((from_idx, dest_idx, label));
        }
    }

    let accepting = discovered
        .iter()
        .map(|p| is_accepting(views, p.0) && is_accepting(views, p.1))
        .collect();

    debug!(states = discovered.len(), edges = edges.len(), "composition complete");

    Ok(Ca {
        states: discovered,
        accepting,
        edges,
    })
}
