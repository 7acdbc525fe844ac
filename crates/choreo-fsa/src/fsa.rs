//! The `Fsa` graph type and its kernel operations.

use std::collections::{BTreeMap, BTreeSet};

use choreo_types::Error;

use crate::transition::{Move, Transition};
use crate::StateId;

/// Sentinel used by [`Fsa::add_transition`] and [`Fsa::set_cursor`] to refer
/// to a state relative to the FSA under construction, instead of by a
/// concrete id the caller would otherwise have to track by hand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateRef {
    /// Use the FSA's current cursor.
    Current,
    /// Allocate a fresh state id and move the cursor to it.
    New,
    /// A concrete, already-allocated state id.
    Id(StateId),
    /// An explicitly invalid/uninitialized endpoint. Always rejected with
    /// [`Error::InvariantViolation`] — distinct from a bug where a caller
    /// simply forgets to resolve a placeholder before calling in.
    Unknown,
}

/// `{states, transitions, accepting, cursor}` (spec §3). The multi-map of
/// transitions never holds two parallel transitions with an identical
/// `(from, to, move, label)`; this is enforced on insert, not after the
/// fact.
#[derive(Clone, Debug)]
pub struct Fsa {
    states: BTreeSet<StateId>,
    transitions: BTreeMap<(StateId, StateId), Vec<Transition>>,
    accepting: BTreeSet<StateId>,
    cursor: StateId,
}

impl Fsa {
    /// An empty FSA with a single state id 0, no accepting states, cursor
    /// at 0.
    pub fn create() -> Self {
        let mut states = BTreeSet::new();
        states.insert(StateId(0));
        Self {
            states,
            transitions: BTreeMap::new(),
            accepting: BTreeSet::new(),
            cursor: StateId(0),
        }
    }

    pub fn cursor(&self) -> StateId {
        self.cursor
    }

    pub fn set_cursor(&mut self, id: StateId) -> Result<(), Error> {
        if !self.states.contains(&id) {
            return Err(Error::InvariantViolation {
                message: format!("set_cursor: unknown state {id}"),
            });
        }
        self.cursor = id;
        Ok(())
    }

    /// The maximum state id currently present.
    pub fn last_id(&self) -> StateId {
        *self
            .states
            .iter()
            .next_back()
            .expect("an Fsa always has at least state 0")
    }

    pub fn mark_accepting(&mut self, id: StateId) -> Result<(), Error> {
        if !self.states.contains(&id) {
            return Err(Error::InvariantViolation {
                message: format!("mark_accepting: unknown state {id}"),
            });
        }
        self.accepting.insert(id);
        Ok(())
    }

    pub fn is_accepting(&self, id: StateId) -> bool {
        self.accepting.contains(&id)
    }

    pub fn accepting_states(&self) -> &BTreeSet<StateId> {
        &self.accepting
    }

    pub fn states(&self) -> &BTreeSet<StateId> {
        &self.states
    }

    fn allocate_state(&mut self) -> StateId {
        let id = StateId(self.last_id().as_u32() + 1);
        self.states.insert(id);
        id
    }

    /// Allocate a state without moving the cursor, for callers (the
    /// determinizer) that build a graph from scratch and have no cursor use.
    pub(crate) fn allocate_bare_state(&mut self) -> StateId {
        self.allocate_state()
    }

    fn resolve(&mut self, r: StateRef) -> Result<StateId, Error> {
        match r {
            StateRef::Unknown => Err(Error::InvariantViolation {
                message: "state endpoint is UNKNOWN".to_string(),
            }),
            StateRef::Current => Ok(self.cursor),
            StateRef::New => {
                let id = self.allocate_state();
                self.cursor = id;
                Ok(id)
            }
            StateRef::Id(id) => {
                if !self.states.contains(&id) {
                    return Err(Error::InvariantViolation {
                        message: format!("reference to unknown state {id}"),
                    });
                }
                Ok(id)
            }
        }
    }

    /// Insert a transition between the resolved endpoints of `from`/`to`.
    /// Idempotent on `(from, to, move, label)` duplicates. Returns the
    /// resolved `(from, to)` ids so callers using `New` can continue
    /// building from them.
    pub fn add_transition(
        &mut self,
        from: StateRef,
        to: StateRef,
        t: Transition,
    ) -> Result<(StateId, StateId), Error> {
        if t.label.is_empty() {
            return Err(Error::InvariantViolation {
                message: "transition label must not be empty".to_string(),
            });
        }
        let from_id = self.resolve(from)?;
        let to_id = self.resolve(to)?;
        self.insert_raw(from_id, to_id, t);
        Ok((from_id, to_id))
    }

    /// Like [`Fsa::add_transition`] but with already-resolved endpoints;
    /// used internally by `inline` and by the determinizer, which both work
    /// with concrete ids rather than sentinels.
    pub(crate) fn insert_raw(&mut self, from: StateId, to: StateId, t: Transition) {
        let bucket = self.transitions.entry((from, to)).or_default();
        if !bucket.iter().any(|existing| existing.dedup_key() == t.dedup_key()) {
            bucket.push(t);
        }
    }

    /// Remove every parallel transition at `(from, to)` matching `(move,
    /// label)`. A no-op when none match.
    pub fn remove_transition(&mut self, from: StateId, to: StateId, mv: Move, label: &str) {
        if let Some(bucket) = self.transitions.get_mut(&(from, to)) {
            bucket.retain(|t| t.dedup_key() != (mv, label));
            if bucket.is_empty() {
                self.transitions.remove(&(from, to));
            }
        }
    }

    /// Remove every transition currently present at `(from, to)`, whatever
    /// its move/label. Used by `inline` to replace "the single edge" with a
    /// full copy of another FSA.
    fn remove_all_at(&mut self, from: StateId, to: StateId) {
        self.transitions.remove(&(from, to));
    }

    /// Snapshot iteration over all states; mutations inside `f` do not
    /// affect the visit.
    pub fn for_each_state(&self, mut f: impl FnMut(StateId)) {
        let snapshot: Vec<StateId> = self.states.iter().copied().collect();
        for s in snapshot {
            f(s);
        }
    }

    /// Snapshot iteration over all transitions, in deterministic
    /// `(from, to)` order.
    pub fn for_each_transition(&self, mut f: impl FnMut(StateId, StateId, &Transition)) {
        let snapshot: Vec<(StateId, StateId, Transition)> = self
            .transitions
            .iter()
            .flat_map(|(&(from, to), ts)| ts.iter().map(move |t| (from, to, t.clone())))
            .collect();
        for (from, to, t) in snapshot {
            f(from, to, &t);
        }
    }

    /// Transitions leaving `from` to any destination.
    pub fn transitions_from(&self, from: StateId) -> Vec<(StateId, &Transition)> {
        self.transitions
            .iter()
            .filter(|((f, _), _)| *f == from)
            .flat_map(|((_, to), ts)| ts.iter().map(move |t| (*to, t)))
            .collect()
    }

    /// A structurally independent copy: identical ids, transitions (by
    /// value), and accepting set.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// ε-closure of a set of states: the least fixed point of `S ∪ {t | ∃s
    /// ∈ S, (s →ε t) ∈ self}`.
    pub fn epsilon_closure(&self, states: &BTreeSet<StateId>) -> BTreeSet<StateId> {
        let mut closure = states.clone();
        let mut worklist: Vec<StateId> = states.iter().copied().collect();
        while let Some(s) = worklist.pop() {
            for (to, t) in self.transitions_from(s) {
                if t.mv == Move::Epsilon && closure.insert(to) {
                    worklist.push(to);
                }
            }
        }
        closure
    }

    /// Replace the single edge `(from, to)` with a full copy of `other`:
    /// allocate fresh ids for `other`'s states offset by `max(self) + 1`,
    /// wire an ε-transition in from `from`, wire ε-transitions out from
    /// every terminal state of `other`'s image to `to`, and drop the
    /// original `(from, to)` transitions.
    pub fn inline(&mut self, from: StateId, to: StateId, other: &Fsa) -> Result<(), Error> {
        if !self.states.contains(&from) || !self.states.contains(&to) {
            return Err(Error::InvariantViolation {
                message: format!("inline: unknown endpoint ({from}, {to})"),
            });
        }

        let offset = self.last_id().as_u32() + 1;
        let image = |id: StateId| StateId(id.as_u32() + offset);

        for &s in other.states.iter() {
            self.states.insert(image(s));
        }

        for (&(a, b), ts) in other.transitions.iter() {
            for t in ts {
                self.insert_raw(image(a), image(b), t.clone());
            }
        }

        self.remove_all_at(from, to);

        self.insert_raw(
            from,
            image(StateId(0)),
            Transition::new(Move::Epsilon, "inline-enter"),
        );

        let terminals: Vec<StateId> = if other.accepting.is_empty() {
            vec![other.last_id()]
        } else {
            other.accepting.iter().copied().collect()
        };
        for terminal in terminals {
            self.insert_raw(
                image(terminal),
                to,
                Transition::new(Move::Epsilon, "inline-exit"),
            );
        }

        Ok(())
    }
}

impl Default for Fsa {
    fn default() -> Self {
        Self::create()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::Transition;

    #[test]
    fn create_has_single_initial_state() {
        let fsa = Fsa::create();
        assert_eq!(fsa.states().len(), 1);
        assert!(fsa.states().contains(&StateId(0)));
        assert_eq!(fsa.cursor(), StateId(0));
        assert!(fsa.accepting_states().is_empty());
    }

    #[test]
    fn add_transition_rejects_empty_label() {
        let mut fsa = Fsa::create();
        let err = fsa
            .add_transition(StateRef::Current, StateRef::New, Transition::new(Move::Send, ""))
            .unwrap_err();
        assert!(matches!(err, Error::InvariantViolation { .. }));
    }

    #[test]
    fn add_transition_rejects_unknown_endpoint() {
        let mut fsa = Fsa::create();
        let err = fsa
            .add_transition(StateRef::Unknown, StateRef::New, Transition::new(Move::Send, "c"))
            .unwrap_err();
        assert!(matches!(err, Error::InvariantViolation { .. }));
    }

    #[test]
    fn add_transition_new_advances_cursor_and_last_id() {
        let mut fsa = Fsa::create();
        let (from, to) = fsa
            .add_transition(StateRef::Current, StateRef::New, Transition::new(Move::Send, "c"))
            .unwrap();
        assert_eq!(from, StateId(0));
        assert_eq!(to, StateId(1));
        assert_eq!(fsa.cursor(), StateId(1));
        assert_eq!(fsa.last_id(), StateId(1));
    }

    #[test]
    fn duplicate_parallel_transitions_are_suppressed() {
        let mut fsa = Fsa::create();
        fsa.insert_raw(StateId(0), StateId(1), Transition::new(Move::Send, "c"));
        fsa.insert_raw(StateId(0), StateId(1), Transition::new(Move::Send, "c"));
        let mut count = 0;
        fsa.for_each_transition(|_, _, _| count += 1);
        assert_eq!(count, 1);
    }

    #[test]
    fn remove_transition_is_noop_when_absent() {
        let mut fsa = Fsa::create();
        fsa.remove_transition(StateId(0), StateId(1), Move::Send, "c");
        let mut count = 0;
        fsa.for_each_transition(|_, _, _| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn remove_transition_removes_only_matching_move_label() {
        let mut fsa = Fsa::create();
        fsa.insert_raw(StateId(0), StateId(1), Transition::new(Move::Send, "c"));
        fsa.insert_raw(StateId(0), StateId(1), Transition::new(Move::Send, "d"));
        fsa.remove_transition(StateId(0), StateId(1), Move::Send, "c");
        let remaining: Vec<_> = fsa.transitions_from(StateId(0));
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].1.label, "d");
    }

    #[test]
    fn copy_is_structurally_equal_and_independent() {
        let mut fsa = Fsa::create();
        fsa.add_transition(StateRef::Current, StateRef::New, Transition::new(Move::Send, "c"))
            .unwrap();
        let mut copy = fsa.copy();
        assert_eq!(copy.states(), fsa.states());

        copy.add_transition(StateRef::Current, StateRef::New, Transition::new(Move::Recv, "d"))
            .unwrap();
        assert_ne!(copy.states().len(), fsa.states().len());
    }

    #[test]
    fn epsilon_closure_follows_epsilon_edges_only() {
        let mut fsa = Fsa::create();
        fsa.insert_raw(StateId(0), StateId(1), Transition::new(Move::Epsilon, "e1"));
        fsa.insert_raw(StateId(1), StateId(2), Transition::new(Move::Epsilon, "e2"));
        fsa.insert_raw(StateId(2), StateId(3), Transition::new(Move::Send, "c"));
        let mut seed = BTreeSet::new();
        seed.insert(StateId(0));
        let closure = fsa.epsilon_closure(&seed);
        assert_eq!(
            closure,
            BTreeSet::from([StateId(0), StateId(1), StateId(2)])
        );
    }

    #[test]
    fn inline_removes_original_edge_and_wires_through_copy() {
        let mut outer = Fsa::create();
        let (from, to) = outer
            .add_transition(StateRef::Current, StateRef::New, Transition::new(Move::Call, "f"))
            .unwrap();
        let offset = outer.last_id().as_u32() + 1;

        let mut inner = Fsa::create();
        inner
            .add_transition(StateRef::Current, StateRef::New, Transition::new(Move::Send, "c"))
            .unwrap();
        inner.mark_accepting(StateId(1)).unwrap();

        outer.inline(from, to, &inner).unwrap();

        // (i) no transition with the original endpoints remains
        let direct: Vec<_> = outer
            .transitions_from(from)
            .into_iter()
            .filter(|(dst, _)| *dst == to)
            .collect();
        assert!(direct.is_empty());

        // (ii) an ε-hop reaches the image of `inner`'s state 0
        let closure = outer.epsilon_closure(&BTreeSet::from([from]));
        assert!(closure.len() >= 2);

        // (iii) from the accepting image, `to` is reachable by exactly one ε-hop
        let accepting_image = StateId(1 /* inner's accepting state id */ + offset);
        let out = outer.transitions_from(accepting_image);
        let eps_to_to: Vec<_> = out
            .iter()
            .filter(|(dst, t)| *dst == to && t.mv == Move::Epsilon)
            .collect();
        assert_eq!(eps_to_to.len(), 1);
    }

    #[test]
    fn inline_with_no_accepting_state_uses_max_id_as_terminal() {
        let mut outer = Fsa::create();
        let (from, to) = outer
            .add_transition(StateRef::Current, StateRef::New, Transition::new(Move::Call, "f"))
            .unwrap();
        let offset = outer.last_id().as_u32() + 1;

        let mut inner = Fsa::create();
        inner
            .add_transition(StateRef::Current, StateRef::New, Transition::new(Move::Send, "c"))
            .unwrap();
        // no accepting state marked

        outer.inline(from, to, &inner).unwrap();

        let image_of_inner_max = StateId(inner.last_id().as_u32() + offset);
        let out = outer.transitions_from(image_of_inner_max);
        assert!(out.iter().any(|(dst, t)| *dst == to && t.mv == Move::Epsilon));
    }
}
