//! Transition records (spec §3).

use std::sync::Arc;

use compact_str::CompactString;
use facet::Facet;

use choreo_types::ActualArg;

use crate::Fsa;

/// The closed set of transition move kinds. `Call` and `Epsilon` must be
/// eliminated before the composition stage; `Empty` is reserved for
/// CA-level labels emitted by the composer.
#[derive(Facet, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Move {
    Call,
    Spawn,
    Send,
    Recv,
    Epsilon,
    Empty,
}

/// A shared, read-only reference to a local view, embedded in the payload
/// of a resolved `Spawn` transition. Shared because the same produced local
/// view is referenced from exactly the one spawn edge that created it, but
/// the edge itself may be copied (e.g. by [`Fsa::copy`]) without needing to
/// deep-copy the referenced view.
#[derive(Clone, Debug)]
pub struct ViewRef {
    pub name: String,
    pub fsa: Arc<Fsa>,
}

/// The opaque payload slot of a transition, modeled as a closed record
/// (per spec §9) rather than a dynamically-typed generic slot: the list of
/// actual channel arguments passed at a `Call`/`Spawn` site, and — once a
/// `Spawn` has been resolved by the local-view extractor — a reference to
/// the local view it produced.
#[derive(Clone, Debug, Default)]
pub struct Payload {
    pub actuals: Vec<ActualArg>,
    pub view_ref: Option<ViewRef>,
}

impl Payload {
    pub fn actuals(actuals: Vec<ActualArg>) -> Self {
        Self {
            actuals,
            view_ref: None,
        }
    }
}

/// A single transition: `{move, label, payload?}`. `label` is a non-empty
/// symbol — the channel name for `Send`/`Recv`, the target procedure name
/// for `Call`/`Spawn`, an explanatory marker for `Epsilon`, or the raw
/// CA-level label for `Empty`.
#[derive(Clone, Debug)]
pub struct Transition {
    pub mv: Move,
    pub label: CompactString,
    pub payload: Option<Payload>,
}

impl Transition {
    pub fn new(mv: Move, label: impl Into<CompactString>) -> Self {
        Self {
            mv,
            label: label.into(),
            payload: None,
        }
    }

    pub fn with_payload(mv: Move, label: impl Into<CompactString>, payload: Payload) -> Self {
        Self {
            mv,
            label: label.into(),
            payload: Some(payload),
        }
    }

    /// The key used for parallel-transition duplicate suppression and for
    /// matching in `remove_transition`: the `(move, label)` pair. Payload is
    /// deliberately excluded — spec §3 defines the no-duplicates invariant
    /// over `(from, to, move, label)` only.
    pub fn dedup_key(&self) -> (Move, &str) {
        (self.mv, self.label.as_str())
    }
}

impl std::fmt::Display for Transition {
    /// The stable, human-readable printed form of spec §6.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.mv {
            Move::Send => write!(f, "→ {}", self.label),
            Move::Recv => write!(f, "← {}", self.label),
            Move::Spawn => write!(f, "⋁ {}", self.label),
            Move::Epsilon => write!(f, "ε {}", self.label),
            Move::Call => write!(f, "⨏ {}", self.label),
            Move::Empty => write!(f, "{}", self.label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printed_forms_match_spec() {
        assert_eq!(Transition::new(Move::Send, "c").to_string(), "→ c");
        assert_eq!(Transition::new(Move::Recv, "c").to_string(), "← c");
        assert_eq!(Transition::new(Move::Spawn, "worker").to_string(), "⋁ worker");
        assert_eq!(
            Transition::new(Move::Epsilon, "if-block-start").to_string(),
            "ε if-block-start"
        );
        assert_eq!(Transition::new(Move::Call, "g").to_string(), "⨏ g");
        assert_eq!(
            Transition::new(Move::Empty, "main ⋁ greeter").to_string(),
            "main ⋁ greeter"
        );
    }

    #[test]
    fn dedup_key_ignores_payload() {
        let a = Transition::with_payload(Move::Call, "f", Payload::actuals(vec![]));
        let b = Transition::new(Move::Call, "f");
        assert_eq!(a.dedup_key(), b.dedup_key());
    }
}
