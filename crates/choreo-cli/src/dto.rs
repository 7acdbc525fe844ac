//! JSON-serializable views onto the pipeline's output types (spec
//! SPEC_FULL §F): `Fsa`/`Transition`/`LocalView`/`Ca` carry no `Facet` derive
//! of their own (the kernel is rebuilt from scratch by every stage and
//! wasn't worth coupling to a wire format), so the CLI converts to these
//! plain records using only the public iteration API.

use facet::Facet;

use choreo_compose::{Ca, Frozen, Pair};
use choreo_extract::LocalView;
use choreo_fsa::{Fsa, Move};

fn move_name(mv: Move) -> &'static str {
    match mv {
        Move::Call => "call",
        Move::Spawn => "spawn",
        Move::Send => "send",
        Move::Recv => "recv",
        Move::Epsilon => "epsilon",
        Move::Empty => "empty",
    }
}

#[derive(Facet, Clone, Debug)]
pub struct TransitionDto {
    pub from: u32,
    pub to: u32,
    pub mv: String,
    pub label: String,
}

#[derive(Facet, Clone, Debug)]
pub struct FsaDto {
    pub states: Vec<u32>,
    pub accepting: Vec<u32>,
    pub transitions: Vec<TransitionDto>,
}

impl FsaDto {
    pub fn from_fsa(fsa: &Fsa) -> Self {
        let mut states = Vec::new();
        fsa.for_each_state(|s| states.push(s.as_u32()));

        let accepting = fsa.accepting_states().iter().map(|s| s.as_u32()).collect();

        let mut transitions = Vec::new();
        fsa.for_each_transition(|from, to, t| {
            transitions.push(TransitionDto {
                from: from.as_u32(),
                to: to.as_u32(),
                mv: move_name(t.mv).to_string(),
                label: t.label.to_string(),
            });
        });

        Self {
            states,
            accepting,
            transitions,
        }
    }
}

#[derive(Facet, Clone, Debug)]
pub struct LocalViewDto {
    pub name: String,
    pub fsa: FsaDto,
}

impl LocalViewDto {
    pub fn from_view(view: &LocalView) -> Self {
        Self {
            name: view.name.clone(),
            fsa: FsaDto::from_fsa(&view.fsa),
        }
    }
}

fn frozen_label(views: &[LocalView], f: Frozen) -> String {
    match f {
        Frozen::Wildcard => "⊥".to_string(),
        Frozen::View { view, state } => format!("{}@{state}", views[view].name),
    }
}

#[derive(Facet, Clone, Debug)]
pub struct CaEdgeDto {
    pub from: usize,
    pub to: usize,
    pub label: String,
}

#[derive(Facet, Clone, Debug)]
pub struct CaDto {
    pub states: Vec<String>,
    pub accepting: Vec<bool>,
    pub edges: Vec<CaEdgeDto>,
}

impl CaDto {
    pub fn from_ca(ca: &Ca, views: &[LocalView]) -> Self {
        let states = ca
            .states
            .iter()
            .map(|Pair(a, b)| format!("({}, {})", frozen_label(views, *a), frozen_label(views, *b)))
            .collect();
        let edges = ca
            .edges
            .iter()
            .map(|(from, to, label)| CaEdgeDto {
                from: *from,
                to: *to,
                label: label.clone(),
            })
            .collect();
        Self {
            states,
            accepting: ca.accepting.clone(),
            edges,
        }
    }
}
