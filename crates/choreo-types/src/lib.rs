//! Domain value types shared across the choreography pipeline.
//!
//! Everything here is plain data: channel/formal-argument metadata and the
//! error taxonomy of the pipeline. Graph-shaped types (`Move`, `Transition`,
//! the FSA kernel itself) live in `choreo-fsa`, which depends on this crate
//! rather than the other way around.

use compact_str::CompactString;
use facet::Facet;

mod error;

pub use error::{Error, SourcePos};

////////////////////////////////////////////////////////////////////////////////
//  channel metadata
////////////////////////////////////////////////////////////////////////////////

/// Metadata for a channel declared either at file scope or inside a
/// procedure body. Propagated unchanged, by name, into every FSA that
/// references the channel.
#[derive(Facet, Clone, Debug, PartialEq, Eq)]
pub struct ChannelMetadata {
    pub name: CompactString,
    pub element_type_name: CompactString,
    pub asynchronous: bool,
}

impl ChannelMetadata {
    pub fn new(
        name: impl Into<CompactString>,
        element_type_name: impl Into<CompactString>,
        asynchronous: bool,
    ) -> Self {
        Self {
            name: name.into(),
            element_type_name: element_type_name.into(),
            asynchronous,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
//  formal / actual arguments
////////////////////////////////////////////////////////////////////////////////

/// What kind of value a procedure's formal argument stands for.
#[derive(Facet, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FormalKind {
    Channel,
    Procedure,
}

/// A formal argument of a procedure that is eligible for inlining
/// specialization: its position and name are recorded so that the
/// extractor can rewrite transitions referencing it by name.
#[derive(Facet, Clone, Debug, PartialEq, Eq)]
pub struct FormalArg {
    pub position: usize,
    pub name: CompactString,
    pub kind: FormalKind,
}

/// An actual argument passed at a `Call`/`Spawn` site: its position (for
/// matching against formals) and the name of the channel or procedure
/// passed.
#[derive(Facet, Clone, Debug, PartialEq, Eq)]
pub struct ActualArg {
    pub position: usize,
    pub name: CompactString,
}

impl ActualArg {
    pub fn new(position: usize, name: impl Into<CompactString>) -> Self {
        Self {
            position,
            name: name.into(),
        }
    }
}
