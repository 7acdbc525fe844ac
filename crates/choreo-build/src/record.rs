//! `Procedure` and `File` records (spec §3).

use std::collections::BTreeMap;

use compact_str::CompactString;

use choreo_fsa::Fsa;
use choreo_types::{ChannelMetadata, FormalArg};

/// One procedure's declared channels, inlinable formals, and Scope FSA.
#[derive(Clone, Debug)]
pub struct Procedure {
    pub name: CompactString,
    pub local_channels: BTreeMap<CompactString, ChannelMetadata>,
    pub inlinable_args: BTreeMap<CompactString, FormalArg>,
    pub scope_fsa: Fsa,
}

impl Procedure {
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            local_channels: BTreeMap::new(),
            inlinable_args: BTreeMap::new(),
            scope_fsa: Fsa::create(),
        }
    }

    /// Channel metadata visible inside this procedure: its own locals win
    /// over a same-named global.
    pub fn resolve_channel<'a>(
        &'a self,
        name: &str,
        globals: &'a BTreeMap<CompactString, ChannelMetadata>,
    ) -> Option<&'a ChannelMetadata> {
        self.local_channels
            .get(name)
            .or_else(|| globals.get(name))
    }
}

/// `{global-channels, procedures}` (spec §3). Procedures reference global
/// channels by name; a procedure's own local declaration shadows a
/// same-named global.
#[derive(Clone, Debug, Default)]
pub struct File {
    pub global_channels: BTreeMap<CompactString, ChannelMetadata>,
    pub procedures: BTreeMap<CompactString, Procedure>,
}

impl File {
    pub fn new() -> Self {
        Self::default()
    }
}
