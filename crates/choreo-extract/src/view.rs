//! `LocalView` and the run-scoped ordinal counter (spec §3, §9).

use choreo_fsa::Fsa;

/// `{name, fsa}` — `name` is derived from the procedure name and a
/// monotonically-increasing ordinal ensuring uniqueness across the
/// analysis (spec §3).
#[derive(Clone, Debug)]
pub struct LocalView {
    pub name: String,
    pub fsa: Fsa,
}

/// The ordinal counter's lifecycle is "reset at the start of each
/// top-level analysis run" (spec §9) — scoped to this object, instantiated
/// once per call to [`crate::extract_local_views`], rather than a global.
#[derive(Debug, Default)]
pub struct RunContext {
    next: u32,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next_ordinal(&mut self) -> u32 {
        let n = self.next;
        self.next += 1;
        n
    }
}
