//! The pipeline's error taxonomy (spec §7).
//!
//! Every error is reported at the layer that detects it and immediately
//! terminates the run; there is no retry and no partial-result mode. This
//! is a plain enum with a hand-written `Display`/`std::error::Error` impl,
//! matching how the example pack's own domain errors are modeled (see
//! `peeps-source`'s `Source`/`SourceId`, or `peeps-cli`'s `map_err(|e|
//! format!(...))` collapsing at the binary boundary) rather than pulling in
//! a derive-macro error crate for a half-dozen fixed variants.

use std::fmt;

/// A source position a `BadSyntax` error can be attributed to, when the
/// front-end supplied one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourcePos {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The front-end reported a malformed node in a position the builder
    /// visits.
    BadSyntax {
        message: String,
        at: Option<SourcePos>,
    },
    /// Formal/actual argument list lengths disagree at a call site the
    /// extractor is inlining.
    ArityMismatch {
        callee: String,
        expected: usize,
        actual: usize,
    },
    /// A `Spawn` target has no procedure record.
    UnresolvedSpawn { target: String },
    /// The composer could not find the named entry procedure.
    MissingEntry { name: String },
    /// An FSA operation was called with contradictory sentinels or an
    /// empty label.
    InvariantViolation { message: String },
    /// The composer's configured pair-count safety cap was exceeded.
    ComplexityExceeded { cap: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadSyntax { message, at: Some(pos) } => {
                write!(f, "bad syntax at {pos}: {message}")
            }
            Error::BadSyntax { message, at: None } => write!(f, "bad syntax: {message}"),
            Error::ArityMismatch {
                callee,
                expected,
                actual,
            } => write!(
                f,
                "arity mismatch calling `{callee}`: expected {expected} inlinable argument(s), got {actual}"
            ),
            Error::UnresolvedSpawn { target } => {
                write!(f, "spawn target `{target}` has no procedure record")
            }
            Error::MissingEntry { name } => {
                write!(f, "no procedure named `{name}` to use as entry point")
            }
            Error::InvariantViolation { message } => {
                write!(f, "FSA invariant violation: {message}")
            }
            Error::ComplexityExceeded { cap } => {
                write!(f, "composer pair-count exceeded configured cap of {cap}")
            }
        }
    }
}

impl std::error::Error for Error {}
