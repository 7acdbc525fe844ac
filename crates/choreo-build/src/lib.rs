//! The statement-directed builder (spec §4.2): walks an AST and populates,
//! per procedure, a `Procedure` record holding its declared channels,
//! inlinable formal arguments, and a Scope FSA (NFA-ε over communication
//! actions and control-flow markers). Also produces the `File` record
//! holding global channels and the name→procedure map.

mod builder;
mod record;

pub use builder::build_file;
pub use record::{File, Procedure};
