//! The choreography composer (spec §4.4): builds the product of frozen
//! views, computes the set of pairs reachable by synchronization steps from
//! the entry pair, and emits the discovered pairs and their Spawn/Send/Recv
//! edges as a single CA.

mod ca;
mod pair;

pub use ca::{compose, Ca};
pub use pair::{Frozen, Pair};
