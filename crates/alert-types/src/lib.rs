//! Core types and traits for the alert subscription graph.
//!
//! Node/edge records, parameterized patterns, and the sorted key set live here so that every
//! store backend and the domain layer agree on one vocabulary.

mod dto;
mod graph;
mod keyset;
mod query;
mod traits;

pub use dto::*;
pub use graph::*;
pub use keyset::KeySet;
pub use query::*;
pub use traits::*;
