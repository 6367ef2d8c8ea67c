//! Segment Grammar: grammar-driven subdivision of 1D segments.
//!
//! Fills a segment of known length with named modules, following a small
//! grammar of sequences, priority fallbacks, weighted random choices, and
//! repetitions. Results are deterministic for a given grammar, length, and
//! seed.

pub mod core;
pub mod schema;
