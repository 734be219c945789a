//! In-memory representation of atomistic structures.

pub mod element;
pub mod structure;
