//! # Core Module
//!
//! Stateless building blocks of the pipeline: the in-memory
//! [`models::structure::AtomicStructure`] and the structure file readers and
//! writers in [`io`].
//!
//! - **Structure Representation** ([`models`]) - atoms, masses, positions and unit cells
//! - **File I/O** ([`io`]) - XYZ and VASP POSCAR formats plus format detection

pub mod io;
pub mod models;
