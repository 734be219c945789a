//! # asmod
//!
//! Atomistic structure parsing and metadata mapping for data pipelines.
//!
//! Structure files (XYZ, extended XYZ, VASP POSCAR) are downloaded into a
//! content-addressed cache, parsed into an in-memory structure, and mapped
//! onto instances of a metadata schema collected under a caller-owned
//! collection.
//!
//! The crate is layered like this:
//!
//! - **[`core`]: The Foundation.** The [`AtomicStructure`](core::models::structure::AtomicStructure)
//!   model, the element table, and the structure file readers and writers.
//!
//! - **[`store`]: State owned by the caller.** The data cache, entity schemas,
//!   instances and collections.
//!
//! - **[`strategies`]: Pipeline steps.** Download, parse and mapper strategies,
//!   their configuration records, and the registry that builds them.
//!
//! - **[`workflows`]: The Public API.** Chains the strategies into a complete
//!   parse-and-map run.

pub mod core;
pub mod store;
pub mod strategies;
pub mod workflows;
