//! # Workflows Module
//!
//! High-level entry points that chain strategies the way a pipeline host
//! would: build each step from the registry, thread the session through, and
//! hand back the keys and ids the caller needs.
//!
//! - **Pipeline Workflow** ([`pipeline`]) - parse a resource and map the
//!   resulting structure into a fresh collection.

pub mod pipeline;
