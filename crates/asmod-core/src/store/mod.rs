//! # Store Module
//!
//! The shared resources the strategies read from and write to. All of them
//! are owned by the caller and lent to a strategy for the duration of a call.
//!
//! - **Content Cache** ([`cache`]) - raw downloads and parsed structures under content-derived keys
//! - **Entities** ([`entity`], [`resolver`]) - JSON metadata schemas and how references to them are resolved
//! - **Records** ([`instance`], [`collection`]) - typed instances and the collections that own them

pub mod cache;
pub mod collection;
pub mod entity;
pub mod instance;
pub mod resolver;
