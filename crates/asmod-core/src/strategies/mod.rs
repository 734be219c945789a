//! Pipeline strategies and the machinery to dispatch them.
//!
//! A strategy is built from a configuration record through the
//! [`StrategyRegistry`](registry::StrategyRegistry) and then driven with a
//! [`StrategyContext`](context::StrategyContext) that lends it the caller's
//! cache and collections. Each call returns a
//! [`SessionUpdate`](session::SessionUpdate) for the caller to merge.

pub mod config;
pub mod context;
pub mod download;
pub mod error;
pub mod mapper;
pub mod parse;
pub mod registry;
pub mod session;

use context::StrategyContext;
use error::StrategyError;
use session::{Session, SessionUpdate};

pub trait Strategy {
    /// Prepares the strategy. Nothing in this crate needs preparation.
    fn initialize(
        &self,
        _ctx: &mut StrategyContext<'_>,
        _session: Option<&Session>,
    ) -> Result<SessionUpdate, StrategyError> {
        Ok(SessionUpdate::new())
    }

    fn get(
        &self,
        ctx: &mut StrategyContext<'_>,
        session: Option<&Session>,
    ) -> Result<SessionUpdate, StrategyError>;
}
