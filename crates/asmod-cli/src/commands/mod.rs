pub mod parse;
pub mod run;

use asmod::store::cache::{DataCache, DirCache, MemoryCache};
use std::path::Path;
use tracing::info;

/// Opens the cache a command works against: a directory cache when a
/// directory is given, otherwise an in-memory one for the life of the process.
pub fn open_cache(dir: Option<&Path>) -> crate::error::Result<Box<dyn DataCache>> {
    Ok(match dir {
        Some(dir) => {
            info!("Using data cache directory {:?}", dir);
            Box::new(DirCache::open(dir)?)
        }
        None => Box::new(MemoryCache::new()),
    })
}
