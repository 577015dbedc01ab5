//! The native object behind a database handle.

use crate::logging::HostLogger;
use crate::types::LevelKvOpenOptions;
use levelkv_core::{BlockCache, CoreResult, Db, Logger, Options};
use std::path::Path;
use std::sync::Arc;

/// An open database with the auxiliary objects it owns.
///
/// Fields are declared in teardown order: database, cache, logger.
pub struct DatabaseSession {
    db: Db,
    cache: Option<Arc<BlockCache>>,
    logger: Arc<dyn Logger>,
}

impl DatabaseSession {
    /// Opens the database at `path`, or an in-memory one when `path` is `None`.
    ///
    /// A logger is always attached; a cache only when `cache_size > 0`.
    pub fn open(path: Option<&Path>, options: &LevelKvOpenOptions) -> CoreResult<Self> {
        let logger: Arc<dyn Logger> = Arc::new(HostLogger);
        let cache = (options.cache_size > 0).then(|| Arc::new(BlockCache::new(options.cache_size)));

        let mut engine_options = Options::new()
            .create_if_missing(options.create_if_missing)
            .error_if_exists(options.error_if_exists)
            .paranoid_checks(options.paranoid_checks)
            .block_size(options.block_size)
            .write_buffer_size(options.write_buffer_size)
            .info_log(Arc::clone(&logger));
        if let Some(cache) = &cache {
            engine_options = engine_options.block_cache(Arc::clone(cache));
        }

        let db = match path {
            Some(path) => Db::open(path, engine_options)?,
            None => Db::open_in_memory(engine_options)?,
        };
        Ok(Self { db, cache, logger })
    }

    /// The engine database.
    pub fn db(&self) -> &Db {
        &self.db
    }

    /// The session-owned block cache, if one was requested.
    pub fn cache(&self) -> Option<&Arc<BlockCache>> {
        self.cache.as_ref()
    }

    /// Closes the database, then releases the cache and the logger.
    ///
    /// Close errors are reported to the logger, never to the caller.
    pub fn close(self) {
        let Self { db, cache, logger } = self;
        if let Err(err) = db.close() {
            logger.log(&format!("error while closing: {err}"));
        }
        drop(db);
        drop(cache);
        drop(logger);
    }
}
