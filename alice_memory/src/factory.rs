//! Store selection at startup.

use std::sync::Arc;

use alice_core::{MemoryConfig, SessionStore, StoreBackend, StoreConfig};
use tracing::{info, warn};

use crate::store::MemorySessionStore;
use crate::sweep::{Sweeper, spawn_sweeper};

/// The selected store and the background work that keeps it tidy.
///
/// Dropping the handle stops the sweeper; the store itself lives on in any
/// `Arc` clones handed out by [`StoreHandle::store`].
pub struct StoreHandle {
    store: Arc<dyn SessionStore>,
    sweeper: Option<Sweeper>,
}

impl StoreHandle {
    #[must_use]
    pub fn store(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.store)
    }

    #[must_use]
    pub fn backend(&self) -> StoreBackend {
        self.store.backend()
    }

    #[must_use]
    pub const fn has_sweeper(&self) -> bool {
        self.sweeper.is_some()
    }

    pub async fn shutdown(mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.shutdown().await;
        }
        info!("Session store shut down");
    }
}

/// Build the configured store, falling back to memory when Redis is
/// unreachable or not compiled in. Never fails.
pub async fn select_store(store: &StoreConfig, memory: &MemoryConfig) -> StoreHandle {
    let selected: Arc<dyn SessionStore> = match store.backend {
        StoreBackend::Memory => Arc::new(MemorySessionStore::new(memory)),
        StoreBackend::Redis => match connect_redis(store, memory).await {
            Some(redis) => redis,
            None => Arc::new(MemorySessionStore::new(memory)),
        },
    };

    // Redis evicts by TTL; only the in-process store needs sweeping.
    let sweeper = (selected.backend() == StoreBackend::Memory)
        .then(|| spawn_sweeper(Arc::clone(&selected), memory.sweep_interval()));

    info!("Session store ready: backend={}", selected.backend());
    StoreHandle {
        store: selected,
        sweeper,
    }
}

#[cfg(feature = "redis-backend")]
async fn connect_redis(store: &StoreConfig, memory: &MemoryConfig) -> Option<Arc<dyn SessionStore>> {
    use crate::store::RedisSessionStore;

    match tokio::time::timeout(
        store.connect_timeout(),
        RedisSessionStore::connect(store, memory),
    )
    .await
    {
        Ok(Ok(redis)) => Some(Arc::new(redis)),
        Ok(Err(e)) => {
            warn!(
                "Redis unavailable at {}: {e}. Falling back to in-memory store",
                store.redis_url
            );
            None
        }
        Err(_) => {
            warn!(
                "Redis at {} did not answer within {}s. Falling back to in-memory store",
                store.redis_url, store.connect_timeout_secs
            );
            None
        }
    }
}

#[cfg(not(feature = "redis-backend"))]
#[expect(
    clippy::unused_async,
    reason = "Same signature as the redis-backend variant"
)]
async fn connect_redis(store: &StoreConfig, _memory: &MemoryConfig) -> Option<Arc<dyn SessionStore>> {
    warn!(
        "Redis backend requested for {} but this build lacks the redis-backend feature. \
         Falling back to in-memory store",
        store.redis_url
    );
    None
}
