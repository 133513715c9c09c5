//! Cache-aside tier in front of the user directory
//!
//! The cache holds a derived, time-bounded copy of user records. It is never
//! authoritative: a miss is a normal outcome, reported as `NotFound`.

pub mod memory;
pub mod redis_cache;

pub use memory::{InMemoryUserCache, NoOpUserCache};
pub use redis_cache::RedisUserCache;

use crate::config::{CacheBackendKind, CacheConfig};
use crate::context::Deadline;
use crate::domain::{StringUuid, User};
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Cache key prefixes
mod keys {
    use crate::domain::StringUuid;

    pub const USER: &str = "user";

    pub fn user(id: StringUuid) -> String {
        format!("{}:{}", USER, id)
    }
}

/// Hash field names of a cached user
mod fields {
    pub const ID: &str = "id";
    pub const LOGIN: &str = "login";
    pub const PASSWORD: &str = "password";
    pub const ROLE: &str = "role";
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserCache: Send + Sync {
    /// Fetch a cached user. A miss is `NotFound`.
    async fn get(&self, deadline: Deadline, id: StringUuid) -> Result<User>;
    /// Store `user` for `ttl`. Entries are never stored without an expiry.
    async fn set(&self, deadline: Deadline, user: &User, ttl: Duration) -> Result<()>;
    /// Drop the entry. Deleting an absent key succeeds.
    async fn delete(&self, deadline: Deadline, id: StringUuid) -> Result<()>;
    /// Readiness probe
    async fn ping(&self) -> Result<()>;
}

/// Cache implementation selected by `CACHE_BACKEND`
#[derive(Clone)]
pub enum CacheBackend {
    Redis(RedisUserCache),
    Memory(InMemoryUserCache),
    Disabled(NoOpUserCache),
}

impl CacheBackend {
    pub async fn from_config(config: &CacheConfig) -> Result<Self> {
        Ok(match config.backend {
            CacheBackendKind::Redis => CacheBackend::Redis(RedisUserCache::new(&config.redis_url).await?),
            CacheBackendKind::Memory => CacheBackend::Memory(InMemoryUserCache::new()),
            CacheBackendKind::None => CacheBackend::Disabled(NoOpUserCache),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            CacheBackend::Redis(_) => "redis",
            CacheBackend::Memory(_) => "memory",
            CacheBackend::Disabled(_) => "none",
        }
    }
}

#[async_trait]
impl UserCache for CacheBackend {
    async fn get(&self, deadline: Deadline, id: StringUuid) -> Result<User> {
        match self {
            CacheBackend::Redis(c) => c.get(deadline, id).await,
            CacheBackend::Memory(c) => c.get(deadline, id).await,
            CacheBackend::Disabled(c) => c.get(deadline, id).await,
        }
    }

    async fn set(&self, deadline: Deadline, user: &User, ttl: Duration) -> Result<()> {
        match self {
            CacheBackend::Redis(c) => c.set(deadline, user, ttl).await,
            CacheBackend::Memory(c) => c.set(deadline, user, ttl).await,
            CacheBackend::Disabled(c) => c.set(deadline, user, ttl).await,
        }
    }

    async fn delete(&self, deadline: Deadline, id: StringUuid) -> Result<()> {
        match self {
            CacheBackend::Redis(c) => c.delete(deadline, id).await,
            CacheBackend::Memory(c) => c.delete(deadline, id).await,
            CacheBackend::Disabled(c) => c.delete(deadline, id).await,
        }
    }

    async fn ping(&self) -> Result<()> {
        match self {
            CacheBackend::Redis(c) => c.ping().await,
            CacheBackend::Memory(c) => c.ping().await,
            CacheBackend::Disabled(c) => c.ping().await,
        }
    }
}
