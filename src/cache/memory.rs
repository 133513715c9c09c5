//! Process-local cache backends

use super::UserCache;
use crate::context::Deadline;
use crate::domain::{StringUuid, User};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

fn miss(id: StringUuid) -> AppError {
    AppError::NotFound(format!("User {} not cached", id))
}

/// In-memory cache with per-entry expiry
#[derive(Clone, Default)]
pub struct InMemoryUserCache {
    entries: Arc<RwLock<HashMap<StringUuid, (User, Instant)>>>,
}

impl InMemoryUserCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until next read
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl UserCache for InMemoryUserCache {
    async fn get(&self, deadline: Deadline, id: StringUuid) -> Result<User> {
        deadline.check("cache_get")?;
        {
            let entries = self.entries.read().await;
            match entries.get(&id) {
                Some((user, expires_at)) if Instant::now() < *expires_at => {
                    return Ok(user.clone())
                }
                Some(_) => {}
                None => return Err(miss(id)),
            }
        }

        // Expired: evict lazily
        self.entries.write().await.remove(&id);
        Err(miss(id))
    }

    async fn set(&self, deadline: Deadline, user: &User, ttl: Duration) -> Result<()> {
        deadline.check("cache_set")?;
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| AppError::InvalidArgument("cache ttl out of range".to_string()))?;
        self.entries
            .write()
            .await
            .insert(user.id, (user.clone(), expires_at));
        Ok(())
    }

    async fn delete(&self, deadline: Deadline, id: StringUuid) -> Result<()> {
        deadline.check("cache_delete")?;
        self.entries.write().await.remove(&id);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Disabled cache: every read misses, writes are dropped
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpUserCache;

#[async_trait]
impl UserCache for NoOpUserCache {
    async fn get(&self, deadline: Deadline, id: StringUuid) -> Result<User> {
        deadline.check("cache_get")?;
        Err(miss(id))
    }

    async fn set(&self, deadline: Deadline, _user: &User, _ttl: Duration) -> Result<()> {
        deadline.check("cache_set")
    }

    async fn delete(&self, deadline: Deadline, _id: StringUuid) -> Result<()> {
        deadline.check("cache_delete")
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn alice() -> User {
        User::new("alice", "p1", "user").with_id(StringUuid::new_v4())
    }

    #[tokio::test]
    async fn test_round_trip_then_expiry() {
        let cache = InMemoryUserCache::new();
        let user = alice();

        cache
            .set(Deadline::none(), &user, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(cache.get(Deadline::none(), user.id).await.unwrap(), user);

        tokio::time::sleep(Duration::from_millis(80)).await;
        let err = cache.get(Deadline::none(), user.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_overwrites_entry() {
        let cache = InMemoryUserCache::new();
        let user = alice();
        let promoted = User {
            role: "admin".to_string(),
            ..user.clone()
        };

        cache.set(Deadline::none(), &user, Duration::from_secs(60)).await.unwrap();
        cache.set(Deadline::none(), &promoted, Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.len().await, 1);
        assert!(cache.get(Deadline::none(), user.id).await.unwrap().is_admin());
    }

    #[tokio::test]
    async fn test_delete_absent_is_ok() {
        let cache = InMemoryUserCache::new();
        assert!(cache.delete(Deadline::none(), StringUuid::new_v4()).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_deadline_is_rejected() {
        let cache = InMemoryUserCache::new();
        let user = alice();

        let err = cache
            .set(Deadline::expired(), &user, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
        assert!(cache.is_empty().await);

        let err = cache.get(Deadline::expired(), user.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
    }

    #[tokio::test]
    async fn test_noop_always_misses() {
        let cache = NoOpUserCache;
        let user = alice();

        cache.set(Deadline::none(), &user, Duration::from_secs(60)).await.unwrap();
        let err = cache.get(Deadline::none(), user.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(cache.delete(Deadline::none(), user.id).await.is_ok());
    }
}
