//! Redis-backed user cache
//!
//! Each user is a hash at `user:<id>` with fields `id`, `login`, `password`
//! and `role`, written together with its expiry in one atomic pipeline.

use super::{fields, keys, UserCache};
use crate::context::Deadline;
use crate::domain::{StringUuid, User};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use redis::{aio::ConnectionManager, AsyncCommands};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct RedisUserCache {
    conn: ConnectionManager,
}

fn record(operation: &'static str, result: &'static str, started: Instant) {
    counter!("identity_cache_operations_total", "operation" => operation, "result" => result)
        .increment(1);
    histogram!("identity_cache_operation_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}

/// Rebuild a user from its hash. `None` when a field is missing or the id is malformed.
fn user_from_fields(mut map: HashMap<String, String>) -> Option<User> {
    let id = map.get(fields::ID)?.parse::<StringUuid>().ok()?;
    Some(User {
        id,
        login: map.remove(fields::LOGIN)?,
        password: map.remove(fields::PASSWORD)?,
        role: map.remove(fields::ROLE)?,
    })
}

/// Redis expiry granularity is one second. Partial seconds round up so an
/// entry never expires earlier than asked, and never immediately.
fn ttl_secs(ttl: Duration) -> i64 {
    let whole = ttl.as_secs();
    let secs = if ttl.subsec_nanos() > 0 {
        whole.saturating_add(1)
    } else {
        whole
    };
    secs.clamp(1, i64::MAX as u64) as i64
}

impl RedisUserCache {
    pub async fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to create Redis client: {}", e)))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to connect to Redis: {}", e)))?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl UserCache for RedisUserCache {
    async fn get(&self, deadline: Deadline, id: StringUuid) -> Result<User> {
        deadline.check("cache_get")?;
        let started = Instant::now();
        let key = keys::user(id);
        let mut conn = self.conn.clone();

        let map: HashMap<String, String> = match conn.hgetall(&key).await {
            Ok(map) => map,
            Err(e) => {
                record("get", "error", started);
                return Err(AppError::from(e).context("cache_get"));
            }
        };
        if map.is_empty() {
            record("get", "miss", started);
            return Err(AppError::NotFound(format!("User {} not cached", id)));
        }

        match user_from_fields(map) {
            Some(user) => {
                record("get", "hit", started);
                Ok(user)
            }
            None => {
                tracing::warn!(key = %key, "Evicting malformed cache entry");
                let _: redis::RedisResult<()> = conn.del(&key).await;
                record("get", "miss", started);
                Err(AppError::NotFound(format!("User {} not cached", id)))
            }
        }
    }

    async fn set(&self, deadline: Deadline, user: &User, ttl: Duration) -> Result<()> {
        deadline.check("cache_set")?;
        let started = Instant::now();
        let key = keys::user(user.id);
        let id = user.id.to_string();
        let mut conn = self.conn.clone();

        let entries = [
            (fields::ID, id.as_str()),
            (fields::LOGIN, user.login.as_str()),
            (fields::PASSWORD, user.password.as_str()),
            (fields::ROLE, user.role.as_str()),
        ];
        let result: redis::RedisResult<()> = redis::pipe()
            .atomic()
            .hset_multiple(&key, &entries)
            .ignore()
            .expire(&key, ttl_secs(ttl))
            .ignore()
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => {
                record("set", "ok", started);
                Ok(())
            }
            Err(e) => {
                record("set", "error", started);
                Err(AppError::from(e).context("cache_set"))
            }
        }
    }

    async fn delete(&self, deadline: Deadline, id: StringUuid) -> Result<()> {
        deadline.check("cache_delete")?;
        let started = Instant::now();
        let mut conn = self.conn.clone();

        let result: redis::RedisResult<()> = conn.del(keys::user(id)).await;
        match result {
            Ok(()) => {
                record("delete", "ok", started);
                Ok(())
            }
            Err(e) => {
                record("delete", "error", started);
                Err(AppError::from(e).context("cache_delete"))
            }
        }
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
