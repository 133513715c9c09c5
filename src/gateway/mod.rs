//! Gateway orchestrator: cache-aside reads, write-through refreshes and
//! delegation of authentication to the credential service.

use crate::cache::UserCache;
use crate::context::Deadline;
use crate::credential::CredentialIssuer;
use crate::directory::UserDirectory;
use crate::domain::{StringUuid, User, ROLE_USER};
use crate::error::{ErrorKind, Result};
use crate::jwt::TokenPair;
use std::sync::Arc;
use std::time::Duration;

/// Budget for the cache step that follows a committed directory write.
/// Independent of the request deadline, which may already be spent.
pub const CACHE_SYNC_BUDGET: Duration = Duration::from_millis(500);

pub struct UserGateway<D, C, A>
where
    D: UserDirectory,
    C: UserCache,
    A: CredentialIssuer,
{
    directory: Arc<D>,
    cache: Arc<C>,
    credentials: Arc<A>,
    cache_ttl: Duration,
}

impl<D, C, A> UserGateway<D, C, A>
where
    D: UserDirectory,
    C: UserCache,
    A: CredentialIssuer,
{
    pub fn new(directory: Arc<D>, cache: Arc<C>, credentials: Arc<A>, cache_ttl: Duration) -> Self {
        Self {
            directory,
            cache,
            credentials,
            cache_ttl,
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Full directory read; never served from the cache.
    pub async fn get_users(&self, deadline: Deadline) -> Result<Vec<User>> {
        self.directory.get_users(deadline).await
    }

    pub async fn get_user(&self, deadline: Deadline, id: StringUuid) -> Result<User> {
        match self.cache.get(deadline, id).await {
            Ok(user) => {
                tracing::debug!(user_id = %id, "Cache hit");
                return Ok(user);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) if e.kind() == ErrorKind::DeadlineExceeded => return Err(e),
            Err(e) => {
                tracing::warn!(user_id = %id, op = "cache_get", error = %e, "Cache read failed, falling back to directory");
            }
        }

        let user = self.directory.get_user_by_id(deadline, id).await?;
        self.fill(deadline, &user).await;
        Ok(user)
    }

    pub async fn insert(&self, deadline: Deadline, user: User) -> Result<User> {
        let created = self.directory.insert(deadline, user).await?;
        self.refresh_entry(&created).await;
        Ok(created)
    }

    pub async fn update(&self, deadline: Deadline, id: StringUuid, user: User) -> Result<User> {
        let updated = self.directory.update(deadline, id, user).await?;
        self.refresh_entry(&updated).await;
        Ok(updated)
    }

    pub async fn delete(&self, deadline: Deadline, id: StringUuid) -> Result<User> {
        let deleted = self.directory.delete(deadline, id).await?;
        if let Err(e) = self.evict(Deadline::after(CACHE_SYNC_BUDGET), id).await {
            tracing::warn!(user_id = %id, op = "cache_delete", error = %e, "Stale cache entry left behind");
        }
        Ok(deleted)
    }

    pub async fn login(&self, deadline: Deadline, login: &str, password: &str) -> Result<TokenPair> {
        self.credentials.login(deadline, login, password).await
    }

    /// Self-registration always creates a plain user with a directory-assigned id.
    pub async fn register(&self, deadline: Deadline, login: String, password: String) -> Result<User> {
        let user = User::new(login, password, ROLE_USER);
        self.credentials.register(deadline, user).await
    }

    pub async fn refresh(&self, deadline: Deadline, refresh_token: &str) -> Result<TokenPair> {
        self.credentials.refresh(deadline, refresh_token).await
    }

    pub async fn is_admin(&self, deadline: Deadline, id: StringUuid) -> Result<bool> {
        self.credentials.is_admin(deadline, id).await
    }

    /// Remove the cache entry, retrying once. Returns the last error when both attempts fail.
    pub async fn evict(&self, deadline: Deadline, id: StringUuid) -> Result<()> {
        match self.cache.delete(deadline, id).await {
            Ok(()) => Ok(()),
            Err(first) => {
                tracing::debug!(user_id = %id, error = %first, "Cache delete failed, retrying");
                self.cache.delete(deadline, id).await
            }
        }
    }

    /// Populate after a miss. Failures only cost a future miss.
    async fn fill(&self, deadline: Deadline, user: &User) {
        if let Err(e) = self.cache.set(deadline, user, self.cache_ttl).await {
            tracing::warn!(user_id = %user.id, op = "cache_set", error = %e, "Cache fill failed");
        }
    }

    /// Overwrite the entry after a successful write. When the overwrite fails the
    /// old entry is invalidated so readers fall through to the directory.
    async fn refresh_entry(&self, user: &User) {
        let deadline = Deadline::after(CACHE_SYNC_BUDGET);
        if let Err(e) = self.cache.set(deadline, user, self.cache_ttl).await {
            tracing::warn!(user_id = %user.id, op = "cache_set", error = %e, "Cache refresh failed, invalidating");
            if let Err(e) = self.evict(deadline, user.id).await {
                tracing::warn!(user_id = %user.id, op = "cache_delete", error = %e, "Stale cache entry left behind");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{InMemoryUserCache, MockUserCache};
    use crate::credential::MockCredentialIssuer;
    use crate::directory::MockUserDirectory;
    use crate::error::AppError;
    use mockall::predicate::*;
    use pretty_assertions::assert_eq;

    type TestGateway = UserGateway<MockUserDirectory, MockUserCache, MockCredentialIssuer>;

    fn gateway(
        directory: MockUserDirectory,
        cache: MockUserCache,
        credentials: MockCredentialIssuer,
    ) -> TestGateway {
        UserGateway::new(
            Arc::new(directory),
            Arc::new(cache),
            Arc::new(credentials),
            Duration::from_secs(600),
        )
    }

    fn alice() -> User {
        User::new("alice", "p1", "user").with_id(StringUuid::new_v4())
    }

    fn cache_miss(id: StringUuid) -> AppError {
        AppError::NotFound(format!("User {} not cached", id))
    }

    #[tokio::test]
    async fn test_get_user_cache_hit_skips_directory() {
        let user = alice();
        let cached = user.clone();
        let mut cache = MockUserCache::new();
        cache
            .expect_get()
            .with(always(), eq(user.id))
            .returning(move |_, _| Ok(cached.clone()));
        let mut directory = MockUserDirectory::new();
        directory.expect_get_user_by_id().never();

        let gw = gateway(directory, cache, MockCredentialIssuer::new());
        assert_eq!(gw.get_user(Deadline::none(), user.id).await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_get_user_miss_reads_directory_and_fills() {
        let user = alice();
        let stored = user.clone();
        let mut cache = MockUserCache::new();
        cache.expect_get().returning(|_, id| Err(cache_miss(id)));
        cache
            .expect_set()
            .withf(|_, u: &User, ttl| u.login == "alice" && *ttl == Duration::from_secs(600))
            .times(1)
            .returning(|_, _, _| Ok(()));
        let mut directory = MockUserDirectory::new();
        directory
            .expect_get_user_by_id()
            .times(1)
            .returning(move |_, _| Ok(stored.clone()));

        let gw = gateway(directory, cache, MockCredentialIssuer::new());
        assert_eq!(gw.get_user(Deadline::none(), user.id).await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_get_user_cache_outage_falls_back_and_fill_failure_is_swallowed() {
        let user = alice();
        let stored = user.clone();
        let mut cache = MockUserCache::new();
        cache
            .expect_get()
            .returning(|_, _| Err(AppError::internal("connection reset")));
        cache
            .expect_set()
            .returning(|_, _, _| Err(AppError::internal("connection reset")));
        let mut directory = MockUserDirectory::new();
        directory
            .expect_get_user_by_id()
            .returning(move |_, _| Ok(stored.clone()));

        let gw = gateway(directory, cache, MockCredentialIssuer::new());
        assert_eq!(gw.get_user(Deadline::none(), user.id).await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_get_user_absent_everywhere_is_not_found() {
        let mut cache = MockUserCache::new();
        cache.expect_get().returning(|_, id| Err(cache_miss(id)));
        cache.expect_set().never();
        let mut directory = MockUserDirectory::new();
        directory
            .expect_get_user_by_id()
            .returning(|_, id| Err(AppError::NotFound(format!("User {} not found", id))));

        let gw = gateway(directory, cache, MockCredentialIssuer::new());
        let err = gw
            .get_user(Deadline::none(), StringUuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_get_user_expired_deadline_stops_at_cache() {
        let mut cache = MockUserCache::new();
        cache
            .expect_get()
            .returning(|_, _| Err(AppError::DeadlineExceeded("cache_get: deadline exceeded".to_string())));
        let mut directory = MockUserDirectory::new();
        directory.expect_get_user_by_id().never();

        let gw = gateway(directory, cache, MockCredentialIssuer::new());
        let err = gw
            .get_user(Deadline::expired(), StringUuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
    }

    #[tokio::test]
    async fn test_insert_refreshes_cache_with_canonical_record() {
        let created = alice();
        let created_id = created.id;
        let returned = created.clone();
        let mut directory = MockUserDirectory::new();
        directory
            .expect_insert()
            .times(1)
            .returning(move |_, _| Ok(returned.clone()));
        let mut cache = MockUserCache::new();
        cache
            .expect_set()
            .withf(move |_, u: &User, _| u.id == created_id)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let gw = gateway(directory, cache, MockCredentialIssuer::new());
        let user = gw
            .insert(Deadline::none(), User::new("alice", "p1", "user"))
            .await
            .unwrap();
        assert_eq!(user, created);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache_untouched() {
        let mut directory = MockUserDirectory::new();
        directory
            .expect_insert()
            .returning(|_, _| Err(AppError::AlreadyExists("Duplicate entry 'alice'".to_string())));
        let mut cache = MockUserCache::new();
        cache.expect_set().never();
        cache.expect_delete().never();

        let gw = gateway(directory, cache, MockCredentialIssuer::new());
        let err = gw.insert(Deadline::none(), alice()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn test_update_refresh_failure_invalidates() {
        let user = alice();
        let id = user.id;
        let returned = user.clone();
        let mut directory = MockUserDirectory::new();
        directory
            .expect_update()
            .with(always(), eq(id), always())
            .returning(move |_, _, _| Ok(returned.clone()));
        let mut cache = MockUserCache::new();
        cache
            .expect_set()
            .returning(|_, _, _| Err(AppError::internal("OOM command not allowed")));
        cache
            .expect_delete()
            .with(always(), eq(id))
            .times(1)
            .returning(|_, _| Ok(()));

        let gw = gateway(directory, cache, MockCredentialIssuer::new());
        assert_eq!(gw.update(Deadline::none(), id, user.clone()).await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_delete_invalidates_with_one_retry() {
        let user = alice();
        let id = user.id;
        let returned = user.clone();
        let mut directory = MockUserDirectory::new();
        directory
            .expect_delete()
            .returning(move |_, _| Ok(returned.clone()));
        let mut cache = MockUserCache::new();
        cache
            .expect_delete()
            .times(2)
            .returning(|_, _| Err(AppError::internal("connection reset")));

        let gw = gateway(directory, cache, MockCredentialIssuer::new());
        assert_eq!(gw.delete(Deadline::none(), id).await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_evict_reports_failure_when_asked() {
        let mut cache = MockUserCache::new();
        cache
            .expect_delete()
            .times(2)
            .returning(|_, _| Err(AppError::internal("connection reset")));

        let gw = gateway(MockUserDirectory::new(), cache, MockCredentialIssuer::new());
        let err = gw
            .evict(Deadline::none(), StringUuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    type CachedGateway = UserGateway<MockUserDirectory, InMemoryUserCache, MockCredentialIssuer>;

    /// Gateway over a real in-memory cache, returned alongside a handle to it.
    fn cached_gateway(directory: MockUserDirectory) -> (CachedGateway, InMemoryUserCache) {
        let cache = InMemoryUserCache::new();
        let gw = UserGateway::new(
            Arc::new(directory),
            Arc::new(cache.clone()),
            Arc::new(MockCredentialIssuer::new()),
            Duration::from_secs(600),
        );
        (gw, cache)
    }

    #[tokio::test]
    async fn test_delete_evicts_even_when_request_deadline_is_spent() {
        let user = alice();
        let id = user.id;
        let returned = user.clone();
        let mut directory = MockUserDirectory::new();
        directory.expect_delete().returning(move |_, _| {
            std::thread::sleep(Duration::from_millis(30));
            Ok(returned.clone())
        });
        directory
            .expect_get_user_by_id()
            .returning(|_, id| Err(AppError::NotFound(format!("User {} not found", id))));
        let (gw, cache) = cached_gateway(directory);
        cache.set(Deadline::none(), &user, Duration::from_secs(600)).await.unwrap();

        let deleted = gw.delete(Deadline::after(Duration::from_millis(10)), id).await;
        assert_eq!(deleted.unwrap(), user);

        assert!(cache.is_empty().await);
        let err = gw.get_user(Deadline::none(), id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_refreshes_entry_even_when_request_deadline_is_spent() {
        let admin = User::new("alice", "p1", "admin").with_id(StringUuid::new_v4());
        let id = admin.id;
        let demoted = User {
            role: ROLE_USER.to_string(),
            ..admin.clone()
        };
        let returned = demoted.clone();
        let mut directory = MockUserDirectory::new();
        directory.expect_update().returning(move |_, _, _| {
            std::thread::sleep(Duration::from_millis(30));
            Ok(returned.clone())
        });
        directory.expect_get_user_by_id().never();
        let (gw, cache) = cached_gateway(directory);
        cache.set(Deadline::none(), &admin, Duration::from_secs(600)).await.unwrap();

        gw.update(Deadline::after(Duration::from_millis(10)), id, demoted.clone())
            .await
            .unwrap();

        let served = gw.get_user(Deadline::none(), id).await.unwrap();
        assert_eq!(served, demoted);
        assert!(!served.is_admin());
    }

    #[tokio::test]
    async fn test_get_users_bypasses_cache() {
        let mut directory = MockUserDirectory::new();
        directory
            .expect_get_users()
            .times(1)
            .returning(|_| Ok(vec![alice(), alice()]));
        let mut cache = MockUserCache::new();
        cache.expect_get().never();

        let gw = gateway(directory, cache, MockCredentialIssuer::new());
        assert_eq!(gw.get_users(Deadline::none()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_register_forces_user_role_and_nil_id() {
        let mut credentials = MockCredentialIssuer::new();
        credentials
            .expect_register()
            .withf(|_, u: &User| u.role == ROLE_USER && u.id.is_nil() && u.login == "mallory")
            .times(1)
            .returning(|_, u| Ok(u.with_id(StringUuid::new_v4())));

        let gw = gateway(MockUserDirectory::new(), MockUserCache::new(), credentials);
        let user = gw
            .register(Deadline::none(), "mallory".to_string(), "pw".to_string())
            .await
            .unwrap();
        assert_eq!(user.role, ROLE_USER);
    }

    #[tokio::test]
    async fn test_login_delegates() {
        let mut credentials = MockCredentialIssuer::new();
        credentials
            .expect_login()
            .with(always(), eq("alice"), eq("p1"))
            .returning(|_, _, _| {
                Ok(TokenPair {
                    access_token: "a".to_string(),
                    refresh_token: "r".to_string(),
                    expires_in: 900,
                })
            });

        let gw = gateway(MockUserDirectory::new(), MockUserCache::new(), credentials);
        let pair = gw.login(Deadline::none(), "alice", "p1").await.unwrap();
        assert_eq!(pair.access_token, "a");
    }
}
