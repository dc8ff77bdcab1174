//! The credential lifecycle: look up the current token for an account, detect expiry, and
//! refresh-and-persist when needed.

use crate::error::{Error, Result};
use crate::oauth::TokenRefresher;
use crate::store::TokenStore;
use crate::token::AccessTokenBundle;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::instrument;

/// Makes the most recent valid credential for an account available to the video operations.
///
/// Token refresh is serialized per account: two operations racing on the same expired token
/// result in one refresh and one saved record, the second operation picking up the token
/// the first one stored.
#[derive(Debug)]
pub struct CredentialManager<S, R> {
    store: S,
    refresher: R,
    /// One entry per account with an `ensure_valid_token` call in flight.
    refresh_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S, R> CredentialManager<S, R>
where
    S: TokenStore,
    R: TokenRefresher,
{
    pub fn new(store: S, refresher: R) -> Self {
        Self {
            store,
            refresher,
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn refresher(&self) -> &R {
        &self.refresher
    }

    /// Persists `bundle` as the newest token for `account`.
    pub async fn save_token(&self, bundle: &AccessTokenBundle, account: &str) -> Result<()> {
        self.store.save(account, bundle).await
    }

    pub async fn latest_token(&self, account: &str) -> Result<Option<AccessTokenBundle>> {
        self.store.latest(account).await
    }

    pub async fn has_token(&self, account: &str) -> Result<bool> {
        Ok(self.latest_token(account).await?.is_some())
    }

    /// Whether the current token for `account` can be refreshed.
    ///
    /// Fails with [`Error::MissingCredential`] if the account has no token at all; callers
    /// that don't know should ask [`Self::has_token`] first.
    pub async fn has_refresh_token(&self, account: &str) -> Result<bool> {
        Ok(self.require_token(account).await?.has_refresh_token())
    }

    /// Fails with [`Error::MissingCredential`] if the account has no token at all.
    pub async fn is_access_token_expired(&self, account: &str) -> Result<bool> {
        Ok(self.require_token(account).await?.is_expired())
    }

    /// Returns a token for `account` that has not expired, refreshing it if necessary.
    ///
    /// Called before every remote operation. A refresh performs exactly one exchange with
    /// the token endpoint and saves its result; a failed exchange aborts with
    /// [`Error::RefreshExchange`]. An expired token without a refresh token fails with
    /// [`Error::ExpiredCredential`] rather than being sent to YouTube to be rejected there.
    #[instrument(skip(self))]
    pub async fn ensure_valid_token(&self, account: &str) -> Result<AccessTokenBundle> {
        let lock = self.refresh_lock(account);
        let result = {
            let _guard = lock.lock().await;
            self.refresh_if_expired(account).await
        };
        self.release_lock(account, lock);
        result
    }

    async fn refresh_if_expired(&self, account: &str) -> Result<AccessTokenBundle> {
        let token = self.require_token(account).await?;
        if !token.is_expired() {
            return Ok(token);
        }

        if !token.has_refresh_token() {
            tracing::warn!(account, "access token expired and no refresh token is stored");
            return Err(Error::ExpiredCredential(account.to_string()));
        }

        tracing::debug!(account, "access token expired, refreshing");
        let refreshed = self.refresher.refresh(&token).await?;
        self.save_token(&refreshed, account).await?;
        tracing::info!(account, "refreshed access token");
        Ok(refreshed)
    }

    async fn require_token(&self, account: &str) -> Result<AccessTokenBundle> {
        self.latest_token(account)
            .await?
            .ok_or_else(|| Error::MissingCredential(account.to_string()))
    }

    fn refresh_lock(&self, account: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .refresh_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(account.to_string()).or_default())
    }

    /// Drops the account's lock once no other caller holds or awaits it, so the map only
    /// holds accounts with an operation in flight.
    fn release_lock(&self, account: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self
            .refresh_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // one reference in the map, one here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(account);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::SqliteTokenStore;
    use crate::store::tests::{memory_store, row_count};
    use jiff::{SignedDuration, Timestamp};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Hands out `refreshed-N` access tokens without talking to Google.
    #[derive(Debug, Default)]
    pub(crate) struct CountingRefresher {
        pub(crate) calls: AtomicUsize,
        pub(crate) fail: bool,
    }

    impl TokenRefresher for CountingRefresher {
        async fn refresh(&self, bundle: &AccessTokenBundle) -> Result<AccessTokenBundle> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(Error::RefreshExchange("invalid_grant".to_string()));
            }
            Ok(bundle.refreshed(fresh_token(&format!("refreshed-{n}"), None)))
        }
    }

    pub(crate) fn fresh_token(
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> AccessTokenBundle {
        AccessTokenBundle {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
            token_type: "Bearer".to_string(),
            expires_in: Some(3599),
            scope: None,
            // stored at second precision
            created: Timestamp::from_second(Timestamp::now().as_second()).unwrap(),
        }
    }

    pub(crate) fn expired_token(
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> AccessTokenBundle {
        AccessTokenBundle {
            created: Timestamp::now() - SignedDuration::from_hours(2),
            ..fresh_token(access_token, refresh_token)
        }
    }

    async fn manager() -> CredentialManager<SqliteTokenStore, CountingRefresher> {
        CredentialManager::new(memory_store().await, CountingRefresher::default())
    }

    #[tokio::test]
    async fn no_token_on_record() {
        let creds = manager().await;
        assert!(!creds.has_token("u1").await.unwrap());
        assert_eq!(creds.latest_token("u1").await.unwrap(), None);
        assert!(matches!(
            creds.has_refresh_token("u1").await,
            Err(Error::MissingCredential(a)) if a == "u1"
        ));
        assert!(matches!(
            creds.is_access_token_expired("u1").await,
            Err(Error::MissingCredential(_))
        ));
        assert!(matches!(
            creds.ensure_valid_token("u1").await,
            Err(Error::MissingCredential(_))
        ));
    }

    #[tokio::test]
    async fn most_recent_save_wins() {
        let creds = manager().await;
        let first = fresh_token("first", Some("1//r"));
        let second = AccessTokenBundle {
            created: first.created + SignedDuration::from_secs(1),
            ..fresh_token("second", None)
        };
        creds.save_token(&first, "a").await.unwrap();
        creds.save_token(&second, "a").await.unwrap();

        assert!(creds.has_token("a").await.unwrap());
        assert_eq!(creds.latest_token("a").await.unwrap(), Some(second));
        assert!(!creds.has_refresh_token("a").await.unwrap());
    }

    #[tokio::test]
    async fn valid_token_is_not_refreshed() {
        let creds = manager().await;
        let token = fresh_token("ya29", Some("1//r"));
        creds.save_token(&token, "a").await.unwrap();

        assert!(!creds.is_access_token_expired("a").await.unwrap());
        assert_eq!(creds.ensure_valid_token("a").await.unwrap(), token);
        assert_eq!(creds.refresher().calls.load(Ordering::SeqCst), 0);
        assert_eq!(row_count(creds.store(), "a").await, 1);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_once_and_saved() {
        let creds = manager().await;
        creds
            .save_token(&expired_token("stale", Some("1//r")), "a")
            .await
            .unwrap();
        assert!(creds.is_access_token_expired("a").await.unwrap());
        assert!(creds.has_refresh_token("a").await.unwrap());

        let token = creds.ensure_valid_token("a").await.unwrap();
        assert_eq!(token.access_token, "refreshed-1");
        assert_eq!(token.refresh_token.as_deref(), Some("1//r"));

        assert_eq!(creds.refresher().calls.load(Ordering::SeqCst), 1);
        assert_eq!(row_count(creds.store(), "a").await, 2);
        assert_eq!(creds.latest_token("a").await.unwrap(), Some(token));
        assert!(!creds.is_access_token_expired("a").await.unwrap());
    }

    #[tokio::test]
    async fn expired_token_without_refresh_token_fails_fast() {
        let creds = manager().await;
        creds
            .save_token(&expired_token("stale", None), "a")
            .await
            .unwrap();

        assert!(matches!(
            creds.ensure_valid_token("a").await,
            Err(Error::ExpiredCredential(a)) if a == "a"
        ));
        assert_eq!(creds.refresher().calls.load(Ordering::SeqCst), 0);
        assert_eq!(row_count(creds.store(), "a").await, 1);
    }

    #[tokio::test]
    async fn failed_refresh_is_not_saved() {
        let creds = CredentialManager::new(
            memory_store().await,
            CountingRefresher {
                fail: true,
                ..Default::default()
            },
        );
        creds
            .save_token(&expired_token("stale", Some("1//r")), "a")
            .await
            .unwrap();

        assert!(matches!(
            creds.ensure_valid_token("a").await,
            Err(Error::RefreshExchange(_))
        ));
        assert_eq!(creds.refresher().calls.load(Ordering::SeqCst), 1);
        assert_eq!(row_count(creds.store(), "a").await, 1);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let creds = manager().await;
        creds
            .save_token(&expired_token("stale", Some("1//r")), "a")
            .await
            .unwrap();

        let (left, right) = tokio::join!(
            creds.ensure_valid_token("a"),
            creds.ensure_valid_token("a")
        );
        assert_eq!(left.unwrap().access_token, "refreshed-1");
        assert_eq!(right.unwrap().access_token, "refreshed-1");
        assert_eq!(creds.refresher().calls.load(Ordering::SeqCst), 1);
        assert_eq!(row_count(creds.store(), "a").await, 2);
        assert!(creds.refresh_locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn refresh_locks_are_released() {
        let creds = manager().await;
        creds
            .save_token(&fresh_token("ya29", Some("1//r")), "a")
            .await
            .unwrap();

        creds.ensure_valid_token("a").await.unwrap();
        assert!(creds.ensure_valid_token("unknown").await.is_err());
        assert!(creds.refresh_locks.lock().unwrap().is_empty());

        // a lock held elsewhere survives the release
        let held = creds.refresh_lock("a");
        creds.ensure_valid_token("a").await.unwrap();
        assert!(creds.refresh_locks.lock().unwrap().contains_key("a"));
        creds.release_lock("a", held);
        assert!(creds.refresh_locks.lock().unwrap().is_empty());
    }
}
