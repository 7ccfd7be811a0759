//! Process-wide upstream session.
//!
//! One [`SessionManager`] is shared by every request. It keeps the current
//! [`CredentialPair`] in memory, seeds it from the [`CredentialStore`] on
//! first use and falls back to a password login when nothing is stored.
//!
//! Concurrent callers may race to refresh or log in; the last pair written
//! wins. This is tolerated because every pair the endpoint issues is valid.

use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, instrument, warn};

use super::{AuthClient, AuthError, CredentialPair, CredentialStore};

/// Age after which a credential pair is refreshed before use.
pub const TOKEN_VALIDITY: Duration = Duration::from_secs(15 * 60);

/// Owner of the shared upstream credential.
#[derive(Debug)]
pub struct SessionManager {
    client: AuthClient,
    store: Arc<dyn CredentialStore>,
    current: RwLock<Option<CredentialPair>>,
    validity: Duration,
}

impl SessionManager {
    /// Creates a manager with the default 15-minute validity window.
    #[must_use]
    pub fn new(client: AuthClient, store: Arc<dyn CredentialStore>) -> Self {
        Self::with_validity(client, store, TOKEN_VALIDITY)
    }

    /// Creates a manager with a custom validity window.
    #[must_use]
    pub fn with_validity(
        client: AuthClient,
        store: Arc<dyn CredentialStore>,
        validity: Duration,
    ) -> Self {
        Self {
            client,
            store,
            current: RwLock::new(None),
            validity,
        }
    }

    /// Returns an access token for upstream calls.
    ///
    /// Uses the in-memory pair, else the latest persisted pair, else a fresh
    /// password login. A pair older than the validity window is refreshed
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if no usable credential can be obtained.
    #[instrument(skip(self))]
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let pair = match self.snapshot() {
            Some(pair) => pair,
            None => match self.load_persisted().await {
                Some(pair) => {
                    debug!("seeded session from persisted credential");
                    self.install(pair.clone());
                    pair
                }
                None => {
                    info!("no stored credential, logging in");
                    return Ok(self.login().await?.access_token().to_string());
                }
            },
        };

        if pair.is_stale(self.validity, SystemTime::now()) {
            info!(
                age_secs = pair.age(SystemTime::now()).as_secs(),
                "credential older than validity window, refreshing"
            );
            let fresh = self.refresh(pair.refresh_token()).await?;
            return Ok(fresh.access_token().to_string());
        }

        Ok(pair.access_token().to_string())
    }

    /// Exchanges `refresh_token` for a new pair and makes it current.
    ///
    /// If the refresh grant fails, a single password login is attempted
    /// instead; only that login's failure is returned.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if both the refresh and the fallback login fail.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<CredentialPair, AuthError> {
        let previous = self.snapshot();
        let fresh = match self.client.refresh(refresh_token).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "refresh failed, falling back to password login");
                self.client.login().await?
            }
        };
        self.install(fresh.clone());
        self.persist(previous.as_ref(), &fresh).await;
        info!("upstream credential refreshed");
        Ok(fresh)
    }

    /// Called when upstream rejected `rejected_token`; returns a token to
    /// retry with.
    ///
    /// If another request already replaced the rejected token, the current
    /// one is returned without another grant.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if no new credential can be obtained.
    #[instrument(skip(self, rejected_token))]
    pub async fn renew_after_rejection(&self, rejected_token: &str) -> Result<String, AuthError> {
        match self.snapshot() {
            Some(pair) if pair.access_token() != rejected_token => {
                debug!("credential already renewed by another request");
                Ok(pair.access_token().to_string())
            }
            Some(pair) => Ok(self
                .refresh(pair.refresh_token())
                .await?
                .access_token()
                .to_string()),
            None => Ok(self.login().await?.access_token().to_string()),
        }
    }

    /// The in-memory pair, if any.
    #[must_use]
    pub fn current(&self) -> Option<CredentialPair> {
        self.snapshot()
    }

    async fn login(&self) -> Result<CredentialPair, AuthError> {
        let previous = self.snapshot();
        let pair = self.client.login().await?;
        self.install(pair.clone());
        self.persist(previous.as_ref(), &pair).await;
        Ok(pair)
    }

    async fn load_persisted(&self) -> Option<CredentialPair> {
        match self.store.find_latest().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "failed to load persisted credential");
                None
            }
        }
    }

    /// Best-effort write-through; the in-memory pair stays authoritative.
    async fn persist(&self, previous: Option<&CredentialPair>, fresh: &CredentialPair) {
        let result = match previous {
            Some(old) => match self.store.update_by_token(old.access_token(), fresh).await {
                Ok(true) => Ok(()),
                Ok(false) => self.store.create(fresh).await,
                Err(e) => Err(e),
            },
            None => self.store.create(fresh).await,
        };
        if let Err(e) = result {
            warn!(error = %e, "failed to persist upstream credential");
        }
    }

    fn snapshot(&self) -> Option<CredentialPair> {
        self.current.read().ok().and_then(|guard| guard.clone())
    }

    fn install(&self, pair: CredentialPair) {
        if let Ok(mut guard) = self.current.write() {
            *guard = Some(pair);
        }
    }
}
