//! OAuth token endpoint client (password and refresh-token grants).

use std::fmt;
use std::time::SystemTime;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{AuthError, CredentialPair};
use crate::http_client::{API_READ_TIMEOUT, build_http_client};

/// Default upstream OpenID Connect token endpoint.
pub const DEFAULT_AUTH_URL: &str =
    "https://auth.mangadex.org/realms/mangadex/protocol/openid-connect/token";

/// Token endpoint location and the service account used to log in.
///
/// Secrets are redacted in Debug output.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// Token endpoint URL.
    pub token_url: String,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Service account user name.
    pub username: String,
    /// Service account password.
    pub password: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl AuthConfig {
    fn require(&self) -> Result<(), AuthError> {
        let fields = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("username", &self.username),
            ("password", &self.password),
        ];
        match fields.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(AuthError::MissingCredentials { field: *field }),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

/// Client for the upstream token endpoint.
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: Client,
    config: AuthConfig,
}

impl AuthClient {
    /// Creates a client for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Client`] if the HTTP client cannot be built.
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        let client = build_http_client(Some(API_READ_TIMEOUT)).map_err(AuthError::Client)?;
        Ok(Self { client, config })
    }

    /// Performs a password-grant login.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingCredentials`] when the service account is
    /// not configured, or any error from the token endpoint.
    #[instrument(skip(self))]
    pub async fn login(&self) -> Result<CredentialPair, AuthError> {
        self.config.require()?;
        let form = [
            ("grant_type", "password"),
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        self.grant("password", &form).await
    }

    /// Exchanges `refresh_token` for a new pair.
    ///
    /// # Errors
    ///
    /// Returns any error from the token endpoint.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<CredentialPair, AuthError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        self.grant("refresh_token", &form).await
    }

    async fn grant(
        &self,
        grant: &'static str,
        form: &[(&str, &str)],
    ) -> Result<CredentialPair, AuthError> {
        debug!(grant, url = %self.config.token_url, "requesting upstream token");
        let response = self
            .client
            .post(&self.config.token_url)
            .form(form)
            .send()
            .await
            .map_err(AuthError::Network)?;

        let status = response.status();
        let body = response.text().await.map_err(AuthError::Network)?;

        if !status.is_success() {
            let description = serde_json::from_str::<TokenErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or_else(|| "no error description".to_string());
            warn!(grant, status = status.as_u16(), %description, "token endpoint rejected grant");
            return Err(AuthError::Rejected {
                grant,
                status: status.as_u16(),
                description,
            });
        }

        let tokens: TokenResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::Malformed(e.to_string()))?;

        Ok(CredentialPair::new(
            tokens.access_token,
            tokens.refresh_token,
            SystemTime::now(),
        ))
    }
}
