//! OAuth2 client-credentials token cache for the primary food database.
//!
//! Refreshes are coalesced: while one exchange is in flight every caller
//! awaits that same exchange, so the token endpoint sees at most one
//! request no matter how many callers arrive at once.

use crate::config::PrimaryConfig;
use crate::utils::error::{LookupError, Result};
use crate::utils::wire::value_as_f64;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Subtracted from the advertised lifetime so a token never expires
/// mid-request.
pub const SAFETY_BUFFER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub struct AuthToken {
    pub value: String,
    pub scheme: String,
    pub expires_at: Instant,
}

impl AuthToken {
    pub fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<serde_json::Value>,
}

type PendingRefresh = Shared<BoxFuture<'static, Result<AuthToken>>>;

enum TokenState {
    Idle,
    Refreshing { generation: u64, pending: PendingRefresh },
    Ready(AuthToken),
}

impl TokenState {
    fn label(&self) -> &'static str {
        match self {
            TokenState::Idle => "idle",
            TokenState::Refreshing { .. } => "refreshing",
            TokenState::Ready(_) => "ready",
        }
    }
}

/// Credentials and endpoint for the client-credentials exchange.
struct TokenEndpoint {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
}

impl TokenEndpoint {
    async fn exchange(&self) -> Result<AuthToken> {
        tracing::debug!(token_url = %self.token_url, "requesting access token");

        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| LookupError::authentication(format!("token request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            LookupError::authentication(format!("token response unreadable: {}", e))
        })?;

        if !status.is_success() {
            return Err(LookupError::authentication(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            LookupError::authentication(format!("malformed token response: {}", e))
        })?;

        let value = parsed
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| LookupError::authentication("token response has no access_token"))?;

        let lifetime = parsed
            .expires_in
            .as_ref()
            .and_then(value_as_f64)
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .ok_or_else(|| LookupError::authentication("token response has no usable expires_in"))?;

        let usable = lifetime.saturating_sub(SAFETY_BUFFER);

        Ok(AuthToken {
            value,
            scheme: parsed.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at: Instant::now() + usable,
        })
    }
}

pub struct TokenManager {
    endpoint: Arc<TokenEndpoint>,
    state: Mutex<TokenState>,
    generations: AtomicU64,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("token_url", &self.endpoint.token_url)
            .field("client_id", &self.endpoint.client_id)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    pub fn new(
        client: Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: Arc::new(TokenEndpoint {
                client,
                token_url: token_url.into(),
                client_id: client_id.into(),
                client_secret: client_secret.into(),
                scope: scope.into(),
            }),
            state: Mutex::new(TokenState::Idle),
            generations: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &PrimaryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| LookupError::config("primary.timeout_ms", e.to_string()))?;

        Ok(Self::new(
            client,
            config.token_url.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
            config.scope.clone(),
        ))
    }

    /// Returns a valid bearer token, refreshing it when needed.
    ///
    /// # Errors
    /// `LookupError::Authentication` when the exchange fails or the response
    /// is incomplete. The failure is not cached: the next call tries again.
    pub async fn get_token(&self) -> Result<String> {
        let (generation, pending) = {
            let mut state = self.state.lock().await;
            match &*state {
                TokenState::Ready(token) if token.is_valid() => return Ok(token.value.clone()),
                TokenState::Refreshing {
                    generation,
                    pending,
                } => (*generation, pending.clone()),
                TokenState::Idle | TokenState::Ready(_) => {
                    let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
                    let endpoint = Arc::clone(&self.endpoint);
                    let pending = async move { endpoint.exchange().await }.boxed().shared();
                    tracing::debug!(generation, "starting token refresh");
                    *state = TokenState::Refreshing {
                        generation,
                        pending: pending.clone(),
                    };
                    (generation, pending)
                }
            }
        };

        let outcome = pending.await;

        let mut state = self.state.lock().await;
        if matches!(&*state, TokenState::Refreshing { generation: current, .. } if *current == generation)
        {
            *state = match &outcome {
                Ok(token) => TokenState::Ready(token.clone()),
                Err(e) => {
                    tracing::warn!(error = %e, "token refresh failed");
                    TokenState::Idle
                }
            };
        }

        outcome.map(|token| token.value)
    }

    /// Drops any cached or in-flight token.
    pub async fn reset(&self) {
        *self.state.lock().await = TokenState::Idle;
    }

    /// `idle`, `refreshing` or `ready`.
    pub async fn state(&self) -> &'static str {
        self.state.lock().await.label()
    }
}
