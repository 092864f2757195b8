use crate::utils::error::LookupError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::Mutex;

const DEFAULT_CAPACITY: usize = 256;

/// Stage of the lookup cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Local,
    Primary,
    Secondary,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Local => "local",
            Tier::Primary => "primary",
            Tier::Secondary => "secondary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    NoResults,
    ApiError,
    AuthError,
    StoreError,
    Disabled,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::NoResults => "no_results",
            FallbackReason::ApiError => "api_error",
            FallbackReason::AuthError => "auth_error",
            FallbackReason::StoreError => "store_error",
            FallbackReason::Disabled => "disabled",
        }
    }

    pub fn from_error(error: &LookupError) -> Self {
        match error {
            LookupError::Authentication { .. } => FallbackReason::AuthError,
            LookupError::Store { .. } => FallbackReason::StoreError,
            _ => FallbackReason::ApiError,
        }
    }
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FallbackEvent {
    pub tier: Tier,
    pub reason: FallbackReason,
    pub source: String,
    /// Query text or barcode being resolved.
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

/// Recent fallback transitions, newest last. Every event is also logged.
#[derive(Debug)]
pub struct FallbackLog {
    events: Mutex<VecDeque<FallbackEvent>>,
    capacity: usize,
}

impl Default for FallbackLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl FallbackLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn record(
        &self,
        tier: Tier,
        reason: FallbackReason,
        source: &str,
        subject: &str,
        detail: Option<String>,
    ) {
        tracing::warn!(
            tier = tier.as_str(),
            reason = reason.as_str(),
            source,
            subject,
            detail = detail.as_deref().unwrap_or(""),
            "lookup tier fell through"
        );

        let event = FallbackEvent {
            tier,
            reason,
            source: source.to_string(),
            subject: subject.to_string(),
            detail,
            at: Utc::now(),
        };

        let mut events = self.events.lock().await;
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub async fn events(&self) -> Vec<FallbackEvent> {
        self.events.lock().await.iter().cloned().collect()
    }

    pub async fn clear(&self) {
        self.events.lock().await.clear();
    }
}
