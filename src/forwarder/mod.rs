//! Persistence Forwarder
//!
//! ## Responsibilities
//!
//! - Hand zone events to the activity store without blocking the pipeline
//! - At most once, best effort: failures are logged, never retried or queued
//!
//! Two modes:
//! - [`StoreForwarder`]: write straight to the database (worker mode)
//! - [`HttpForwarder`]: POST to a remote activity API

use crate::activity_store::{ActivityRequest, ActivityStore, InsertOutcome, NewActivity};
use crate::classifier::ZoneEvent;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

pub trait ActivityForwarder: Send + Sync {
    /// Fire and forget
    fn forward(&self, event: &ZoneEvent, at: DateTime<Utc>);
}

/// Writes through an [`ActivityStore`]
pub struct StoreForwarder {
    store: Arc<dyn ActivityStore>,
}

impl StoreForwarder {
    pub fn new(store: Arc<dyn ActivityStore>) -> Self {
        Self { store }
    }
}

impl ActivityForwarder for StoreForwarder {
    fn forward(&self, event: &ZoneEvent, at: DateTime<Utc>) {
        let activity = NewActivity::from_zone_event(event, at);
        let store = self.store.clone();

        tokio::spawn(async move {
            match store.insert_deduplicated(activity).await {
                Ok(InsertOutcome::Inserted(_)) | Ok(InsertOutcome::Duplicate) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to persist activity");
                }
            }
        });
    }
}

/// POSTs to `<base_url>/api/activity`
pub struct HttpForwarder {
    client: reqwest::Client,
    url: String,
}

impl HttpForwarder {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(10))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: format!("{}/api/activity", base_url.trim_end_matches('/')),
        })
    }

    async fn post(client: reqwest::Client, url: String, body: ActivityRequest) -> Result<()> {
        let resp = client.post(&url).json(&body).send().await?;

        if !resp.status().is_success() {
            return Err(Error::Internal(format!(
                "Activity API returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

impl ActivityForwarder for HttpForwarder {
    fn forward(&self, event: &ZoneEvent, at: DateTime<Utc>) {
        let body = ActivityRequest::from(&NewActivity::from_zone_event(event, at));
        let client = self.client.clone();
        let url = self.url.clone();

        tokio::spawn(async move {
            if let Err(e) = Self::post(client, url, body).await {
                tracing::warn!(error = %e, "Failed to forward activity");
            }
        });
    }
}
