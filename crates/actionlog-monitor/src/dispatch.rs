//! End-of-request webhook dispatch.
//!
//! Actions only mark a dispatch as owed. When the request lifetime ends,
//! `DispatchScheduler::on_request_end` consumes that flag and POSTs once to
//! every configured webhook. Delivery is best effort: failures are logged
//! per URL and never retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use actionlog_core::config::{ActionLogConfig, WebhookConfig};

use crate::engine::ActionMonitor;
use crate::error::DispatchError;
use crate::policy::Policies;
use crate::types::{DispatchReport, FailedWebhook, WebhookRequest};

/// Sends one webhook request and returns the HTTP status.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post(&self, request: &WebhookRequest) -> Result<u16, DispatchError>;
}

/// `WebhookTransport` backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client with the configured timeout and user agent. `insecure`
    /// disables TLS certificate verification for local development.
    pub fn new(config: &WebhookConfig, insecure: bool) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|e| DispatchError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookTransport for ReqwestTransport {
    async fn post(&self, request: &WebhookRequest) -> Result<u16, DispatchError> {
        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| DispatchError::Request {
            url: request.url.clone(),
            message: e.to_string(),
        })?;
        Ok(response.status().as_u16())
    }
}

/// Split the webhook setting into unique, parseable URLs.
///
/// Returns the usable URLs and the entries rejected as invalid.
pub fn webhook_urls(setting: &str) -> (Vec<String>, Vec<String>) {
    let mut urls: Vec<String> = Vec::new();
    let mut invalid = Vec::new();
    for raw in setting.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if urls.iter().any(|u| u == raw) || invalid.iter().any(|u| u == raw) {
            continue;
        }
        match reqwest::Url::parse(raw) {
            Ok(_) => urls.push(raw.to_string()),
            Err(e) => {
                let err = DispatchError::InvalidUrl {
                    url: raw.to_string(),
                    reason: e.to_string(),
                };
                warn!("{}", err);
                invalid.push(raw.to_string());
            }
        }
    }
    (urls, invalid)
}

/// Fires the build webhooks once per request lifetime.
pub struct DispatchScheduler {
    transport: Arc<dyn WebhookTransport>,
    webhook_setting: String,
    policies: Arc<Policies>,
}

impl std::fmt::Debug for DispatchScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchScheduler")
            .field("webhook_setting", &self.webhook_setting)
            .finish_non_exhaustive()
    }
}

impl DispatchScheduler {
    pub fn new(
        transport: Arc<dyn WebhookTransport>,
        webhook_setting: impl Into<String>,
        policies: Arc<Policies>,
    ) -> Self {
        Self {
            transport,
            webhook_setting: webhook_setting.into(),
            policies,
        }
    }

    /// Scheduler using a reqwest transport built from the service config.
    pub fn from_config(config: &ActionLogConfig, policies: Arc<Policies>) -> Result<Self, DispatchError> {
        let transport = ReqwestTransport::new(&config.webhook, config.settings.webhook_unsafe_request)?;
        Ok(Self::new(
            Arc::new(transport),
            config.settings.builds_api_webhook.clone(),
            policies,
        ))
    }

    pub fn webhook_setting(&self) -> &str {
        &self.webhook_setting
    }

    /// Consume the engine's dispatch flag and, if it was set, notify every
    /// configured webhook.
    pub async fn on_request_end(&self, engine: &ActionMonitor) -> DispatchReport {
        if !engine.take_dispatch() {
            debug!("No dispatch owed");
            return DispatchReport::default();
        }
        let mut report = self.dispatch().await;
        report.owed = true;
        report
    }

    /// POST to every configured webhook, isolating failures per URL.
    pub async fn dispatch(&self) -> DispatchReport {
        let mut report = DispatchReport::default();
        if self.webhook_setting.trim().is_empty() {
            debug!("No build webhook configured, skipping dispatch");
            return report;
        }

        let (urls, invalid) = webhook_urls(&self.webhook_setting);
        report.invalid = invalid;

        for url in urls {
            let request = self.policies.webhook_request(WebhookRequest::new(url.clone()));
            report.attempted.push(url.clone());

            match self.transport.post(&request).await {
                Ok(status) if (200..300).contains(&status) => {
                    info!(url = %request.url, status, "Build webhook dispatched");
                    report.delivered.push(url);
                }
                Ok(status) => {
                    let err = DispatchError::Status {
                        url: request.url.clone(),
                        status,
                    };
                    warn!("{}", err);
                    report.failed.push(FailedWebhook {
                        url,
                        reason: err.to_string(),
                    });
                }
                Err(e) => {
                    error!(url = %request.url, error = %e, "Error requesting build webhook");
                    report.failed.push(FailedWebhook {
                        url,
                        reason: e.to_string(),
                    });
                }
            }
        }
        report
    }
}
