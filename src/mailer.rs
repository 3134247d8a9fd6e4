use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::MailConfig;

/// A templated transactional email. `data` feeds the provider-side template.
#[derive(Debug, Serialize)]
pub struct TemplateEmail {
    pub to: String,
    pub subject: String,
    pub template: String,
    pub data: serde_json::Value,
}

/// Email dispatcher. Returns `false` on failure instead of erroring; callers
/// decide whether a failed send is fatal to their workflow.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_template(&self, email: TemplateEmail) -> bool;
}

/// Sends through an HTTP transactional mail provider.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct ProviderPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    template: &'a str,
    data: &'a serde_json::Value,
}

impl HttpMailer {
    pub fn new(endpoint: String, api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_template(&self, email: TemplateEmail) -> bool {
        let payload = ProviderPayload {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            template: &email.template,
            data: &email.data,
        };
        let result = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await;
        match result {
            Ok(res) if res.status().is_success() => {
                info!(to = %email.to, template = %email.template, "email dispatched");
                true
            }
            Ok(res) => {
                warn!(to = %email.to, status = %res.status(), "mail provider rejected send");
                false
            }
            Err(e) => {
                warn!(to = %email.to, error = %e, "mail provider unreachable");
                false
            }
        }
    }
}

/// Logs instead of sending. Used when `MAIL_ENDPOINT` is not configured.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send_template(&self, email: TemplateEmail) -> bool {
        info!(to = %email.to, template = %email.template, "mail disabled; skipping send");
        true
    }
}

pub fn from_config(config: &MailConfig) -> std::sync::Arc<dyn Mailer> {
    match &config.endpoint {
        Some(endpoint) => std::sync::Arc::new(HttpMailer::new(
            endpoint.clone(),
            config.api_key.clone(),
            config.from.clone(),
        )),
        None => {
            warn!("MAIL_ENDPOINT not set; emails will be logged only");
            std::sync::Arc::new(NoopMailer)
        }
    }
}
