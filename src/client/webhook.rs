use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::config::WebhookConfig;
use crate::error::{DeskError, DeskResult};
use crate::models::{OfferPayload, RfqPayload};

/// 外部自动化服务 (n8n) 的两个 webhook
#[async_trait]
pub trait Webhooks: Send + Sync {
    fn rfq_configured(&self) -> bool {
        true
    }

    async fn send_rfq(&self, payload: &RfqPayload) -> DeskResult<()>;

    async fn send_offer(&self, payload: &OfferPayload) -> DeskResult<()>;
}

#[derive(Debug, Clone)]
pub struct HttpWebhooks {
    client: Client,
    config: WebhookConfig,
}

impl HttpWebhooks {
    pub fn new(config: WebhookConfig) -> DeskResult<Self> {
        let client = Client::builder().user_agent("vendor-desk").build()?;
        Ok(Self { client, config })
    }

    async fn post<T: Serialize + Sync>(&self, url: &str, payload: &T) -> DeskResult<()> {
        let response = self.client.post(url).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeskError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Webhooks for HttpWebhooks {
    fn rfq_configured(&self) -> bool {
        !self.config.rfq_url.trim().is_empty()
    }

    async fn send_rfq(&self, payload: &RfqPayload) -> DeskResult<()> {
        if !self.rfq_configured() {
            return Err(DeskError::Config("Webhook URL not configured!".to_string()));
        }
        self.post(&self.config.rfq_url, payload).await
    }

    async fn send_offer(&self, payload: &OfferPayload) -> DeskResult<()> {
        if self.config.offer_url.trim().is_empty() {
            return Err(DeskError::Config(
                "Customer offer webhook URL not configured!".to_string(),
            ));
        }
        self.post(&self.config.offer_url, payload).await
    }
}
