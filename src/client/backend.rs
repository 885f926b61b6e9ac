use std::fmt;

use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::info;

use crate::config::{join_url, BackendConfig};
use crate::error::{DeskError, DeskResult};

/// 避免隧道代理返回提示页
pub const SKIP_WARNING_HEADER: &str = "ngrok-skip-browser-warning";

/// 供应商 REST 后端
#[async_trait]
pub trait Backend: Send + Sync {
    /// GET 商品全量列表，返回原始响应体
    async fn fetch_products(&self) -> DeskResult<Value>;

    /// multipart 上传 CSV，字段名 `file`
    async fn upload_csv(&self, file_name: String, bytes: Vec<u8>) -> DeskResult<()>;

    /// 按单个搜索词查询供应商商品
    async fn search(&self, term: &str) -> DeskResult<Value>;

    /// GET 全部客户需求
    async fn fetch_customer_requests(&self) -> DeskResult<Value>;
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: BackendConfig,
}

impl fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> DeskResult<Self> {
        let client = Client::builder().user_agent("vendor-desk").build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str, name: &str) -> DeskResult<String> {
        if self.config.base_url.trim().is_empty() || path.trim().is_empty() {
            return Err(DeskError::Config(format!("{name} not set")));
        }
        Ok(join_url(&self.config.base_url, path))
    }

    async fn get_json(&self, request: RequestBuilder) -> DeskResult<Value> {
        let response = request
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(SKIP_WARNING_HEADER, "true")
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }
}

/// 非 2xx 转为 Status 错误，附带响应体
async fn ensure_success(response: Response) -> DeskResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(DeskError::Status {
        status: status.as_u16(),
        body,
    })
}

/// 上传失败时优先取 JSON 里的 message，否则用原始响应体
pub fn upload_error_message(status: u16, body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string));
    match parsed {
        Some(message) if !message.is_empty() => message,
        _ if !body.is_empty() => body.to_string(),
        _ => format!("Upload failed: {status}"),
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_products(&self) -> DeskResult<Value> {
        let url = self.url(&self.config.products_path, "ALL_PRODUCTS endpoint")?;
        self.get_json(self.client.get(url)).await
    }

    async fn upload_csv(&self, file_name: String, bytes: Vec<u8>) -> DeskResult<()> {
        let url = self.url(&self.config.upload_path, "UPLOAD_CSV endpoint")?;
        let size = bytes.len();
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str("text/csv")?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(url)
            .header(SKIP_WARNING_HEADER, "true")
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeskError::Upstream(upload_error_message(status.as_u16(), &body)));
        }
        info!("Uploaded {} ({} bytes)", file_name, size);
        Ok(())
    }

    async fn search(&self, term: &str) -> DeskResult<Value> {
        let url = self.url(&self.config.search_path, "VENDOR_SEARCH endpoint")?;
        self.get_json(self.client.get(url).query(&[("itemDescription", term)]))
            .await
    }

    async fn fetch_customer_requests(&self) -> DeskResult<Value> {
        let url = self.url(&self.config.matching_path, "MATCHING_API_URL")?;
        self.get_json(self.client.get(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_error_prefers_json_message() {
        assert_eq!(
            upload_error_message(400, r#"{"message":"bad header row"}"#),
            "bad header row"
        );
        assert_eq!(upload_error_message(500, "boom"), "boom");
        assert_eq!(upload_error_message(502, ""), "Upload failed: 502");
        assert_eq!(upload_error_message(400, r#"{"error":"x"}"#), r#"{"error":"x"}"#);
    }

    #[test]
    fn missing_endpoint_is_a_config_error() {
        let mut config = crate::config::AppConfig::default().backend;
        config.matching_path = String::new();
        let backend = HttpBackend::new(config).unwrap();
        let err = backend
            .url(&backend.config.matching_path, "MATCHING_API_URL")
            .unwrap_err();
        assert!(matches!(err, DeskError::Config(_)));
        assert_eq!(err.to_string(), "Configuration Error: MATCHING_API_URL not set");
    }
}
