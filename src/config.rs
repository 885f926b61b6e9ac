use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::DeskResult;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub webhooks: WebhookConfig,
    pub auth: AuthConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// 供应商 REST 后端
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub products_path: String,
    pub upload_path: String,
    pub search_path: String,
    pub matching_path: String,
}

/// n8n webhook 地址，留空表示未配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub rfq_url: String,
    pub offer_url: String,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct AuthConfig {
    pub email: String,
    pub password: String,
    /// 登录标记的落盘位置
    pub storage_path: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("storage_path", &self.storage_path)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    pub page_size: usize,
    pub poll_interval_secs: u64,
    pub export_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            backend: BackendConfig {
                base_url: "http://127.0.0.1:8000".to_string(),
                products_path: "/api/products/".to_string(),
                upload_path: "/api/products/upload-csv".to_string(),
                search_path: "/api/matching/search".to_string(),
                matching_path: "/api/matching/customer-requests/all".to_string(),
            },
            webhooks: WebhookConfig::default(),
            auth: AuthConfig {
                email: "admin@gmail.com".to_string(),
                password: "1234".to_string(),
                storage_path: "vendor-desk-session.json".to_string(),
            },
            ui: UiConfig {
                page_size: 50,
                poll_interval_secs: 30,
                export_dir: "exports".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// 加载配置: 内置默认值 -> vendor-desk.toml (可选) -> DESK__ 前缀环境变量
    ///
    /// 例: `DESK__SERVER__PORT=9000`, `DESK__WEBHOOKS__RFQ_URL=https://...`
    pub fn load() -> DeskResult<Self> {
        Self::load_from("vendor-desk")
    }

    /// 指定配置文件 (不存在时跳过)
    pub fn load_from(file: &str) -> DeskResult<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix("DESK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn backend_url(&self, path: &str) -> String {
        join_url(&self.backend.base_url, path)
    }
}

/// 拼接 base url 与路径，避免出现双斜杠
pub fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.trim_end_matches('/').to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
