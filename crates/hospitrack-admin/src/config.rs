//! 配置管理
//!
//! 分层加载：内置默认值 → 可选TOML文件 → 环境变量（`HOSPITRACK__SECTION__KEY`），
//! 最后由 `HOSPITRACK_BACKEND_URL` / `VITE_BACKEND_URL` 覆盖后端地址。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use hospitrack_client::{ClientConfig, DEFAULT_BASE_URL};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::logging::LogFormat;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "HOSPITRACK";

/// 后端地址快捷变量，按优先级排列
pub const BACKEND_URL_VARS: [&str; 2] = ["HOSPITRACK_BACKEND_URL", "VITE_BACKEND_URL"];

/// 未指定路径时尝试加载的配置文件
pub const DEFAULT_CONFIG_FILE: &str = "hospitrack";

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    /// 配置数据
    config: Arc<RwLock<HospitrackConfig>>,
    /// 配置文件路径
    config_path: Option<PathBuf>,
    /// 环境变量来源；None 表示读取进程环境
    env: Option<HashMap<String, String>>,
    /// 配置验证器
    validator: ConfigValidator,
}

/// 客户端完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HospitrackConfig {
    pub backend: BackendConfig,
    pub polling: PollingConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
}

/// 后端连接配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// REST接口根地址
    pub base_url: String,
    /// 单次请求超时（秒）
    pub timeout_secs: u64,
    /// 请求携带的 `Origin` 头
    pub origin: Option<String>,
}

/// 轮询间隔（毫秒），0 表示关闭
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub beds_ms: u64,
    pub patients_ms: u64,
    pub alerts_ms: u64,
    pub dashboard_ms: u64,
}

/// CORS配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或完整的过滤指令，例如 `info,hospitrack_sync=debug`
    pub level: String,
    pub format: LogFormat,
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    /// 验证规则
    validation_rules: Vec<ValidationRule>,
}

/// 验证规则
#[derive(Debug)]
struct ValidationRule {
    /// 字段路径
    field_path: &'static str,
    /// 验证函数
    validator: fn(&HospitrackConfig) -> Result<()>,
    /// 错误消息
    error_message: &'static str,
}

impl ConfigManager {
    /// 从文件和进程环境加载
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        Self::build(config_path, None)
    }

    /// 使用给定的环境变量表加载，不读取进程环境
    pub fn with_env(config_path: Option<&Path>, env: HashMap<String, String>) -> Result<Self> {
        Self::build(config_path, Some(env))
    }

    fn build(config_path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let validator = ConfigValidator::new();
        let config = Self::load_config(config_path, env.as_ref())?;
        validator.validate(&config)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path: config_path.map(Path::to_path_buf),
            env,
            validator,
        })
    }

    /// 按层叠顺序加载配置
    fn load_config(config_path: Option<&Path>, env: Option<&HashMap<String, String>>) -> Result<HospitrackConfig> {
        let file = match config_path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let environment = Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("cors.allowed_origins")
            .source(env.map(|vars| vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect()));

        let mut builder = Config::builder().add_source(file).add_source(environment);
        if let Some((var, url)) = backend_url_override(env) {
            debug!("Backend URL taken from {}", var);
            builder = builder
                .set_override("backend.base_url", url)
                .context("Failed to apply backend URL override")?;
        }

        let settings = builder.build().context("Failed to build configuration")?;
        let config: HospitrackConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        match config_path {
            Some(path) => info!("Configuration loaded from: {}", path.display()),
            None => info!("Configuration loaded from defaults and environment"),
        }
        Ok(config)
    }

    /// 获取配置
    pub async fn get_config(&self) -> HospitrackConfig {
        self.config.read().await.clone()
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// 更新配置；有配置文件时同时写回
    pub async fn update_config(&self, new_config: HospitrackConfig) -> Result<()> {
        self.validator.validate(&new_config)?;

        {
            let mut config = self.config.write().await;
            *config = new_config;
        }

        if let Some(path) = &self.config_path {
            self.save_config(path).await?;
        }

        info!("Configuration updated successfully");
        Ok(())
    }

    /// 保存配置到TOML文件
    pub async fn save_config(&self, path: &Path) -> Result<()> {
        let config_str = {
            let config = self.config.read().await;
            toml::to_string_pretty(&*config).context("Failed to serialize configuration")?
        };

        tokio::fs::write(path, config_str)
            .await
            .with_context(|| format!("Failed to write configuration file {}", path.display()))?;

        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    /// 重新加载配置
    pub async fn reload_config(&self) -> Result<()> {
        let new_config = Self::load_config(self.config_path.as_deref(), self.env.as_ref())?;
        self.validator.validate(&new_config)?;

        let mut config = self.config.write().await;
        *config = new_config;

        info!("Configuration reloaded");
        Ok(())
    }

    /// 按点分路径读取单个配置值，例如 `polling.alerts_ms`
    pub async fn get_value<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let config = self.config.read().await;
        let value = extract_nested_value(&config, path)?;
        serde_json::from_value(value).with_context(|| format!("Failed to deserialize value at {}", path))
    }

    /// 验证当前配置
    pub async fn validate_config(&self) -> Result<()> {
        let config = self.config.read().await;
        self.validator.validate(&config)
    }

    /// 当前配置对应的HTTP客户端配置
    pub async fn client_config(&self) -> ClientConfig {
        self.config.read().await.client_config()
    }
}

/// 取第一个非空的后端地址快捷变量
fn backend_url_override(env: Option<&HashMap<String, String>>) -> Option<(&'static str, String)> {
    BACKEND_URL_VARS.iter().find_map(|var| {
        let value = match env {
            Some(vars) => vars.get(*var).cloned(),
            None => std::env::var(var).ok(),
        };
        value.filter(|v| !v.trim().is_empty()).map(|v| (*var, v))
    })
}

fn extract_nested_value(config: &HospitrackConfig, path: &str) -> Result<serde_json::Value> {
    let config_json = serde_json::to_value(config).context("Failed to serialize config to JSON")?;

    let mut current = &config_json;
    for part in path.split('.') {
        match current {
            serde_json::Value::Object(map) => {
                current = map
                    .get(part)
                    .ok_or_else(|| anyhow::anyhow!("Path segment not found: {}", part))?;
            }
            _ => return Err(anyhow::anyhow!("Invalid path at segment: {}", part)),
        }
    }

    Ok(current.clone())
}

impl HospitrackConfig {
    pub fn client_config(&self) -> ClientConfig {
        let mut client = ClientConfig::new(self.backend.base_url.trim_end_matches('/'))
            .with_timeout(self.backend.timeout());
        if let Some(origin) = &self.backend.origin {
            client = client.with_origin(origin.clone());
        }
        client
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PollingConfig {
    pub fn beds(&self) -> Duration {
        Duration::from_millis(self.beds_ms)
    }

    pub fn patients(&self) -> Duration {
        Duration::from_millis(self.patients_ms)
    }

    pub fn alerts(&self) -> Duration {
        Duration::from_millis(self.alerts_ms)
    }

    pub fn dashboard(&self) -> Duration {
        Duration::from_millis(self.dashboard_ms)
    }
}

impl CorsConfig {
    pub fn allows(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|allowed| allowed == origin)
    }
}

impl ConfigValidator {
    /// 创建新的配置验证器
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "backend.base_url",
                validator: |config| {
                    let url = config.backend.base_url.trim();
                    if url.is_empty() {
                        Err(anyhow::anyhow!("Backend base URL cannot be empty"))
                    } else if !(url.starts_with("http://") || url.starts_with("https://")) {
                        Err(anyhow::anyhow!("Backend base URL must start with http:// or https://, got {}", url))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid backend base URL",
            },
            ValidationRule {
                field_path: "backend.timeout_secs",
                validator: |config| {
                    if config.backend.timeout_secs == 0 {
                        Err(anyhow::anyhow!("Request timeout cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid request timeout",
            },
            ValidationRule {
                field_path: "cors.allowed_origins",
                validator: |config| {
                    if config.cors.allowed_origins.is_empty() {
                        Err(anyhow::anyhow!("CORS allow-list cannot be empty"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid CORS configuration",
            },
            ValidationRule {
                field_path: "backend.origin",
                validator: |config| match &config.backend.origin {
                    Some(origin) if !config.cors.allows(origin) => {
                        Err(anyhow::anyhow!("Origin {} is not in the CORS allow-list", origin))
                    }
                    _ => Ok(()),
                },
                error_message: "Invalid request origin",
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置
    pub fn validate(&self, config: &HospitrackConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("{}: {}", rule.error_message, e));
            }
        }

        debug!("Configuration validation passed");
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
            origin: None,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            beds_ms: 30_000,
            patients_ms: 30_000,
            alerts_ms: 15_000,
            dashboard_ms: 60_000,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:5174".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            allow_credentials: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
