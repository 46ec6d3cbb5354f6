//! SDK 配置
//!
//! 默认值与 Web 客户端保持一致：
//! - 后端地址 `http://localhost:5000/api`，可由环境变量 `VIDTUBE_API_URL` 覆盖
//! - 请求超时 10 秒
//! - 评论轮询周期 10 秒

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, VidtubeSDKError};

/// 覆盖后端地址的环境变量名
pub const API_URL_ENV: &str = "VIDTUBE_API_URL";

/// 默认后端地址
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

/// HTTP 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// 连接超时（秒）
    pub connect_timeout_secs: Option<u64>,
    /// 请求超时（秒）
    pub request_timeout_secs: Option<u64>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: Some(5),
            request_timeout_secs: Some(10),
        }
    }
}

/// 评论轮询配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// 是否启用轮询
    pub enabled: bool,
    /// 轮询周期（毫秒）
    pub interval_ms: u64,
    /// 上一次拉取未返回时跳过本次 tick。关闭后轮询循环内联等待拉取完成，
    /// 错过的 tick 顺延；两种模式下同一时刻都最多只有一个在途请求
    pub skip_when_in_flight: bool,
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 10_000,
            skip_when_in_flight: true,
        }
    }
}

/// 事件配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    /// 事件广播缓冲区大小
    pub buffer_size: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self { buffer_size: 256 }
    }
}

/// Vidtube SDK 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VidtubeConfig {
    /// 后端 API 基础地址（包含 `/api` 前缀）
    pub api_base_url: String,
    /// 数据目录（会话 KV 存储位于 `<data_dir>/kv`）
    pub data_dir: PathBuf,
    /// 是否持久化登录会话；关闭后会话只存在于内存
    pub persist_session: bool,
    /// HTTP 客户端配置
    pub http_client_config: HttpClientConfig,
    /// 轮询配置
    pub poll_config: PollConfig,
    /// 事件配置
    pub event_config: EventConfig,
    /// 调试模式（日志级别 DEBUG）
    pub debug_mode: bool,
}

impl Default for VidtubeConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            data_dir: get_default_data_dir(),
            persist_session: true,
            http_client_config: HttpClientConfig::default(),
            poll_config: PollConfig::default(),
            event_config: EventConfig::default(),
            debug_mode: false,
        }
    }
}

impl VidtubeConfig {
    pub fn builder() -> VidtubeConfigBuilder {
        VidtubeConfigBuilder::new()
    }

    /// 默认配置 + 环境变量覆盖
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = api_url_from_env() {
            config.api_base_url = url;
        }
        config
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        let url = self.api_base_url.trim();
        if url.is_empty() {
            return Err(VidtubeSDKError::Config("api_base_url 不能为空".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(VidtubeSDKError::Config(format!(
                "api_base_url 必须以 http:// 或 https:// 开头: {}",
                url
            )));
        }
        if self.poll_config.enabled && self.poll_config.interval_ms == 0 {
            return Err(VidtubeSDKError::Config("轮询周期必须大于 0".to_string()));
        }
        if self.event_config.buffer_size == 0 {
            return Err(VidtubeSDKError::Config("事件缓冲区大小必须大于 0".to_string()));
        }
        Ok(())
    }

    /// 去掉末尾 `/` 的基础地址
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim().trim_end_matches('/')
    }
}

fn api_url_from_env() -> Option<String> {
    std::env::var(API_URL_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 获取默认数据目录 ~/.vidtube/
fn get_default_data_dir() -> PathBuf {
    if let Some(home_dir) = std::env::var("HOME").ok().map(PathBuf::from) {
        home_dir.join(".vidtube")
    } else if let Some(home_dir) = std::env::var("USERPROFILE").ok().map(PathBuf::from) {
        // Windows 支持
        home_dir.join(".vidtube")
    } else {
        PathBuf::from("./vidtube_data")
    }
}

/// Vidtube SDK 配置构建器
pub struct VidtubeConfigBuilder {
    config: VidtubeConfig,
}

impl VidtubeConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: VidtubeConfig::from_env(),
        }
    }

    pub fn api_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.data_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn persist_session(mut self, enabled: bool) -> Self {
        self.config.persist_session = enabled;
        self
    }

    pub fn http_client_config(mut self, config: HttpClientConfig) -> Self {
        self.config.http_client_config = config;
        self
    }

    pub fn poll_config(mut self, config: PollConfig) -> Self {
        self.config.poll_config = config;
        self
    }

    /// 仅修改轮询周期
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_config.interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn event_config(mut self, config: EventConfig) -> Self {
        self.config.event_config = config;
        self
    }

    pub fn debug_mode(mut self, enabled: bool) -> Self {
        self.config.debug_mode = enabled;
        self
    }

    pub fn build(self) -> VidtubeConfig {
        self.config
    }
}

impl Default for VidtubeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
