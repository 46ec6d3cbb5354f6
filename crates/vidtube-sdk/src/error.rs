use thiserror::Error;

/// SDK 错误
///
/// 分类与 UI 行为对应：
/// - `Network`：传输层失败（DNS/超时/断网），读操作降级为空，写操作上抛
/// - `Validation`：客户端或服务端拒绝输入，就地提示
/// - `Auth`：缺少/过期/无权限，触发强制登出
/// - `NotFound`：目标已不存在，通常静默对账
#[derive(Debug, Error)]
pub enum VidtubeSDKError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// 服务器返回的其他非成功状态（message 为服务端原文，可能为空）
    #[error("Server error [{status}]: {message}")]
    Server { status: u16, message: String },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("KV store error: {0}")]
    KvStore(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for VidtubeSDKError {
    fn from(error: serde_json::Error) -> Self {
        VidtubeSDKError::Serialization(error.to_string())
    }
}

impl From<sled::Error> for VidtubeSDKError {
    fn from(error: sled::Error) -> Self {
        VidtubeSDKError::KvStore(error.to_string())
    }
}

impl From<reqwest::Error> for VidtubeSDKError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            VidtubeSDKError::Serialization(error.to_string())
        } else {
            VidtubeSDKError::Network(error.to_string())
        }
    }
}

impl VidtubeSDKError {
    /// 是否为认证错误（401/403 或本地无会话）
    pub fn is_auth(&self) -> bool {
        matches!(self, VidtubeSDKError::Auth(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, VidtubeSDKError::NotFound(_))
    }

    pub fn is_network(&self) -> bool {
        matches!(self, VidtubeSDKError::Network(_))
    }

    /// 根据 HTTP 状态码和服务端消息构造错误
    ///
    /// 401/403 统一映射为 `Auth`，调用方负责触发强制登出。
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        let message = message.unwrap_or_default();
        match status {
            400 | 422 => VidtubeSDKError::Validation(message),
            401 | 403 => VidtubeSDKError::Auth(message),
            404 => VidtubeSDKError::NotFound(message),
            _ => VidtubeSDKError::Server { status, message },
        }
    }

    /// 面向用户的简短提示
    ///
    /// 服务端原文为空时使用 `fallback`，网络错误永远使用固定文案。
    pub fn user_message(&self, fallback: &str) -> String {
        let pick = |message: &str| {
            let trimmed = message.trim();
            if trimmed.is_empty() {
                fallback.to_string()
            } else {
                trimmed.to_string()
            }
        };

        match self {
            VidtubeSDKError::Network(_) => {
                "Network unavailable. Please try again.".to_string()
            }
            VidtubeSDKError::Validation(message) => pick(message),
            VidtubeSDKError::Auth(message) => {
                if message.trim().is_empty() {
                    "Please sign in again.".to_string()
                } else {
                    pick(message)
                }
            }
            VidtubeSDKError::Server { message, .. } => pick(message),
            _ => fallback.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VidtubeSDKError>;
