//! HTTP 客户端模块 - 所有 REST 调用的公共通道
//!
//! 职责：
//! - 拼接基础地址，附加 `Authorization: Bearer <token>`
//! - 把 HTTP 状态码映射到 SDK 错误分类
//! - 401/403 触发全局强制登出（旁路通知，不改变返回值）
//! - 解析 `{success, data, message}` 信封

use reqwest::{Client, Method};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::HttpClientConfig;
use crate::error::{Result, VidtubeSDKError};
use crate::session::SessionContext;

/// 请求的认证要求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRequirement {
    /// 不附带 token
    None,
    /// 有 token 就附带
    Optional,
    /// 必须登录；本地无会话时直接失败，不发请求
    Required,
}

/// REST API 客户端
#[derive(Clone)]
pub struct ApiHttpClient {
    client: Client,
    base_url: String,
    session: Arc<SessionContext>,
}

impl ApiHttpClient {
    /// 创建新的 HTTP 客户端
    pub fn new(
        config: &HttpClientConfig,
        base_url: &str,
        session: Arc<SessionContext>,
    ) -> Result<Self> {
        let mut builder = Client::builder();

        if let Some(timeout) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(timeout));
        }
        if let Some(timeout) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        let client = builder
            .build()
            .map_err(|e| VidtubeSDKError::Other(format!("创建 HTTP 客户端失败: {}", e)))?;

        let base_url = base_url.trim().trim_end_matches('/').to_string();
        info!("✅ HTTP 客户端已创建 (base_url: {})", base_url);

        Ok(Self {
            client,
            base_url,
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    /// 拼接完整 URL
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// 发送请求并返回响应体（JSON；空响应体为 `Value::Null`）
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        auth: AuthRequirement,
    ) -> Result<Value> {
        self.request_with_query(method, path, &[], body, auth).await
    }

    /// 同 [`Self::request`]，附带查询参数（由 reqwest 负责编码）
    pub async fn request_with_query(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        auth: AuthRequirement,
    ) -> Result<Value> {
        let url = self.url(path);

        let token = match auth {
            AuthRequirement::None => None,
            AuthRequirement::Optional => self.session.token(),
            AuthRequirement::Required => Some(self.session.token().ok_or_else(|| {
                VidtubeSDKError::Auth("Please sign in to continue".to_string())
            })?),
        };

        debug!("➡️ {} {} (auth={})", method, url, token.is_some());

        let mut request = self.client.request(method.clone(), &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VidtubeSDKError::Network(format!("{} {} 失败: {}", method, url, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| VidtubeSDKError::Network(format!("读取响应失败: {}", e)))?;

        let payload: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            // 非 JSON 响应（如网关错误页）保留原文作为消息
            serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.clone()))
        };

        debug!("⬅️ {} {} -> {}", method, url, status.as_u16());

        if !status.is_success() {
            let code = status.as_u16();
            if code == 401 || code == 403 {
                self.session.force_logout(code).await;
            }
            let message = extract_message(&payload);
            warn!("❌ {} {} 失败，HTTP 状态码: {}, 消息: {:?}", method, url, code, message);
            return Err(VidtubeSDKError::from_status(code, message));
        }

        if payload.get("success").and_then(Value::as_bool) == Some(false) {
            let message = extract_message(&payload).unwrap_or_default();
            warn!("❌ {} {} 返回 success=false: {}", method, url, message);
            return Err(VidtubeSDKError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(payload)
    }
}

/// 取信封中的 `data`；没有信封时返回整个响应体
pub fn envelope_data(payload: Value) -> Value {
    match payload {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// 从错误响应体中提取消息
fn extract_message(payload: &Value) -> Option<String> {
    match payload {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Object(_) => ["message", "error"]
            .iter()
            .filter_map(|k| payload.get(*k))
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .find(|s| !s.is_empty()),
        _ => None,
    }
}
