//! 认证客户端
//!
//! 登录/注册成功后直接建立会话；登出无论服务端是否成功都会清理本地会话。

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::{Result, VidtubeSDKError};
use crate::http_client::{envelope_data, ApiHttpClient, AuthRequirement};
use crate::models::{normalize_user, AuthSession, UserProfile};
use crate::validation::{LoginForm, RegisterForm};

pub struct AuthClient {
    http: ApiHttpClient,
}

impl AuthClient {
    pub fn new(http: ApiHttpClient) -> Self {
        Self { http }
    }

    /// 登录
    pub async fn login(&self, form: &LoginForm) -> Result<AuthSession> {
        form.validate()?;

        let request = json!({
            "email": form.email.trim(),
            "password": form.password,
        });
        let payload = self
            .http
            .request(Method::POST, "/auth/login", Some(&request), AuthRequirement::None)
            .await?;

        let session = parse_auth_payload(payload)?;
        self.http.session().establish(session.clone()).await?;
        info!("✅ 登录成功: user_id={}", session.user.id);
        Ok(session)
    }

    /// 注册（成功后视为已登录）
    pub async fn register(&self, form: &RegisterForm) -> Result<AuthSession> {
        form.validate()?;

        let request = json!({
            "username": form.username.trim(),
            "email": form.email.trim(),
            "password": form.password,
        });
        let payload = self
            .http
            .request(Method::POST, "/auth/register", Some(&request), AuthRequirement::None)
            .await?;

        let session = parse_auth_payload(payload)?;
        self.http.session().establish(session.clone()).await?;
        info!("✅ 注册成功: user_id={}", session.user.id);
        Ok(session)
    }

    /// 登出
    pub async fn logout(&self) -> Result<()> {
        if self.http.session().is_authenticated() {
            if let Err(e) = self
                .http
                .request(Method::POST, "/auth/logout", None, AuthRequirement::Optional)
                .await
            {
                warn!("⚠️ 服务端登出失败，仍清理本地会话: {}", e);
            }
        }
        self.http.session().destroy().await
    }

    /// 获取当前用户资料并同步到会话
    pub async fn profile(&self) -> Result<UserProfile> {
        let payload = self
            .http
            .request(Method::GET, "/auth/profile", None, AuthRequirement::Required)
            .await?;

        let data = envelope_data(payload);
        let user_value = data.get("user").cloned().unwrap_or(data);
        let user = normalize_user(&user_value)?;
        self.http.session().update_user(user.clone()).await?;
        Ok(user)
    }
}

/// 解析 `{token, user}`，兼容包在 `data` 里的形式
fn parse_auth_payload(payload: Value) -> Result<AuthSession> {
    let body = if payload.get("token").is_some() {
        payload
    } else {
        envelope_data(payload)
    };

    let token = body
        .get("token")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| VidtubeSDKError::InvalidData("认证响应缺少 token".to_string()))?
        .to_string();

    let user = body
        .get("user")
        .ok_or_else(|| VidtubeSDKError::InvalidData("认证响应缺少 user".to_string()))
        .and_then(normalize_user)?;

    Ok(AuthSession { user, token })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_auth_payload_shapes() {
        let flat = json!({ "token": "t1", "user": { "_id": "u1", "username": "a", "email": "a@x.io" } });
        let session = parse_auth_payload(flat).unwrap();
        assert_eq!(session.token, "t1");
        assert_eq!(session.user.id, "u1");

        let wrapped = json!({ "success": true, "data": { "token": "t2", "user": { "id": 7, "name": "b" } } });
        let session = parse_auth_payload(wrapped).unwrap();
        assert_eq!(session.token, "t2");
        assert_eq!(session.user.id, "7");
        assert_eq!(session.user.username, "b");

        assert!(parse_auth_payload(json!({ "user": { "id": 1 } })).is_err());
        assert!(parse_auth_payload(json!({ "token": "t" })).is_err());
    }
}
