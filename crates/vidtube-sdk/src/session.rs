//! 登录会话上下文
//!
//! 会话以持久化 KV 为准（重启后仍然有效），启动时镜像到内存。
//! 上下文通过 `Arc<SessionContext>` 显式传给需要它的组件，没有全局单例。
//!
//! 生命周期：
//! - 登录/注册成功 → `establish`
//! - 用户登出 → `destroy`
//! - 任意请求返回 401/403 → `force_logout`

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{Result, VidtubeSDKError};
use crate::events::{event_builders, EventManager, SessionEndReason};
use crate::models::{AuthSession, UserProfile};
use crate::storage::KvStore;

/// 会话所在的 KV 命名空间
pub const SESSION_NAMESPACE: &str = "session";
/// token 键
pub const TOKEN_KEY: &str = "authToken";
/// 用户资料键
pub const USER_KEY: &str = "user";

/// 会话上下文
pub struct SessionContext {
    current: RwLock<Option<AuthSession>>,
    /// None 表示纯内存会话
    store: Option<KvStore>,
    events: Arc<EventManager>,
}

impl SessionContext {
    pub fn new(store: Option<KvStore>, events: Arc<EventManager>) -> Self {
        Self {
            current: RwLock::new(None),
            store,
            events,
        }
    }

    /// 不落盘的会话上下文
    pub fn ephemeral(events: Arc<EventManager>) -> Self {
        Self::new(None, events)
    }

    /// 从 KV 恢复会话
    ///
    /// 数据不完整或无法解析时清理掉，按未登录处理。
    pub async fn restore(&self) -> Result<Option<AuthSession>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };

        let token = store.get::<String>(SESSION_NAMESPACE, TOKEN_KEY).await;
        let user = store.get::<UserProfile>(SESSION_NAMESPACE, USER_KEY).await;

        match (token, user) {
            (Ok(Some(token)), Ok(Some(user))) if !token.trim().is_empty() => {
                let session = AuthSession { user, token };
                *self.current.write() = Some(session.clone());
                info!("✅ 已恢复登录会话: user_id={}", session.user.id);
                self.events
                    .emit(event_builders::session_established(&session.user.id, true))
                    .await;
                Ok(Some(session))
            }
            (Ok(None), Ok(None)) => Ok(None),
            (token, user) => {
                warn!(
                    "⚠️ 持久化会话不完整或已损坏，清理: token_ok={}, user_ok={}",
                    matches!(token, Ok(Some(_))),
                    matches!(user, Ok(Some(_)))
                );
                store.clear(SESSION_NAMESPACE).await?;
                self.events
                    .emit(event_builders::session_cleared(SessionEndReason::Corrupted))
                    .await;
                Ok(None)
            }
        }
    }

    /// 建立会话（登录/注册成功）
    pub async fn establish(&self, session: AuthSession) -> Result<()> {
        if session.token.trim().is_empty() {
            return Err(VidtubeSDKError::InvalidData("服务端返回的 token 为空".to_string()));
        }

        if let Some(store) = &self.store {
            store.set(SESSION_NAMESPACE, TOKEN_KEY, &session.token).await?;
            store.set(SESSION_NAMESPACE, USER_KEY, &session.user).await?;
        }

        let user_id = session.user.id.clone();
        *self.current.write() = Some(session);

        info!("✅ 登录会话已建立: user_id={}", user_id);
        self.events
            .emit(event_builders::session_established(&user_id, false))
            .await;
        Ok(())
    }

    /// 更新用户资料（token 不变）
    pub async fn update_user(&self, user: UserProfile) -> Result<()> {
        {
            let mut current = self.current.write();
            match current.as_mut() {
                Some(session) => session.user = user.clone(),
                None => return Err(VidtubeSDKError::Auth("not signed in".to_string())),
            }
        }

        if let Some(store) = &self.store {
            store.set(SESSION_NAMESPACE, USER_KEY, &user).await?;
        }
        Ok(())
    }

    /// 用户主动登出
    pub async fn destroy(&self) -> Result<()> {
        let previous = self.current.write().take();

        if let Some(store) = &self.store {
            store.clear(SESSION_NAMESPACE).await?;
        }

        if let Some(session) = previous {
            info!("👋 登录会话已销毁: user_id={}", session.user.id);
        }
        self.events
            .emit(event_builders::session_cleared(SessionEndReason::Logout))
            .await;
        Ok(())
    }

    /// 收到 401/403 时的全局强制登出
    ///
    /// 作为旁路通知存在，不影响原请求的返回值；持久化清理失败只记日志。
    pub async fn force_logout(&self, status: u16) {
        let previous = self.current.write().take();

        if let Some(store) = &self.store {
            if let Err(e) = store.clear(SESSION_NAMESPACE).await {
                warn!("⚠️ 强制登出时清理持久化会话失败: {}", e);
            }
        }

        warn!(
            "🔒 收到 HTTP {}，强制登出 (had_session={})",
            status,
            previous.is_some()
        );
        self.events.emit(event_builders::forced_logout(status)).await;
        if previous.is_some() {
            self.events
                .emit(event_builders::session_cleared(SessionEndReason::Unauthorized))
                .await;
        }
    }

    pub fn current(&self) -> Option<AuthSession> {
        self.current.read().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.current.read().as_ref().map(|s| s.token.clone())
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.current.read().as_ref().map(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn events(&self) -> &Arc<EventManager> {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SDKEvent;
    use tempfile::TempDir;

    fn sample_session() -> AuthSession {
        AuthSession {
            user: UserProfile {
                id: "u1".into(),
                username: "alice".into(),
                email: "alice@example.com".into(),
                avatar: None,
            },
            token: "tok-1".into(),
        }
    }

    #[tokio::test]
    async fn test_session_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let events = Arc::new(EventManager::new(16));

        {
            let store = KvStore::open(dir.path()).await.unwrap();
            let ctx = SessionContext::new(Some(store), events.clone());
            ctx.establish(sample_session()).await.unwrap();
            assert_eq!(ctx.token().as_deref(), Some("tok-1"));
        }

        let store = KvStore::open(dir.path()).await.unwrap();
        let ctx = SessionContext::new(Some(store), events.clone());
        assert!(!ctx.is_authenticated());
        let restored = ctx.restore().await.unwrap();
        assert_eq!(restored, Some(sample_session()));
        assert!(ctx.is_authenticated());

        ctx.destroy().await.unwrap();
        assert!(!ctx.is_authenticated());
        assert_eq!(ctx.restore().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_partial_session_is_cleared() {
        let dir = TempDir::new().unwrap();
        let events = Arc::new(EventManager::new(16));
        let store = KvStore::open(dir.path()).await.unwrap();
        store.set(SESSION_NAMESPACE, TOKEN_KEY, &"orphan-token").await.unwrap();

        let ctx = SessionContext::new(Some(store.clone()), events);
        assert_eq!(ctx.restore().await.unwrap(), None);
        assert!(!store.exists(SESSION_NAMESPACE, TOKEN_KEY).await.unwrap());
    }

    #[tokio::test]
    async fn test_force_logout_clears_and_notifies() {
        let events = Arc::new(EventManager::new(16));
        let mut rx = events.subscribe();
        let ctx = SessionContext::ephemeral(events.clone());
        ctx.establish(sample_session()).await.unwrap();

        ctx.force_logout(401).await;
        assert!(!ctx.is_authenticated());
        assert_eq!(ctx.token(), None);

        let mut saw_forced = false;
        let mut saw_cleared = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                SDKEvent::ForcedLogout { status, .. } => {
                    assert_eq!(status, 401);
                    saw_forced = true;
                }
                SDKEvent::SessionCleared { reason, .. } => {
                    assert_eq!(reason, SessionEndReason::Unauthorized);
                    saw_cleared = true;
                }
                _ => {}
            }
        }
        assert!(saw_forced && saw_cleared);
    }

    #[tokio::test]
    async fn test_establish_rejects_empty_token() {
        let ctx = SessionContext::ephemeral(Arc::new(EventManager::new(4)));
        let mut session = sample_session();
        session.token = "  ".into();
        assert!(ctx.establish(session).await.is_err());
        assert!(!ctx.is_authenticated());

        assert!(ctx.update_user(sample_session().user).await.is_err());
    }
}
