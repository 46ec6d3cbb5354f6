//! SDK 入口
//!
//! 按层组装：配置校验 → 日志 → 事件 → 本地存储与会话恢复 → HTTP 客户端 → 网关与认证。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::auth::AuthClient;
use crate::config::VidtubeConfig;
use crate::error::{Result, VidtubeSDKError};
use crate::events::{EventFilter, EventManager, FilteredEventReceiver, SDKEvent};
use crate::gateway::{HttpInteractionGateway, InteractionGateway};
use crate::http_client::ApiHttpClient;
use crate::logging;
use crate::models::{AuthSession, UserProfile, VideoPage, VideoQuery};
use crate::session::SessionContext;
use crate::storage::KvStore;
use crate::validation::{LoginForm, RegisterForm};
use crate::view::VideoView;

pub struct VidtubeSDK {
    config: VidtubeConfig,
    events: Arc<EventManager>,
    session: Arc<SessionContext>,
    gateway: Arc<dyn InteractionGateway>,
    auth: AuthClient,
    initialized: AtomicBool,
}

impl VidtubeSDK {
    /// 初始化 SDK
    pub async fn initialize(config: VidtubeConfig) -> Result<Arc<Self>> {
        config.validate()?;

        if config.debug_mode {
            logging::init_tracing(true);
        }
        info!("正在初始化 VidtubeSDK (api: {})...", config.base_url());

        // === 第1层：事件管理器 ===
        let events = Arc::new(EventManager::new(config.event_config.buffer_size));

        // === 第2层：本地存储与会话 ===
        let store = if config.persist_session {
            Some(KvStore::open(&config.data_dir).await?)
        } else {
            None
        };
        let session = Arc::new(SessionContext::new(store, events.clone()));
        match session.restore().await {
            Ok(Some(restored)) => info!("已恢复登录会话: user_id={}", restored.user.id),
            Ok(None) => info!("未找到持久化会话，以游客身份启动"),
            Err(e) => warn!("⚠️ 恢复会话失败，以游客身份启动: {}", e),
        }

        // === 第3层：HTTP 客户端、网关与认证 ===
        let http = ApiHttpClient::new(&config.http_client_config, config.base_url(), session.clone())?;
        let gateway: Arc<dyn InteractionGateway> = Arc::new(HttpInteractionGateway::new(http.clone()));
        let auth = AuthClient::new(http);

        info!("✅ VidtubeSDK 初始化完成");

        Ok(Arc::new(Self {
            config,
            events,
            session,
            gateway,
            auth,
            initialized: AtomicBool::new(true),
        }))
    }

    pub fn config(&self) -> &VidtubeConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(VidtubeSDKError::Other("SDK 已关闭".to_string()))
        }
    }

    /// 打开视频视图（首屏加载 + 启动轮询）
    pub async fn open_video(&self, video_id: &str) -> Result<VideoView> {
        self.ensure_initialized()?;
        VideoView::mount(
            video_id,
            self.gateway.clone(),
            self.session.clone(),
            self.events.clone(),
            self.config.poll_config.clone(),
        )
        .await
    }

    /// 浏览视频列表
    pub async fn list_videos(&self, query: &VideoQuery) -> Result<VideoPage> {
        self.ensure_initialized()?;
        self.gateway.list_videos(query).await
    }

    /// 搜索视频
    pub async fn search_videos(&self, keyword: &str, filters: &VideoQuery) -> Result<VideoPage> {
        self.ensure_initialized()?;
        self.gateway.search_videos(keyword, filters).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        self.ensure_initialized()?;
        self.auth.login(&LoginForm::new(email, password)).await
    }

    pub async fn register(&self, form: &RegisterForm) -> Result<AuthSession> {
        self.ensure_initialized()?;
        self.auth.register(form).await
    }

    pub async fn logout(&self) -> Result<()> {
        self.auth.logout().await
    }

    pub async fn profile(&self) -> Result<UserProfile> {
        self.ensure_initialized()?;
        self.auth.profile().await
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn events(&self) -> &Arc<EventManager> {
        &self.events
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SDKEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_filtered(&self, filter: EventFilter) -> FilteredEventReceiver {
        self.events.subscribe_filtered(filter)
    }

    /// 关闭 SDK；已打开的视图由调用方卸载
    pub async fn shutdown(&self) -> Result<()> {
        if !self.initialized.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        info!("正在关闭 VidtubeSDK...");
        self.events.clear_listeners().await;
        info!("VidtubeSDK 关闭完成");
        Ok(())
    }
}
