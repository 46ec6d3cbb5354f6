//! Vidtube SDK - 视频互动同步 SDK
//!
//! 负责视频详情页的评论与表态同步：
//! - 🌐 远程互动网关：REST 调用、服务端数据归一化、401/403 强制登出、视频浏览与搜索
//! - 🗂️ 本地评论缓存：排序视图、乐观条目的确认与回滚
//! - ⚡ 乐观更新：先本地生效，失败回滚，同类操作防重
//! - 🔄 轮询刷新：固定周期拉取服务端列表，跳过重叠请求
//! - 🔐 会话：显式传递的登录上下文，sled 持久化
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use vidtube_sdk::{SortKey, VidtubeConfig, VidtubeSDK};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = VidtubeConfig::builder()
//!         .api_base_url("http://localhost:5000/api")
//!         .data_dir("/path/to/data")
//!         .build();
//!
//!     let sdk = VidtubeSDK::initialize(config).await?;
//!     sdk.login("alice@example.com", "secret123").await?;
//!
//!     // 打开视频详情（首屏加载 + 启动轮询）
//!     let view = sdk.open_video("video123").await?;
//!     view.set_sort_key(SortKey::MostLiked);
//!     view.submit_comment("Hello").await?;
//!
//!     for comment in view.comments() {
//!         println!("{}: {}", comment.author.display_name, comment.body);
//!     }
//!
//!     view.unmount();
//!     sdk.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod gateway;
pub mod http_client;
pub mod logging;
pub mod models;
pub mod poller;
pub mod sdk;
pub mod session;
pub mod storage;
pub mod validation;
pub mod view;

// 重新导出核心类型，方便使用
pub use auth::AuthClient;
pub use cache::CommentCache;
pub use config::{EventConfig, HttpClientConfig, PollConfig, VidtubeConfig, VidtubeConfigBuilder};
pub use controller::{ActionKind, ActionOutcome, ActionState, OptimisticController};
pub use error::{Result, VidtubeSDKError};
pub use events::{EventFilter, EventManager, SDKEvent, SessionEndReason};
pub use gateway::{HttpInteractionGateway, InteractionGateway};
pub use http_client::{ApiHttpClient, AuthRequirement};
pub use models::{
    AuthSession, Comment, CommentAuthor, CommentId, LikeOutcome, SortKey, UserProfile, VideoPage,
    VideoQuery, VideoReaction, VideoReactions, VideoSummary,
};
pub use poller::{PollRefresher, PollStats};
pub use sdk::VidtubeSDK;
pub use session::SessionContext;
pub use storage::KvStore;
pub use validation::{LoginForm, RegisterForm};
pub use view::VideoView;
