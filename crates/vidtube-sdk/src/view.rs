//! 视频视图
//!
//! 一个视频详情页的互动状态：评论缓存、视频表态、乐观更新控制器与轮询器都归属于视图，
//! 不跨视图共享。挂载时拉取首屏评论与视频表态计数并启动轮询；卸载（或 drop）时取消挂载令牌，
//! 轮询停止，进行中的响应不再应用。

use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cache::CommentCache;
use crate::config::PollConfig;
use crate::controller::{ActionKind, ActionOutcome, ActionState, OptimisticController};
use crate::error::{Result, VidtubeSDKError};
use crate::events::{event_builders, EventManager};
use crate::gateway::InteractionGateway;
use crate::models::{
    Comment, CommentId, LikeOutcome, SortKey, VideoReaction, VideoReactions,
};
use crate::poller::{PollRefresher, PollStats};
use crate::session::SessionContext;

pub struct VideoView {
    video_id: String,
    cache: Arc<Mutex<CommentCache>>,
    controller: OptimisticController,
    poller: PollRefresher,
    sort_key: Mutex<SortKey>,
    mounted: CancellationToken,
}

impl VideoView {
    /// 挂载视图：拉取首屏评论与表态计数，并启动轮询
    pub async fn mount(
        video_id: &str,
        gateway: Arc<dyn InteractionGateway>,
        session: Arc<SessionContext>,
        events: Arc<EventManager>,
        poll_config: PollConfig,
    ) -> Result<Self> {
        let video_id = video_id.trim();
        if video_id.is_empty() {
            return Err(VidtubeSDKError::Validation("video id is required".to_string()));
        }

        let cache = Arc::new(Mutex::new(CommentCache::new()));
        let (initial, reactions) = tokio::join!(
            gateway.fetch_comments(video_id),
            gateway.fetch_video_reactions(video_id)
        );
        let count = {
            let mut cache = cache.lock();
            cache.replace_all(initial);
            cache.len()
        };
        events
            .emit(event_builders::comments_refreshed(video_id, count))
            .await;

        let mounted = CancellationToken::new();
        let controller = OptimisticController::new(
            video_id,
            gateway.clone(),
            cache.clone(),
            session,
            events.clone(),
            mounted.clone(),
        );
        let poller = PollRefresher::new(
            video_id,
            gateway,
            cache.clone(),
            events,
            poll_config,
            mounted.child_token(),
        );
        if let Some(reactions) = reactions {
            controller.set_reactions(reactions);
        }
        poller.start();

        info!("🎬 视频视图已挂载: video_id={}, comments={}", video_id, count);

        Ok(Self {
            video_id: video_id.to_string(),
            cache,
            controller,
            poller,
            sort_key: Mutex::new(SortKey::default()),
            mounted,
        })
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    /// 按当前排序方式返回评论
    pub fn comments(&self) -> Vec<Comment> {
        let key = *self.sort_key.lock();
        self.cache.lock().sorted_view(key)
    }

    pub fn comment(&self, id: &CommentId) -> Option<Comment> {
        self.cache.lock().get(id).cloned()
    }

    pub fn comment_count(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn sort_key(&self) -> SortKey {
        *self.sort_key.lock()
    }

    pub fn set_sort_key(&self, key: SortKey) {
        *self.sort_key.lock() = key;
    }

    pub fn reactions(&self) -> VideoReactions {
        self.controller.reactions()
    }

    /// 覆盖表态计数（例如调用方已持有更新的视频详情）
    pub fn set_reactions(&self, reactions: VideoReactions) {
        self.controller.set_reactions(reactions);
    }

    pub fn action_state(&self, kind: ActionKind) -> ActionState {
        self.controller.action_state(kind)
    }

    pub async fn submit_comment(&self, body: &str) -> Result<ActionOutcome<Comment>> {
        self.controller.submit_comment(body).await
    }

    pub async fn edit_comment(&self, id: &CommentId, body: &str) -> Result<ActionOutcome<Comment>> {
        self.controller.edit_comment(id, body).await
    }

    pub async fn delete_comment(&self, id: &CommentId) -> Result<ActionOutcome<()>> {
        self.controller.delete_comment(id).await
    }

    pub async fn like_comment(&self, id: &CommentId) -> Result<ActionOutcome<LikeOutcome>> {
        self.controller.like_comment(id).await
    }

    pub async fn like_video(&self) -> Result<ActionOutcome<VideoReactions>> {
        self.controller.react_to_video(VideoReaction::Like).await
    }

    pub async fn dislike_video(&self) -> Result<ActionOutcome<VideoReactions>> {
        self.controller.react_to_video(VideoReaction::Dislike).await
    }

    /// 手动刷新（强制重新加载评论）
    pub async fn refresh_now(&self) -> Option<usize> {
        if !self.is_mounted() {
            return None;
        }
        self.poller.refresh_now().await
    }

    pub fn poll_stats(&self) -> PollStats {
        self.poller.stats()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    pub fn is_mounted(&self) -> bool {
        !self.mounted.is_cancelled()
    }

    /// 卸载视图，可重复调用
    pub fn unmount(&self) {
        if !self.mounted.is_cancelled() {
            self.mounted.cancel();
            info!("👋 视频视图已卸载: video_id={}", self.video_id);
        }
    }
}

impl Drop for VideoView {
    fn drop(&mut self) {
        self.mounted.cancel();
    }
}
