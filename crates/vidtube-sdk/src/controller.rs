//! 乐观更新控制器
//!
//! 每个用户操作按 "本地应用 → 远程调用 → 确认或回滚" 的顺序执行：
//! - 每类操作有独立的 busy 标记，Pending 期间的重复触发直接丢弃
//! - 远程失败时恢复到 Pending 之前的本地状态，并给出可展示的提示
//! - 远程返回 NotFound 视为目标已被并发删除，静默对齐
//! - 视图卸载后到达的响应不再应用
//!
//! 与轮询的竞争：轮询的 `replace_all` 代表服务端真相。操作开始后如果缓存已被
//! 整体替换过，回滚不再执行，以服务端列表为准；确认结果总是应用。

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::CommentCache;
use crate::error::{Result, VidtubeSDKError};
use crate::events::{event_builders, EventManager};
use crate::gateway::InteractionGateway;
use crate::models::{
    Comment, CommentAuthor, CommentId, LikeOutcome, VideoReaction, VideoReactions,
};
use crate::session::SessionContext;
use crate::validation::validate_comment_body;

/// 操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Submit,
    Edit,
    Delete,
    LikeComment,
    ReactVideo,
}

impl ActionKind {
    /// 服务端没有给出消息时展示的默认提示
    pub fn fallback_message(&self) -> &'static str {
        match self {
            ActionKind::Submit => "Failed to post comment",
            ActionKind::Edit => "Failed to update comment",
            ActionKind::Delete => "Failed to delete comment",
            ActionKind::LikeComment => "Failed to like comment",
            ActionKind::ReactVideo => "Failed to update reaction",
        }
    }
}

/// 单类操作的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    Idle,
    Pending,
}

/// 操作结果
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome<T> {
    /// 服务端已确认，缓存已更新为服务端数据
    Committed(T),
    /// 目标已不存在（NotFound 或已被轮询移除），本地已对齐
    Reconciled,
    /// 同类操作仍在 Pending，本次触发被丢弃
    Ignored,
    /// 响应到达时视图已卸载，未应用任何结果
    Detached,
}

impl<T> ActionOutcome<T> {
    pub fn is_committed(&self) -> bool {
        matches!(self, ActionOutcome::Committed(_))
    }

    pub fn committed(self) -> Option<T> {
        match self {
            ActionOutcome::Committed(value) => Some(value),
            _ => None,
        }
    }
}

/// busy 标记守卫，drop 时回到 Idle
struct BusyGuard<'a> {
    flags: &'a Mutex<HashSet<ActionKind>>,
    kind: ActionKind,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flags.lock().remove(&self.kind);
    }
}

pub struct OptimisticController {
    video_id: String,
    gateway: Arc<dyn InteractionGateway>,
    cache: Arc<Mutex<CommentCache>>,
    reactions: Mutex<VideoReactions>,
    busy: Mutex<HashSet<ActionKind>>,
    /// 视图挂载标识，取消即视为已卸载
    mounted: CancellationToken,
    session: Arc<SessionContext>,
    events: Arc<EventManager>,
}

impl OptimisticController {
    pub fn new(
        video_id: impl Into<String>,
        gateway: Arc<dyn InteractionGateway>,
        cache: Arc<Mutex<CommentCache>>,
        session: Arc<SessionContext>,
        events: Arc<EventManager>,
        mounted: CancellationToken,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            gateway,
            cache,
            reactions: Mutex::new(VideoReactions::default()),
            busy: Mutex::new(HashSet::new()),
            mounted,
            session,
            events,
        }
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn action_state(&self, kind: ActionKind) -> ActionState {
        if self.busy.lock().contains(&kind) {
            ActionState::Pending
        } else {
            ActionState::Idle
        }
    }

    pub fn reactions(&self) -> VideoReactions {
        *self.reactions.lock()
    }

    /// 设置视频表态初始值（来自视频详情）
    pub fn set_reactions(&self, reactions: VideoReactions) {
        *self.reactions.lock() = reactions;
    }

    /// 发表评论
    pub async fn submit_comment(&self, body: &str) -> Result<ActionOutcome<Comment>> {
        let body = validate_comment_body(body)?;
        let user = self
            .session
            .user()
            .ok_or_else(|| VidtubeSDKError::Auth("Please sign in to comment".to_string()))?;

        let Some(_busy) = self.begin(ActionKind::Submit) else {
            return Ok(ActionOutcome::Ignored);
        };

        let temp_id = self.cache.lock().insert_optimistic(Comment::optimistic(
            &self.video_id,
            CommentAuthor::from(&user),
            &body,
        ));
        debug!("📝 乐观插入评论: video_id={}, temp_id={}", self.video_id, temp_id);

        let result = self.gateway.create_comment(&self.video_id, &body).await;
        if !self.is_mounted() {
            return Ok(ActionOutcome::Detached);
        }

        match result {
            Ok(mut confirmed) => {
                if confirmed.video_id.is_empty() {
                    confirmed.video_id = self.video_id.clone();
                }
                self.cache.lock().confirm(&temp_id, confirmed.clone());
                self.committed(ActionKind::Submit).await;
                Ok(ActionOutcome::Committed(confirmed))
            }
            Err(e) => {
                // 临时条目不可能出现在服务端列表里，无论是否被轮询替换过都直接丢弃
                self.cache.lock().discard_temporary(&temp_id);
                self.rolled_back(ActionKind::Submit, &e).await;
                Err(e)
            }
        }
    }

    /// 修改评论
    pub async fn edit_comment(&self, id: &CommentId, body: &str) -> Result<ActionOutcome<Comment>> {
        let body = validate_comment_body(body)?;
        let remote_id = Self::remote_id(id)?;

        let Some(_busy) = self.begin(ActionKind::Edit) else {
            return Ok(ActionOutcome::Ignored);
        };

        let (previous, generation) = {
            let mut cache = self.cache.lock();
            (cache.apply_edit(id, &body), cache.generation())
        };
        let Some((previous_body, previous_edited)) = previous else {
            debug!("评论已不在缓存中，跳过修改: {}", id);
            return Ok(ActionOutcome::Reconciled);
        };

        let result = self.gateway.update_comment(&remote_id, &body).await;
        if !self.is_mounted() {
            return Ok(ActionOutcome::Detached);
        }

        match result {
            Ok(mut updated) => {
                if updated.video_id.is_empty() {
                    updated.video_id = self.video_id.clone();
                }
                updated.edited = true;
                self.cache.lock().replace_entry(id, updated.clone());
                self.committed(ActionKind::Edit).await;
                Ok(ActionOutcome::Committed(updated))
            }
            Err(VidtubeSDKError::NotFound(_)) => {
                self.reconcile_missing(id);
                Ok(ActionOutcome::Reconciled)
            }
            Err(e) => {
                {
                    let mut cache = self.cache.lock();
                    if cache.generation() == generation {
                        cache.restore_edit(id, previous_body, previous_edited);
                    }
                }
                self.rolled_back(ActionKind::Edit, &e).await;
                Err(e)
            }
        }
    }

    /// 删除评论；失败时放回原位置
    pub async fn delete_comment(&self, id: &CommentId) -> Result<ActionOutcome<()>> {
        let remote_id = Self::remote_id(id)?;

        let Some(_busy) = self.begin(ActionKind::Delete) else {
            return Ok(ActionOutcome::Ignored);
        };

        let (removed, generation) = {
            let mut cache = self.cache.lock();
            (cache.remove(id), cache.generation())
        };
        let Some((position, comment)) = removed else {
            return Ok(ActionOutcome::Reconciled);
        };

        let result = self.gateway.delete_comment(&remote_id).await;
        if !self.is_mounted() {
            return Ok(ActionOutcome::Detached);
        }

        match result {
            Ok(()) => {
                self.committed(ActionKind::Delete).await;
                Ok(ActionOutcome::Committed(()))
            }
            Err(VidtubeSDKError::NotFound(_)) => {
                debug!("评论已在服务端删除: {}", id);
                Ok(ActionOutcome::Reconciled)
            }
            Err(e) => {
                {
                    let mut cache = self.cache.lock();
                    if cache.generation() == generation {
                        cache.restore_at(position, comment);
                    }
                }
                self.rolled_back(ActionKind::Delete, &e).await;
                Err(e)
            }
        }
    }

    /// 切换评论点赞
    pub async fn like_comment(&self, id: &CommentId) -> Result<ActionOutcome<LikeOutcome>> {
        let remote_id = Self::remote_id(id)?;

        let Some(_busy) = self.begin(ActionKind::LikeComment) else {
            return Ok(ActionOutcome::Ignored);
        };

        let (previous, generation) = {
            let mut cache = self.cache.lock();
            (cache.toggle_like(id), cache.generation())
        };
        let Some(previous) = previous else {
            return Ok(ActionOutcome::Reconciled);
        };

        let result = self.gateway.like_comment(&remote_id).await;
        if !self.is_mounted() {
            return Ok(ActionOutcome::Detached);
        }

        match result {
            Ok(outcome) => {
                self.cache.lock().set_like(id, outcome);
                self.committed(ActionKind::LikeComment).await;
                Ok(ActionOutcome::Committed(outcome))
            }
            Err(VidtubeSDKError::NotFound(_)) => {
                self.reconcile_missing(id);
                Ok(ActionOutcome::Reconciled)
            }
            Err(e) => {
                {
                    let mut cache = self.cache.lock();
                    if cache.generation() == generation {
                        cache.set_like(id, previous);
                    }
                }
                self.rolled_back(ActionKind::LikeComment, &e).await;
                Err(e)
            }
        }
    }

    /// 点赞/点踩视频
    pub async fn react_to_video(
        &self,
        reaction: VideoReaction,
    ) -> Result<ActionOutcome<VideoReactions>> {
        let Some(_busy) = self.begin(ActionKind::ReactVideo) else {
            return Ok(ActionOutcome::Ignored);
        };

        let previous = {
            let mut reactions = self.reactions.lock();
            let previous = *reactions;
            reactions.toggle(reaction);
            previous
        };

        let result = self.gateway.react_to_video(&self.video_id, reaction).await;
        if !self.is_mounted() {
            return Ok(ActionOutcome::Detached);
        }

        match result {
            Ok(server) => {
                let current = {
                    let mut reactions = self.reactions.lock();
                    if let Some(server) = server {
                        *reactions = server;
                    }
                    *reactions
                };
                self.committed(ActionKind::ReactVideo).await;
                Ok(ActionOutcome::Committed(current))
            }
            Err(e) => {
                *self.reactions.lock() = previous;
                self.rolled_back(ActionKind::ReactVideo, &e).await;
                Err(e)
            }
        }
    }

    fn is_mounted(&self) -> bool {
        !self.mounted.is_cancelled()
    }

    fn begin(&self, kind: ActionKind) -> Option<BusyGuard<'_>> {
        if !self.busy.lock().insert(kind) {
            debug!("⏳ {:?} 仍在进行中，忽略重复触发", kind);
            return None;
        }
        Some(BusyGuard {
            flags: &self.busy,
            kind,
        })
    }

    /// 临时评论还没有服务端 ID，不能发起远程修改
    fn remote_id(id: &CommentId) -> Result<String> {
        id.as_permanent()
            .map(str::to_string)
            .ok_or_else(|| VidtubeSDKError::Validation("Comment is still being posted".to_string()))
    }

    fn reconcile_missing(&self, id: &CommentId) {
        if self.cache.lock().remove(id).is_some() {
            debug!("🧹 服务端已不存在该评论，本地移除: {}", id);
        }
    }

    async fn committed(&self, kind: ActionKind) {
        info!("✅ {:?} 已确认: video_id={}", kind, self.video_id);
        self.events
            .emit(event_builders::action_committed(&self.video_id, kind))
            .await;
    }

    async fn rolled_back(&self, kind: ActionKind, error: &VidtubeSDKError) {
        warn!("↩️ {:?} 失败已回滚: video_id={}, error={}", kind, self.video_id, error);
        let message = error.user_message(kind.fallback_message());
        self.events
            .emit(event_builders::action_rolled_back(&self.video_id, kind, message))
            .await;
    }
}
