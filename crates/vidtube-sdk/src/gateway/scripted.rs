//! 脚本化的内存网关，供控制器/轮询器/视图的单元测试使用

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::InteractionGateway;
use crate::error::{Result, VidtubeSDKError};
use crate::models::{
    Comment, LikeOutcome, VideoPage, VideoQuery, VideoReaction, VideoReactions,
};

#[derive(Default)]
pub(crate) struct ScriptedGateway {
    /// `fetch_comments` 返回的服务端列表
    pub server_comments: Mutex<Vec<Comment>>,
    pub create_results: Mutex<VecDeque<Result<Comment>>>,
    pub update_results: Mutex<VecDeque<Result<Comment>>>,
    pub delete_results: Mutex<VecDeque<Result<()>>>,
    pub like_results: Mutex<VecDeque<Result<LikeOutcome>>>,
    pub react_results: Mutex<VecDeque<Result<Option<VideoReactions>>>>,
    /// 视频详情里的表态，None 表示读取失败
    pub video_reactions: Mutex<Option<VideoReactions>>,
    pub browse_results: Mutex<VecDeque<Result<VideoPage>>>,
    pub fetch_delay: Mutex<Option<Duration>>,
    pub fetch_calls: AtomicUsize,
    pub max_fetch_in_flight: AtomicUsize,
    fetch_in_flight: AtomicUsize,
    writes_gated: AtomicBool,
    gate: Notify,
}

impl ScriptedGateway {
    pub fn with_comments(comments: Vec<Comment>) -> Self {
        let gateway = Self::default();
        *gateway.server_comments.lock() = comments;
        gateway
    }

    /// 之后的写操作都会挂起，直到 [`Self::release`]
    pub fn gate_writes(&self) {
        self.writes_gated.store(true, Ordering::SeqCst);
    }

    /// 放行一个挂起的写操作
    pub fn release(&self) {
        self.gate.notify_one();
    }

    async fn wait_gate(&self) {
        if self.writes_gated.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
    }

    fn next<T>(queue: &Mutex<VecDeque<Result<T>>>, what: &str) -> Result<T> {
        queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(VidtubeSDKError::Other(format!("unscripted {}", what))))
    }
}

#[async_trait]
impl InteractionGateway for ScriptedGateway {
    async fn fetch_comments(&self, _video_id: &str) -> Vec<Comment> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.fetch_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_fetch_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.fetch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.fetch_in_flight.fetch_sub(1, Ordering::SeqCst);
        self.server_comments.lock().clone()
    }

    async fn create_comment(&self, _video_id: &str, _body: &str) -> Result<Comment> {
        self.wait_gate().await;
        Self::next(&self.create_results, "create")
    }

    async fn update_comment(&self, _comment_id: &str, _body: &str) -> Result<Comment> {
        self.wait_gate().await;
        Self::next(&self.update_results, "update")
    }

    async fn delete_comment(&self, _comment_id: &str) -> Result<()> {
        self.wait_gate().await;
        Self::next(&self.delete_results, "delete")
    }

    async fn like_comment(&self, _comment_id: &str) -> Result<LikeOutcome> {
        self.wait_gate().await;
        Self::next(&self.like_results, "like")
    }

    async fn react_to_video(
        &self,
        _video_id: &str,
        _reaction: VideoReaction,
    ) -> Result<Option<VideoReactions>> {
        self.wait_gate().await;
        Self::next(&self.react_results, "react")
    }

    async fn fetch_video_reactions(&self, _video_id: &str) -> Option<VideoReactions> {
        *self.video_reactions.lock()
    }

    async fn list_videos(&self, _query: &VideoQuery) -> Result<VideoPage> {
        Self::next(&self.browse_results, "list_videos")
    }

    async fn search_videos(&self, _keyword: &str, _filters: &VideoQuery) -> Result<VideoPage> {
        Self::next(&self.browse_results, "search_videos")
    }
}
