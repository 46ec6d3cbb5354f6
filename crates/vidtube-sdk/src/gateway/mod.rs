//! 远程互动网关
//!
//! 无状态的评论/表态 CRUD 调用集合，外加视频浏览/搜索只读接口。
//! 控制器、轮询器与视图只依赖 [`InteractionGateway`]，生产环境使用 [`HttpInteractionGateway`]。

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    Comment, LikeOutcome, VideoPage, VideoQuery, VideoReaction, VideoReactions,
};

pub mod http;
#[cfg(test)]
pub(crate) mod scripted;

pub use http::HttpInteractionGateway;

#[async_trait]
pub trait InteractionGateway: Send + Sync {
    /// 拉取视频的评论列表
    ///
    /// 读操作永不失败：传输错误、非 2xx、`success:false` 都降级为空列表。
    async fn fetch_comments(&self, video_id: &str) -> Vec<Comment>;

    /// 发表评论，返回带服务端 ID 的评论
    async fn create_comment(&self, video_id: &str, body: &str) -> Result<Comment>;

    /// 修改评论内容（仅作者）
    async fn update_comment(&self, comment_id: &str, body: &str) -> Result<Comment>;

    /// 删除评论（仅作者）
    async fn delete_comment(&self, comment_id: &str) -> Result<()>;

    /// 切换评论点赞
    async fn like_comment(&self, comment_id: &str) -> Result<LikeOutcome>;

    /// 点赞/点踩视频；响应里带计数时返回最新计数
    async fn react_to_video(
        &self,
        video_id: &str,
        reaction: VideoReaction,
    ) -> Result<Option<VideoReactions>>;

    /// 读取视频详情中的表态计数，失败时降级为 None
    async fn fetch_video_reactions(&self, video_id: &str) -> Option<VideoReactions>;

    /// 分页浏览视频
    async fn list_videos(&self, query: &VideoQuery) -> Result<VideoPage>;

    /// 按关键字搜索视频，`filters` 与浏览参数相同
    async fn search_videos(&self, keyword: &str, filters: &VideoQuery) -> Result<VideoPage>;
}
