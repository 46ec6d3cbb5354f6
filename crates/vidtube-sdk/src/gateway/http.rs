use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use urlencoding::encode;

use super::InteractionGateway;
use crate::error::{Result, VidtubeSDKError};
use crate::http_client::{envelope_data, ApiHttpClient, AuthRequirement};
use crate::models::{
    normalize_comment, normalize_comment_list, normalize_like_outcome,
    normalize_video_detail_reactions, normalize_video_page, normalize_video_reactions, Comment,
    LikeOutcome, VideoPage, VideoQuery, VideoReaction, VideoReactions,
};

/// 基于 REST 的互动网关
#[derive(Clone)]
pub struct HttpInteractionGateway {
    http: ApiHttpClient,
}

impl HttpInteractionGateway {
    pub fn new(http: ApiHttpClient) -> Self {
        Self { http }
    }

    /// 取出 `data` 并确保非空
    fn required_data(payload: Value, what: &str) -> Result<Value> {
        match envelope_data(payload) {
            Value::Null => Err(VidtubeSDKError::InvalidData(format!("{} 响应缺少 data", what))),
            data => Ok(data),
        }
    }

    fn viewer_id(&self) -> Option<String> {
        self.http.session().user().map(|user| user.id)
    }
}

/// 拼接路径，ID 作为单个路径段编码
fn resource_path(prefix: &str, id: &str, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => format!("{}/{}/{}", prefix, encode(id), suffix),
        None => format!("{}/{}", prefix, encode(id)),
    }
}

#[async_trait]
impl InteractionGateway for HttpInteractionGateway {
    async fn fetch_comments(&self, video_id: &str) -> Vec<Comment> {
        let path = resource_path("/comments/video", video_id, None);
        match self
            .http
            .request(Method::GET, &path, None, AuthRequirement::Optional)
            .await
        {
            Ok(payload) => {
                let comments = normalize_comment_list(&envelope_data(payload), video_id);
                debug!("📥 拉取评论完成: video_id={}, count={}", video_id, comments.len());
                comments
            }
            Err(e) => {
                warn!("⚠️ 拉取评论失败，按空列表处理: video_id={}, error={}", video_id, e);
                Vec::new()
            }
        }
    }

    async fn create_comment(&self, video_id: &str, body: &str) -> Result<Comment> {
        let request = json!({ "videoId": video_id, "text": body });
        let payload = self
            .http
            .request(Method::POST, "/comments", Some(&request), AuthRequirement::Required)
            .await?;

        let comment = normalize_comment(&Self::required_data(payload, "发表评论")?, video_id)?;
        info!("✅ 评论已发表: video_id={}, comment_id={}", video_id, comment.id);
        Ok(comment)
    }

    async fn update_comment(&self, comment_id: &str, body: &str) -> Result<Comment> {
        let path = resource_path("/comments", comment_id, None);
        let request = json!({ "text": body });
        let payload = self
            .http
            .request(Method::PUT, &path, Some(&request), AuthRequirement::Required)
            .await?;

        let data = Self::required_data(payload, "修改评论")?;
        let video_id = data
            .get("videoId")
            .and_then(crate::models::value_to_id)
            .unwrap_or_default();
        let comment = normalize_comment(&data, &video_id)?;
        info!("✅ 评论已修改: comment_id={}", comment_id);
        Ok(comment)
    }

    async fn delete_comment(&self, comment_id: &str) -> Result<()> {
        let path = resource_path("/comments", comment_id, None);
        self.http
            .request(Method::DELETE, &path, None, AuthRequirement::Required)
            .await?;
        info!("🗑️ 评论已删除: comment_id={}", comment_id);
        Ok(())
    }

    async fn like_comment(&self, comment_id: &str) -> Result<LikeOutcome> {
        let path = resource_path("/comments", comment_id, Some("like"));
        let payload = self
            .http
            .request(Method::POST, &path, None, AuthRequirement::Required)
            .await?;

        normalize_like_outcome(&Self::required_data(payload, "评论点赞")?)
    }

    async fn react_to_video(
        &self,
        video_id: &str,
        reaction: VideoReaction,
    ) -> Result<Option<VideoReactions>> {
        let path = resource_path("/videos", video_id, Some(reaction.path_segment()));
        let payload = self
            .http
            .request(Method::POST, &path, None, AuthRequirement::Required)
            .await?;

        Ok(normalize_video_reactions(&envelope_data(payload)))
    }

    async fn fetch_video_reactions(&self, video_id: &str) -> Option<VideoReactions> {
        let path = resource_path("/videos", video_id, None);
        match self
            .http
            .request(Method::GET, &path, None, AuthRequirement::Optional)
            .await
        {
            Ok(payload) => {
                let data = envelope_data(payload);
                let detail = data.get("video").unwrap_or(&data);
                if !detail.is_object() {
                    warn!("⚠️ 视频详情不是 JSON 对象: video_id={}", video_id);
                    return None;
                }
                let reactions =
                    normalize_video_detail_reactions(detail, self.viewer_id().as_deref());
                debug!("📥 视频表态: video_id={}, {:?}", video_id, reactions);
                Some(reactions)
            }
            Err(e) => {
                warn!("⚠️ 读取视频详情失败，表态保持默认: video_id={}, error={}", video_id, e);
                None
            }
        }
    }

    async fn list_videos(&self, query: &VideoQuery) -> Result<VideoPage> {
        let payload = self
            .http
            .request_with_query(
                Method::GET,
                "/videos",
                &query.to_pairs(),
                None,
                AuthRequirement::Optional,
            )
            .await?;

        let page = normalize_video_page(&envelope_data(payload), self.viewer_id().as_deref());
        debug!("📥 视频列表: count={}, has_more={}", page.videos.len(), page.has_more);
        Ok(page)
    }

    async fn search_videos(&self, keyword: &str, filters: &VideoQuery) -> Result<VideoPage> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(VidtubeSDKError::Validation("Search query is required".to_string()));
        }

        let mut pairs = vec![("q", keyword.to_string())];
        pairs.extend(filters.to_pairs());
        let payload = self
            .http
            .request_with_query(
                Method::GET,
                "/videos/search",
                &pairs,
                None,
                AuthRequirement::Optional,
            )
            .await?;

        let mut page = normalize_video_page(&envelope_data(payload), self.viewer_id().as_deref());
        // 搜索结果不分页
        page.has_more = false;
        info!("🔍 搜索视频: q={}, count={}", keyword, page.videos.len());
        Ok(page)
    }
}
