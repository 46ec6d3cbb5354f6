//! 领域模型与服务端数据归一化
//!
//! 后端返回的评论/用户对象形状并不统一（author 有时是对象有时是 ID 字符串、
//! `_id` 与 `id` 混用、`likes` 可能是数字也可能是点赞用户数组）。所有形状差异都在
//! 本模块收敛成规范结构，下游组件不需要再做分支判断。

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

use crate::error::{Result, VidtubeSDKError};

/// 作者缺失显示名时的占位
pub const ANONYMOUS_NAME: &str = "Anonymous";

/// 评论 ID
///
/// 服务端确认前使用客户端生成的临时 ID，确认后替换为服务端 ID。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommentId {
    Temporary(Uuid),
    Permanent(String),
}

impl CommentId {
    pub fn new_temporary() -> Self {
        CommentId::Temporary(Uuid::new_v4())
    }

    pub fn permanent<S: Into<String>>(id: S) -> Self {
        CommentId::Permanent(id.into())
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, CommentId::Temporary(_))
    }

    pub fn as_permanent(&self) -> Option<&str> {
        match self {
            CommentId::Permanent(id) => Some(id.as_str()),
            CommentId::Temporary(_) => None,
        }
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommentId::Temporary(uuid) => write!(f, "tmp-{}", uuid),
            CommentId::Permanent(id) => write!(f, "{}", id),
        }
    }
}

/// 评论作者（冗余存储，避免渲染时再查用户）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentAuthor {
    pub id: String,
    pub display_name: String,
    pub avatar: Option<String>,
}

impl From<&UserProfile> for CommentAuthor {
    fn from(user: &UserProfile) -> Self {
        Self {
            id: user.id.clone(),
            display_name: user.username.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

/// 评论
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub video_id: String,
    pub author: CommentAuthor,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub like_count: u64,
    /// 当前用户是否点过赞
    pub is_liked: bool,
    pub edited: bool,
}

impl Comment {
    /// 构造一条乐观评论（临时 ID，创建时间为当前时间）
    pub fn optimistic(video_id: &str, author: CommentAuthor, body: &str) -> Self {
        Self {
            id: CommentId::new_temporary(),
            video_id: video_id.to_string(),
            author,
            body: body.to_string(),
            created_at: Utc::now(),
            like_count: 0,
            is_liked: false,
            edited: false,
        }
    }

    pub fn permanent_id(&self) -> Option<&str> {
        self.id.as_permanent()
    }
}

/// 评论排序方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortKey {
    #[default]
    NewestFirst,
    OldestFirst,
    /// 点赞数降序，相同点赞数按最新优先
    MostLiked,
}

impl FromStr for SortKey {
    type Err = VidtubeSDKError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" | "newest_first" => Ok(SortKey::NewestFirst),
            "oldest" | "oldest_first" => Ok(SortKey::OldestFirst),
            "popular" | "most_liked" | "top" => Ok(SortKey::MostLiked),
            other => Err(VidtubeSDKError::Validation(format!("unknown sort key: {}", other))),
        }
    }
}

/// 评论点赞结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeOutcome {
    pub like_count: u64,
    pub is_liked: bool,
}

/// 用户资料
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
}

/// 登录会话
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: UserProfile,
    pub token: String,
}

/// 视频表态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoReaction {
    Like,
    Dislike,
}

impl VideoReaction {
    pub fn path_segment(&self) -> &'static str {
        match self {
            VideoReaction::Like => "like",
            VideoReaction::Dislike => "dislike",
        }
    }
}

/// 当前用户对视频的表态及计数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoReactions {
    pub liked: bool,
    pub disliked: bool,
    pub like_count: u64,
    pub dislike_count: u64,
}

impl VideoReactions {
    /// 切换表态：点赞与点踩互斥，重复点击取消
    pub fn toggle(&mut self, reaction: VideoReaction) {
        match reaction {
            VideoReaction::Like => {
                if self.liked {
                    self.liked = false;
                    self.like_count = self.like_count.saturating_sub(1);
                } else {
                    self.liked = true;
                    self.like_count += 1;
                    if self.disliked {
                        self.disliked = false;
                        self.dislike_count = self.dislike_count.saturating_sub(1);
                    }
                }
            }
            VideoReaction::Dislike => {
                if self.disliked {
                    self.disliked = false;
                    self.dislike_count = self.dislike_count.saturating_sub(1);
                } else {
                    self.disliked = true;
                    self.dislike_count += 1;
                    if self.liked {
                        self.liked = false;
                        self.like_count = self.like_count.saturating_sub(1);
                    }
                }
            }
        }
    }
}

/// 未知频道名占位
pub const UNKNOWN_CHANNEL: &str = "Unknown Channel";

/// 视频列表条目（浏览/搜索只读）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub uploader: String,
    pub uploader_avatar: Option<String>,
    pub thumbnail_url: Option<String>,
    pub category: Option<String>,
    pub views: u64,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub reactions: VideoReactions,
}

/// 一页视频列表
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoPage {
    pub videos: Vec<VideoSummary>,
    pub has_more: bool,
}

/// 视频列表查询参数，未设置的字段不发送
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<String>,
    pub sort: Option<String>,
}

impl VideoQuery {
    pub fn page(page: u32) -> Self {
        Self {
            page: Some(page),
            ..Self::default()
        }
    }

    pub(crate) fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(category) = self.category.as_deref().filter(|c| !c.trim().is_empty()) {
            pairs.push(("category", category.trim().to_string()));
        }
        if let Some(sort) = self.sort.as_deref().filter(|s| !s.trim().is_empty()) {
            pairs.push(("sort", sort.trim().to_string()));
        }
        pairs
    }
}

// ========== 归一化 ==========

/// 从 JSON 值中提取 ID：字符串、数字，或带 `_id`/`id` 的对象
pub(crate) fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map
            .get("_id")
            .and_then(value_to_id)
            .or_else(|| map.get("id").and_then(value_to_id)),
        _ => None,
    }
}

fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| value.get(*k))
        .filter_map(Value::as_str)
        .find(|s| !s.trim().is_empty())
}

fn bool_field(value: &Value, keys: &[&str]) -> Option<bool> {
    keys.iter().filter_map(|k| value.get(*k)).find_map(Value::as_bool)
}

/// 计数字段：数字直接使用，数组取长度（部分接口返回点赞用户列表）
fn count_field(value: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().filter_map(|k| value.get(*k)).find_map(|v| match v {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::Array(items) => Some(items.len() as u64),
        _ => None,
    })
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

fn normalize_author(raw: &Value) -> CommentAuthor {
    let author = raw.get("author");

    let (id, display_name, avatar) = match author {
        Some(obj @ Value::Object(_)) => (
            value_to_id(obj),
            str_field(obj, &["username", "name"]).map(str::to_string),
            str_field(obj, &["avatar"]).map(str::to_string),
        ),
        Some(other) => (value_to_id(other), None, None),
        None => (None, None, None),
    };

    CommentAuthor {
        id: id
            .or_else(|| raw.get("userId").and_then(value_to_id))
            .unwrap_or_default(),
        display_name: display_name
            .or_else(|| str_field(raw, &["username"]).map(str::to_string))
            .unwrap_or_else(|| ANONYMOUS_NAME.to_string()),
        avatar: avatar.or_else(|| str_field(raw, &["avatar", "userAvatar"]).map(str::to_string)),
    }
}

/// 把服务端评论对象归一化为 [`Comment`]
///
/// `video_id` 用于服务端未回传 videoId 的情况。
pub fn normalize_comment(raw: &Value, video_id: &str) -> Result<Comment> {
    if !raw.is_object() {
        return Err(VidtubeSDKError::InvalidData(format!("评论不是 JSON 对象: {}", raw)));
    }

    let id = raw
        .get("_id")
        .and_then(value_to_id)
        .or_else(|| raw.get("id").and_then(value_to_id))
        .ok_or_else(|| VidtubeSDKError::InvalidData("评论缺少 id".to_string()))?;

    let body = str_field(raw, &["text", "content"])
        .map(str::trim)
        .ok_or_else(|| VidtubeSDKError::InvalidData(format!("评论内容为空: id={}", id)))?
        .to_string();

    let created_at = ["createdAt", "timestamp"]
        .iter()
        .filter_map(|k| raw.get(*k))
        .find_map(parse_timestamp)
        .unwrap_or_else(Utc::now);

    Ok(Comment {
        id: CommentId::Permanent(id),
        video_id: raw
            .get("videoId")
            .and_then(value_to_id)
            .unwrap_or_else(|| video_id.to_string()),
        author: normalize_author(raw),
        body,
        created_at,
        like_count: count_field(raw, &["likeCount", "likes"]).unwrap_or(0),
        is_liked: bool_field(raw, &["isLiked"]).unwrap_or(false),
        edited: bool_field(raw, &["isEdited", "edited"]).unwrap_or(false),
    })
}

/// 归一化评论列表，无法识别的条目丢弃并记录日志
pub fn normalize_comment_list(raw: &Value, video_id: &str) -> Vec<Comment> {
    let Some(items) = raw.as_array() else {
        warn!("⚠️ 评论列表不是数组，按空列表处理: video_id={}", video_id);
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match normalize_comment(item, video_id) {
            Ok(comment) => Some(comment),
            Err(e) => {
                warn!("⚠️ 丢弃无法识别的评论: video_id={}, error={}", video_id, e);
                None
            }
        })
        .collect()
}

/// 归一化用户对象
pub fn normalize_user(raw: &Value) -> Result<UserProfile> {
    let id = value_to_id(raw)
        .or_else(|| raw.get("userId").and_then(value_to_id))
        .ok_or_else(|| VidtubeSDKError::InvalidData("用户缺少 id".to_string()))?;

    Ok(UserProfile {
        id,
        username: str_field(raw, &["username", "name"])
            .unwrap_or(ANONYMOUS_NAME)
            .to_string(),
        email: str_field(raw, &["email"]).unwrap_or_default().to_string(),
        avatar: str_field(raw, &["avatar"]).map(str::to_string),
    })
}

/// 归一化点赞结果 `{likeCount, isLiked}`
pub fn normalize_like_outcome(raw: &Value) -> Result<LikeOutcome> {
    let like_count = count_field(raw, &["likeCount", "likes"])
        .ok_or_else(|| VidtubeSDKError::InvalidData("点赞结果缺少 likeCount".to_string()))?;

    Ok(LikeOutcome {
        like_count,
        is_liked: bool_field(raw, &["isLiked", "liked"]).unwrap_or(false),
    })
}

/// 归一化视频表态结果；响应里没有计数时返回 None
pub fn normalize_video_reactions(raw: &Value) -> Option<VideoReactions> {
    let like_count = count_field(raw, &["likeCount", "likes"]);
    let dislike_count = count_field(raw, &["dislikeCount", "dislikes"]);
    if like_count.is_none() && dislike_count.is_none() {
        return None;
    }

    Some(VideoReactions {
        liked: bool_field(raw, &["isLiked", "liked"]).unwrap_or(false),
        disliked: bool_field(raw, &["isDisliked", "disliked"]).unwrap_or(false),
        like_count: like_count.unwrap_or(0),
        dislike_count: dislike_count.unwrap_or(0),
    })
}

/// 视频详情里的表态
///
/// 计数缺失按 0。`likes`/`dislikes` 是用户 ID 数组时，按当前用户是否在列决定表态标记。
pub fn normalize_video_detail_reactions(raw: &Value, viewer_id: Option<&str>) -> VideoReactions {
    let mut reactions = normalize_video_reactions(raw).unwrap_or_default();
    if let Some(viewer) = viewer_id {
        let contains = |key: &str| {
            raw.get(key)
                .and_then(Value::as_array)
                .is_some_and(|ids| ids.iter().filter_map(value_to_id).any(|id| id == viewer))
        };
        reactions.liked |= contains("likes");
        reactions.disliked |= contains("dislikes");
    }
    reactions
}

/// 归一化视频对象；`uploader` 可能是对象也可能是名字字符串
pub fn normalize_video(raw: &Value, viewer_id: Option<&str>) -> Result<VideoSummary> {
    let id = ["_id", "id", "videoId"]
        .iter()
        .filter_map(|k| raw.get(*k))
        .find_map(value_to_id)
        .ok_or_else(|| VidtubeSDKError::InvalidData("视频缺少 id".to_string()))?;

    let (uploader, uploader_avatar) = match raw.get("uploader") {
        Some(obj @ Value::Object(_)) => (
            str_field(obj, &["username", "name"]).map(str::to_string),
            str_field(obj, &["avatar"]).map(str::to_string),
        ),
        Some(Value::String(name)) if !name.trim().is_empty() => (Some(name.trim().to_string()), None),
        _ => (None, None),
    };

    Ok(VideoSummary {
        id,
        title: str_field(raw, &["title"]).unwrap_or("Untitled Video").to_string(),
        description: str_field(raw, &["description"]).map(str::to_string),
        uploader: uploader
            .or_else(|| str_field(raw, &["channelName"]).map(str::to_string))
            .unwrap_or_else(|| UNKNOWN_CHANNEL.to_string()),
        uploader_avatar: uploader_avatar
            .or_else(|| str_field(raw, &["uploaderAvatar"]).map(str::to_string)),
        thumbnail_url: str_field(raw, &["thumbnailUrl", "thumbnail"]).map(str::to_string),
        category: str_field(raw, &["category"]).map(str::to_string),
        views: count_field(raw, &["views"]).unwrap_or(0),
        uploaded_at: ["uploadDate", "createdAt"]
            .iter()
            .filter_map(|k| raw.get(*k))
            .find_map(parse_timestamp),
        reactions: normalize_video_detail_reactions(raw, viewer_id),
    })
}

/// 归一化视频列表：`{videos, hasMore}`，或直接是数组
pub fn normalize_video_page(raw: &Value, viewer_id: Option<&str>) -> VideoPage {
    let (items, has_more) = match raw {
        Value::Array(items) => (items.as_slice(), false),
        Value::Object(_) => (
            raw.get("videos")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default(),
            bool_field(raw, &["hasMore"]).unwrap_or(false),
        ),
        _ => (&[][..], false),
    };

    let videos = items
        .iter()
        .filter_map(|item| match normalize_video(item, viewer_id) {
            Ok(video) => Some(video),
            Err(e) => {
                warn!("⚠️ 丢弃无法识别的视频: error={}", e);
                None
            }
        })
        .collect();

    VideoPage { videos, has_more }
}
