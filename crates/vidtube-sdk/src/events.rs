//! 事件系统模块
//!
//! 功能包括：
//! - 会话事件（登录、登出、强制登出）
//! - 评论刷新事件（轮询/手动刷新）
//! - 乐观更新的提交与回滚事件
//! - 事件广播和订阅机制

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::controller::ActionKind;

/// 会话结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEndReason {
    /// 用户主动登出
    Logout,
    /// 服务端返回 401/403
    Unauthorized,
    /// 本地持久化数据损坏，启动时被清理
    Corrupted,
}

/// SDK 事件类型
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SDKEvent {
    /// 登录/注册成功或启动时恢复会话
    SessionEstablished {
        user_id: String,
        restored: bool,
        timestamp: u64,
    },
    /// 会话被销毁
    SessionCleared {
        reason: SessionEndReason,
        timestamp: u64,
    },
    /// 任意请求收到 401/403 后的全局强制登出
    ForcedLogout {
        status: u16,
        timestamp: u64,
    },
    /// 评论列表被服务端数据整体替换
    CommentsRefreshed {
        video_id: String,
        count: usize,
        timestamp: u64,
    },
    /// 轮询 tick 因上一次拉取未返回被跳过
    PollTickSkipped {
        video_id: String,
        timestamp: u64,
    },
    /// 乐观更新已被服务端确认
    ActionCommitted {
        video_id: String,
        action: ActionKind,
        timestamp: u64,
    },
    /// 乐观更新失败并已回滚；message 为可直接展示的提示
    ActionRolledBack {
        video_id: String,
        action: ActionKind,
        message: String,
        timestamp: u64,
    },
}

impl SDKEvent {
    /// 获取事件类型
    pub fn event_type(&self) -> &'static str {
        match self {
            SDKEvent::SessionEstablished { .. } => "session_established",
            SDKEvent::SessionCleared { .. } => "session_cleared",
            SDKEvent::ForcedLogout { .. } => "forced_logout",
            SDKEvent::CommentsRefreshed { .. } => "comments_refreshed",
            SDKEvent::PollTickSkipped { .. } => "poll_tick_skipped",
            SDKEvent::ActionCommitted { .. } => "action_committed",
            SDKEvent::ActionRolledBack { .. } => "action_rolled_back",
        }
    }

    /// 获取事件相关的视频ID
    pub fn video_id(&self) -> Option<&str> {
        match self {
            SDKEvent::CommentsRefreshed { video_id, .. }
            | SDKEvent::PollTickSkipped { video_id, .. }
            | SDKEvent::ActionCommitted { video_id, .. }
            | SDKEvent::ActionRolledBack { video_id, .. } => Some(video_id.as_str()),
            _ => None,
        }
    }

    /// 获取事件时间戳（毫秒）
    pub fn timestamp(&self) -> u64 {
        match self {
            SDKEvent::SessionEstablished { timestamp, .. }
            | SDKEvent::SessionCleared { timestamp, .. }
            | SDKEvent::ForcedLogout { timestamp, .. }
            | SDKEvent::CommentsRefreshed { timestamp, .. }
            | SDKEvent::PollTickSkipped { timestamp, .. }
            | SDKEvent::ActionCommitted { timestamp, .. }
            | SDKEvent::ActionRolledBack { timestamp, .. } => *timestamp,
        }
    }
}

/// 当前毫秒时间戳
pub(crate) fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// 事件过滤器
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// 事件类型过滤器
    pub event_types: Option<Vec<String>>,
    /// 视频ID过滤器
    pub video_ids: Option<Vec<String>>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_types(mut self, event_types: Vec<String>) -> Self {
        self.event_types = Some(event_types);
        self
    }

    pub fn with_video_ids(mut self, video_ids: Vec<String>) -> Self {
        self.video_ids = Some(video_ids);
        self
    }

    /// 检查事件是否匹配过滤器
    pub fn matches(&self, event: &SDKEvent) -> bool {
        if let Some(ref types) = self.event_types {
            if !types.iter().any(|t| t == event.event_type()) {
                return false;
            }
        }

        if let Some(ref video_ids) = self.video_ids {
            match event.video_id() {
                Some(video_id) => {
                    if !video_ids.iter().any(|v| v == video_id) {
                        return false;
                    }
                }
                None => return false, // 事件没有视频ID但过滤器要求有
            }
        }

        true
    }
}

/// 事件监听器类型
pub type EventListener = Box<dyn Fn(&SDKEvent) + Send + Sync>;

/// 事件统计信息
#[derive(Debug, Clone, Default)]
pub struct EventStats {
    /// 总事件数
    pub total_events: u64,
    /// 按类型分组的事件数
    pub events_by_type: HashMap<String, u64>,
    /// 监听器数量
    pub listener_count: usize,
    /// 最后事件时间
    pub last_event_time: Option<u64>,
}

/// 事件管理器
pub struct EventManager {
    /// 广播发送器
    sender: broadcast::Sender<SDKEvent>,
    /// 事件监听器映射（"*" 表示监听全部）
    listeners: Arc<tokio::sync::RwLock<HashMap<String, Vec<EventListener>>>>,
    /// 事件统计
    stats: Arc<tokio::sync::RwLock<EventStats>>,
}

impl EventManager {
    /// 创建新的事件管理器
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));

        Self {
            sender,
            listeners: Arc::new(tokio::sync::RwLock::new(HashMap::new())),
            stats: Arc::new(tokio::sync::RwLock::new(EventStats::default())),
        }
    }

    /// 发布事件
    pub async fn emit(&self, event: SDKEvent) {
        debug!("Emitting event: {}", event.event_type());

        {
            let mut stats = self.stats.write().await;
            stats.total_events += 1;
            *stats.events_by_type.entry(event.event_type().to_string()).or_insert(0) += 1;
            stats.last_event_time = Some(event.timestamp());
        }

        // 无订阅者时 send 会失败，属正常场景（无 UI 的客户端），仅打 debug
        if let Err(e) = self.sender.send(event.clone()) {
            debug!("Failed to broadcast event (no active receivers): {}", e);
        }

        let listeners = self.listeners.read().await;
        if let Some(event_listeners) = listeners.get(event.event_type()) {
            for listener in event_listeners {
                listener(&event);
            }
        }
        if let Some(general_listeners) = listeners.get("*") {
            for listener in general_listeners {
                listener(&event);
            }
        }
    }

    /// 订阅全部事件
    pub fn subscribe(&self) -> broadcast::Receiver<SDKEvent> {
        self.sender.subscribe()
    }

    /// 订阅特定类型的事件
    pub fn subscribe_filtered(&self, filter: EventFilter) -> FilteredEventReceiver {
        FilteredEventReceiver::new(self.sender.subscribe(), filter)
    }

    /// 添加事件监听器
    pub async fn add_listener<F>(&self, event_type: &str, listener: F)
    where
        F: Fn(&SDKEvent) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.write().await;
        listeners
            .entry(event_type.to_string())
            .or_insert_with(Vec::new)
            .push(Box::new(listener));

        let mut stats = self.stats.write().await;
        stats.listener_count = listeners.values().map(|v| v.len()).sum();

        info!("Added listener for event type: {}", event_type);
    }

    /// 移除所有监听器
    pub async fn clear_listeners(&self) {
        let mut listeners = self.listeners.write().await;
        listeners.clear();

        let mut stats = self.stats.write().await;
        stats.listener_count = 0;
    }

    /// 获取事件统计
    pub async fn get_stats(&self) -> EventStats {
        self.stats.read().await.clone()
    }

    /// 获取活跃订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// 过滤事件接收器
pub struct FilteredEventReceiver {
    receiver: broadcast::Receiver<SDKEvent>,
    filter: EventFilter,
}

impl FilteredEventReceiver {
    pub fn new(receiver: broadcast::Receiver<SDKEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    /// 接收下一个匹配的事件
    pub async fn recv(&mut self) -> Result<SDKEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }
}

/// 事件构建器
pub mod event_builders {
    use super::*;

    pub fn comments_refreshed(video_id: &str, count: usize) -> SDKEvent {
        SDKEvent::CommentsRefreshed {
            video_id: video_id.to_string(),
            count,
            timestamp: now_millis(),
        }
    }

    pub fn poll_tick_skipped(video_id: &str) -> SDKEvent {
        SDKEvent::PollTickSkipped {
            video_id: video_id.to_string(),
            timestamp: now_millis(),
        }
    }

    pub fn action_committed(video_id: &str, action: ActionKind) -> SDKEvent {
        SDKEvent::ActionCommitted {
            video_id: video_id.to_string(),
            action,
            timestamp: now_millis(),
        }
    }

    pub fn action_rolled_back(video_id: &str, action: ActionKind, message: String) -> SDKEvent {
        SDKEvent::ActionRolledBack {
            video_id: video_id.to_string(),
            action,
            message,
            timestamp: now_millis(),
        }
    }

    pub fn session_established(user_id: &str, restored: bool) -> SDKEvent {
        SDKEvent::SessionEstablished {
            user_id: user_id.to_string(),
            restored,
            timestamp: now_millis(),
        }
    }

    pub fn session_cleared(reason: SessionEndReason) -> SDKEvent {
        SDKEvent::SessionCleared {
            reason,
            timestamp: now_millis(),
        }
    }

    pub fn forced_logout(status: u16) -> SDKEvent {
        SDKEvent::ForcedLogout {
            status,
            timestamp: now_millis(),
        }
    }
}
