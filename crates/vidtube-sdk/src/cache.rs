//! 本地评论缓存
//!
//! 保存当前视图的评论列表（存储顺序），排序视图按需计算且不改变存储顺序。
//!
//! 不变量：
//! - 不会出现两条相同服务端 ID 的评论
//! - 临时评论被确认后，临时条目与确认后的条目不会同时存在

use std::collections::HashSet;
use tracing::debug;

use crate::models::{Comment, CommentId, LikeOutcome, SortKey};

#[derive(Debug, Default, Clone)]
pub struct CommentCache {
    entries: Vec<Comment>,
    /// `replace_all` 次数
    generation: u64,
}

impl CommentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 整体替换（拉取/轮询后）
    ///
    /// 不做合并：新列表中没有的本地条目（包括未确认的临时评论）全部丢弃。
    /// 服务端列表里重复的 ID 只保留第一条。
    pub fn replace_all(&mut self, comments: Vec<Comment>) {
        let mut seen = HashSet::with_capacity(comments.len());
        let before = comments.len();
        let entries: Vec<Comment> = comments
            .into_iter()
            .filter(|c| seen.insert(c.id.clone()))
            .collect();

        if entries.len() != before {
            debug!("replace_all 丢弃了 {} 条重复评论", before - entries.len());
        }

        self.entries = entries;
        self.generation += 1;
    }

    /// 插入乐观评论到最前面（与排序方式无关）
    pub fn insert_optimistic(&mut self, comment: Comment) -> CommentId {
        let id = comment.id.clone();
        self.entries.insert(0, comment);
        id
    }

    /// 用服务端确认的评论替换临时条目
    ///
    /// 按临时 ID 匹配而不是按下标。临时条目已被轮询丢弃时，确认结果插到最前面；
    /// 如果该服务端 ID 已经在缓存中（轮询先拿到了它），只删除临时条目。
    /// 返回 true 表示原地替换成功。
    pub fn confirm(&mut self, temp_id: &CommentId, confirmed: Comment) -> bool {
        let temp_pos = self.position(temp_id);
        let existing_pos = self
            .position(&confirmed.id)
            .filter(|pos| Some(*pos) != temp_pos);

        match (temp_pos, existing_pos) {
            (Some(pos), None) => {
                self.entries[pos] = confirmed;
                true
            }
            (Some(pos), Some(_)) => {
                self.entries.remove(pos);
                false
            }
            (None, None) => {
                self.entries.insert(0, confirmed);
                false
            }
            (None, Some(_)) => false,
        }
    }

    /// 丢弃临时评论（提交失败回滚）
    pub fn discard_temporary(&mut self, temp_id: &CommentId) -> bool {
        match self.position(temp_id) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// 原地修改评论内容并标记已编辑
    ///
    /// 返回修改前的 (内容, 已编辑标记)；ID 不存在时为 no-op。
    pub fn apply_edit(&mut self, id: &CommentId, body: &str) -> Option<(String, bool)> {
        let entry = self.entries.iter_mut().find(|c| &c.id == id)?;
        let previous = (std::mem::replace(&mut entry.body, body.to_string()), entry.edited);
        entry.edited = true;
        Some(previous)
    }

    /// 恢复编辑前的内容
    pub fn restore_edit(&mut self, id: &CommentId, body: String, edited: bool) -> bool {
        match self.entries.iter_mut().find(|c| &c.id == id) {
            Some(entry) => {
                entry.body = body;
                entry.edited = edited;
                true
            }
            None => false,
        }
    }

    /// 按 ID 删除，返回原位置和条目；不存在时为 no-op
    pub fn remove(&mut self, id: &CommentId) -> Option<(usize, Comment)> {
        let pos = self.position(id)?;
        Some((pos, self.entries.remove(pos)))
    }

    /// 把条目放回原位置（位置超出时追加到末尾）；ID 已存在时为 no-op
    pub fn restore_at(&mut self, pos: usize, comment: Comment) -> bool {
        if self.position(&comment.id).is_some() {
            return false;
        }
        let pos = pos.min(self.entries.len());
        self.entries.insert(pos, comment);
        true
    }

    /// 用服务端返回的新版本整体替换条目
    pub fn replace_entry(&mut self, id: &CommentId, comment: Comment) -> bool {
        match self.entries.iter_mut().find(|c| &c.id == id) {
            Some(entry) => {
                *entry = comment;
                true
            }
            None => false,
        }
    }

    /// 设置点赞状态
    pub fn set_like(&mut self, id: &CommentId, outcome: LikeOutcome) -> bool {
        match self.entries.iter_mut().find(|c| &c.id == id) {
            Some(entry) => {
                entry.like_count = outcome.like_count;
                entry.is_liked = outcome.is_liked;
                true
            }
            None => false,
        }
    }

    /// 切换点赞（乐观），返回切换前的状态
    pub fn toggle_like(&mut self, id: &CommentId) -> Option<LikeOutcome> {
        let entry = self.entries.iter_mut().find(|c| &c.id == id)?;
        let previous = LikeOutcome {
            like_count: entry.like_count,
            is_liked: entry.is_liked,
        };
        if entry.is_liked {
            entry.is_liked = false;
            entry.like_count = entry.like_count.saturating_sub(1);
        } else {
            entry.is_liked = true;
            entry.like_count += 1;
        }
        Some(previous)
    }

    pub fn get(&self, id: &CommentId) -> Option<&Comment> {
        self.entries.iter().find(|c| &c.id == id)
    }

    pub fn position(&self, id: &CommentId) -> Option<usize> {
        self.entries.iter().position(|c| &c.id == id)
    }

    /// 排序视图（纯函数，不改变存储顺序）
    pub fn sorted_view(&self, key: SortKey) -> Vec<Comment> {
        let mut view = self.entries.clone();
        match key {
            SortKey::NewestFirst => view.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortKey::OldestFirst => view.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            SortKey::MostLiked => view.sort_by(|a, b| {
                b.like_count
                    .cmp(&a.like_count)
                    .then_with(|| b.created_at.cmp(&a.created_at))
            }),
        }
        view
    }

    /// 存储顺序的快照
    pub fn snapshot(&self) -> Vec<Comment> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
