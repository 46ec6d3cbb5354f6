//! KV 存储模块 - 基于 sled 的键值存储
//!
//! 本模块提供：
//! - 按命名空间（Tree）隔离的键值存储
//! - JSON 序列化的读写
//! - 打开时的锁竞争重试（上一个进程/实例刚释放锁的情况）

use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Result, VidtubeSDKError};

/// KV 存储组件
#[derive(Debug, Clone)]
pub struct KvStore {
    base_path: PathBuf,
    db: Arc<Db>,
}

impl KvStore {
    /// 打开（或创建）`<base_path>/kv` 下的 KV 存储
    pub async fn open(base_path: &Path) -> Result<Self> {
        let base_path = base_path.to_path_buf();
        let kv_path = base_path.join("kv");

        tokio::fs::create_dir_all(&kv_path)
            .await
            .map_err(|e| VidtubeSDKError::KvStore(format!("创建 KV 存储目录失败: {}", e)))?;

        // 旧实例可能刚释放文件锁，带退避重试
        const MAX_OPEN_RETRIES: u32 = 5;
        const RETRY_DELAY_MS: u64 = 100;
        let mut last_err: Option<sled::Error> = None;
        for attempt in 0..MAX_OPEN_RETRIES {
            match sled::open(&kv_path) {
                Ok(db) => {
                    info!("✅ KV 存储已打开: {}", kv_path.display());
                    return Ok(Self {
                        base_path,
                        db: Arc::new(db),
                    });
                }
                Err(e) => {
                    let msg = e.to_string();
                    last_err = Some(e);
                    let is_lock = msg.contains("could not acquire lock")
                        || msg.contains("Resource temporarily unavailable")
                        || msg.contains("WouldBlock");
                    if is_lock && attempt + 1 < MAX_OPEN_RETRIES {
                        let delay_ms = RETRY_DELAY_MS * (1 << attempt);
                        debug!("KV 存储被占用，{}ms 后重试 (第 {} 次)", delay_ms, attempt + 1);
                        tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                    } else {
                        break;
                    }
                }
            }
        }

        Err(VidtubeSDKError::KvStore(
            last_err
                .map(|e| format!("打开 sled 数据库失败: {}", e))
                .unwrap_or_else(|| "打开 sled 数据库失败".to_string()),
        ))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn tree(&self, namespace: &str) -> Result<Tree> {
        self.db
            .open_tree(namespace)
            .map_err(|e| VidtubeSDKError::KvStore(format!("打开 Tree 失败 ({}): {}", namespace, e)))
    }

    /// 设置键值对
    pub async fn set<V>(&self, namespace: &str, key: &str, value: &V) -> Result<()>
    where
        V: Serialize,
    {
        let tree = self.tree(namespace)?;
        let value_bytes = serde_json::to_vec(value)
            .map_err(|e| VidtubeSDKError::Serialization(format!("序列化值失败: {}", e)))?;

        tree.insert(key, value_bytes)
            .map_err(|e| VidtubeSDKError::KvStore(format!("设置键值对失败: {}", e)))?;
        tree.flush_async()
            .await
            .map_err(|e| VidtubeSDKError::KvStore(format!("刷盘失败: {}", e)))?;

        Ok(())
    }

    /// 获取键值对
    pub async fn get<V>(&self, namespace: &str, key: &str) -> Result<Option<V>>
    where
        V: for<'de> Deserialize<'de>,
    {
        let tree = self.tree(namespace)?;
        let result = tree
            .get(key)
            .map_err(|e| VidtubeSDKError::KvStore(format!("获取键值对失败: {}", e)))?;

        match result {
            Some(value_bytes) => {
                let value = serde_json::from_slice(&value_bytes)
                    .map_err(|e| VidtubeSDKError::Serialization(format!("反序列化值失败: {}", e)))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// 删除键值对，返回是否存在
    pub async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        let tree = self.tree(namespace)?;
        let removed = tree
            .remove(key)
            .map_err(|e| VidtubeSDKError::KvStore(format!("删除键值对失败: {}", e)))?;
        tree.flush_async()
            .await
            .map_err(|e| VidtubeSDKError::KvStore(format!("刷盘失败: {}", e)))?;

        Ok(removed.is_some())
    }

    /// 检查键是否存在
    pub async fn exists(&self, namespace: &str, key: &str) -> Result<bool> {
        let tree = self.tree(namespace)?;
        tree.contains_key(key)
            .map_err(|e| VidtubeSDKError::KvStore(format!("检查键存在失败: {}", e)))
    }

    /// 清空命名空间
    pub async fn clear(&self, namespace: &str) -> Result<()> {
        let tree = self.tree(namespace)?;
        tree.clear()
            .map_err(|e| VidtubeSDKError::KvStore(format!("清空 Tree 失败: {}", e)))?;
        tree.flush_async()
            .await
            .map_err(|e| VidtubeSDKError::KvStore(format!("刷盘失败: {}", e)))?;
        Ok(())
    }
}
