//! 本地存储
//!
//! 只持久化登录会话；评论缓存是视图级的内存状态，不落盘。

pub mod kv;

pub use kv::KvStore;
