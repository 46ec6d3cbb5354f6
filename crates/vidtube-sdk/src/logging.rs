//! 日志初始化
//!
//! SDK 内部只使用 `tracing` 宏；宿主未安装 subscriber 时可调用本模块安装一个默认的
//! `fmt` subscriber。重复调用是安全的。

use tracing::Level;

/// 安装默认 tracing subscriber
///
/// 返回 true 表示本次调用完成了安装，false 表示宿主已经安装过 subscriber。
pub fn init_tracing(debug_mode: bool) -> bool {
    let level = if debug_mode { Level::DEBUG } else { Level::INFO };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let _ = init_tracing(true);
        // 第二次安装必然失败但不能 panic
        assert!(!init_tracing(false));
    }
}
