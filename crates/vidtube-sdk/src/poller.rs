//! 轮询刷新器
//!
//! 视图挂载期间按固定周期重新拉取评论列表并整体替换缓存。
//! 同一时刻最多只有一个拉取在进行中，重叠的 tick 会被跳过并计数。
//! 卸载（取消令牌）后定时器停止，进行中的拉取结果直接丢弃。

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::CommentCache;
use crate::config::PollConfig;
use crate::events::{event_builders, EventManager};
use crate::gateway::InteractionGateway;

/// 轮询统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// 定时器触发次数
    pub ticks: u64,
    /// 成功替换缓存的次数
    pub applied: u64,
    /// 因上一次拉取未返回而跳过的次数
    pub skipped: u64,
}

/// 拉取占用标记，drop 时释放
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct PollShared {
    video_id: String,
    gateway: Arc<dyn InteractionGateway>,
    cache: Arc<Mutex<CommentCache>>,
    events: Arc<EventManager>,
    in_flight: Arc<AtomicBool>,
    ticks: AtomicU64,
    applied: AtomicU64,
    skipped: AtomicU64,
    cancel: CancellationToken,
}

impl PollShared {
    fn claim(&self) -> Option<InFlight> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(InFlight(self.in_flight.clone()))
        }
    }

    async fn skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
        debug!("⏭️ 上一次拉取尚未返回，跳过本次刷新: video_id={}", self.video_id);
        self.events
            .emit(event_builders::poll_tick_skipped(&self.video_id))
            .await;
    }

    /// 拉取并整体替换；取消后返回 None
    async fn fetch_and_apply(&self, _claim: InFlight) -> Option<usize> {
        let comments = tokio::select! {
            _ = self.cancel.cancelled() => return None,
            comments = self.gateway.fetch_comments(&self.video_id) => comments,
        };

        if self.cancel.is_cancelled() {
            debug!("视图已卸载，丢弃拉取结果: video_id={}", self.video_id);
            return None;
        }

        let count = {
            let mut cache = self.cache.lock();
            cache.replace_all(comments);
            cache.len()
        };
        self.applied.fetch_add(1, Ordering::Relaxed);
        self.events
            .emit(event_builders::comments_refreshed(&self.video_id, count))
            .await;
        Some(count)
    }
}

pub struct PollRefresher {
    shared: Arc<PollShared>,
    config: PollConfig,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PollRefresher {
    /// `cancel` 一般是视图挂载令牌的子令牌
    pub fn new(
        video_id: impl Into<String>,
        gateway: Arc<dyn InteractionGateway>,
        cache: Arc<Mutex<CommentCache>>,
        events: Arc<EventManager>,
        config: PollConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            shared: Arc::new(PollShared {
                video_id: video_id.into(),
                gateway,
                cache,
                events,
                in_flight: Arc::new(AtomicBool::new(false)),
                ticks: AtomicU64::new(0),
                applied: AtomicU64::new(0),
                skipped: AtomicU64::new(0),
                cancel,
            }),
            config,
            handle: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// 启动定时器；首个 tick 在一个完整周期之后触发
    ///
    /// 已禁用、已在运行或已取消时返回 false。
    pub fn start(&self) -> bool {
        if !self.config.enabled || self.shared.cancel.is_cancelled() {
            return false;
        }
        if self.config.interval().is_zero() {
            warn!("⚠️ 轮询周期为 0，不启动轮询: video_id={}", self.shared.video_id);
            return false;
        }

        let mut handle = self.handle.lock();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }

        let shared = self.shared.clone();
        let period = self.config.interval();
        let skip_when_in_flight = self.config.skip_when_in_flight;

        *handle = Some(tokio::spawn(async move {
            info!(
                "🔄 评论轮询已启动: video_id={}, interval={:?}",
                shared.video_id, period
            );
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shared.cancel.cancelled() => break,
                    _ = interval.tick() => {
                        shared.ticks.fetch_add(1, Ordering::Relaxed);
                        match shared.claim() {
                            None => shared.skip().await,
                            Some(claim) if skip_when_in_flight => {
                                let shared = shared.clone();
                                tokio::spawn(async move {
                                    shared.fetch_and_apply(claim).await;
                                });
                            }
                            Some(claim) => {
                                shared.fetch_and_apply(claim).await;
                            }
                        }
                    }
                }
            }
            info!("⏹️ 评论轮询已停止: video_id={}", shared.video_id);
        }));
        true
    }

    /// 停止定时器并丢弃进行中的拉取结果
    pub fn stop(&self) {
        self.shared.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.shared.cancel.is_cancelled()
            && self
                .handle
                .lock()
                .as_ref()
                .is_some_and(|h| !h.is_finished())
    }

    /// 立即刷新一次，受同一个进行中标记约束
    ///
    /// 返回替换后的评论数；被跳过或已卸载时返回 None。
    pub async fn refresh_now(&self) -> Option<usize> {
        match self.shared.claim() {
            Some(claim) => self.shared.fetch_and_apply(claim).await,
            None => {
                self.shared.skip().await;
                None
            }
        }
    }

    pub fn stats(&self) -> PollStats {
        PollStats {
            ticks: self.shared.ticks.load(Ordering::Relaxed),
            applied: self.shared.applied.load(Ordering::Relaxed),
            skipped: self.shared.skipped.load(Ordering::Relaxed),
        }
    }
}

impl Drop for PollRefresher {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::comment;
    use crate::events::SDKEvent;
    use crate::gateway::scripted::ScriptedGateway;
    use std::time::Duration;
    use tokio::time::sleep;

    fn poller(
        gateway: &Arc<ScriptedGateway>,
        cache: &Arc<Mutex<CommentCache>>,
        events: &Arc<EventManager>,
        skip_when_in_flight: bool,
    ) -> PollRefresher {
        PollRefresher::new(
            "v1",
            gateway.clone(),
            cache.clone(),
            events.clone(),
            PollConfig {
                enabled: true,
                interval_ms: 10_000,
                skip_when_in_flight,
            },
            CancellationToken::new(),
        )
    }

    fn setup() -> (Arc<ScriptedGateway>, Arc<Mutex<CommentCache>>, Arc<EventManager>) {
        let gateway = Arc::new(ScriptedGateway::with_comments(vec![
            comment("c1", "a", 1, 0),
            comment("c2", "b", 2, 0),
        ]));
        (
            gateway,
            Arc::new(Mutex::new(CommentCache::new())),
            Arc::new(EventManager::new(64)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_replace_cache_after_full_period() {
        let (gateway, cache, events) = setup();
        let poller = poller(&gateway, &cache, &events, true);
        assert!(poller.start());

        sleep(Duration::from_secs(5)).await;
        assert_eq!(poller.stats().ticks, 0);
        assert!(cache.lock().is_empty());

        sleep(Duration::from_secs(20)).await;
        let stats = poller.stats();
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.applied, 2);
        assert_eq!(stats.skipped, 0);
        assert_eq!(cache.lock().len(), 2);
        assert_eq!(cache.lock().generation(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_ticks_are_skipped() {
        let (gateway, cache, events) = setup();
        *gateway.fetch_delay.lock() = Some(Duration::from_secs(25));
        let mut rx = events.subscribe();
        let poller = poller(&gateway, &cache, &events, true);
        poller.start();

        // t=10 开始拉取，t=35 返回；t=20、t=30 的 tick 被跳过
        sleep(Duration::from_secs(32)).await;
        let stats = poller.stats();
        assert_eq!(stats.ticks, 3);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.applied, 0);
        assert_eq!(gateway.max_fetch_in_flight.load(Ordering::SeqCst), 1);
        assert!(matches!(rx.recv().await.unwrap(), SDKEvent::PollTickSkipped { .. }));

        sleep(Duration::from_secs(6)).await;
        assert_eq!(poller.stats().applied, 1);
        assert_eq!(cache.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inline_mode_never_overlaps() {
        let (gateway, cache, events) = setup();
        *gateway.fetch_delay.lock() = Some(Duration::from_secs(25));
        let poller = poller(&gateway, &cache, &events, false);
        poller.start();

        sleep(Duration::from_secs(80)).await;
        let stats = poller.stats();
        assert_eq!(stats.skipped, 0);
        assert!(stats.applied >= 2);
        assert_eq!(gateway.max_fetch_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_drops_in_flight_result() {
        let (gateway, cache, events) = setup();
        *gateway.fetch_delay.lock() = Some(Duration::from_secs(5));
        let poller = poller(&gateway, &cache, &events, true);
        poller.start();

        sleep(Duration::from_secs(12)).await;
        assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 1);
        poller.stop();

        sleep(Duration::from_secs(30)).await;
        assert!(!poller.is_running());
        assert_eq!(poller.stats().applied, 0);
        assert_eq!(poller.stats().ticks, 1);
        assert!(cache.lock().is_empty());
        assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_now_and_disabled_config() {
        let (gateway, cache, events) = setup();
        let poller = PollRefresher::new(
            "v1",
            gateway.clone(),
            cache.clone(),
            events,
            PollConfig {
                enabled: false,
                ..PollConfig::default()
            },
            CancellationToken::new(),
        );

        assert!(!poller.start());
        assert!(!poller.is_running());
        assert_eq!(poller.refresh_now().await, Some(2));
        assert_eq!(cache.lock().len(), 2);
        assert_eq!(poller.stats().applied, 1);
    }
}
