//! 轮询刷新
//!
//! `RealTimeQuery` 包装一个 [`Query`]，在活跃期间按固定间隔调用 `refetch`。
//! 定时器由可注入的 [`Scheduler`] 提供：生产环境使用tokio interval，测试中手动触发。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::query::Query;
use crate::state::FetchState;

/// 周期触发器
#[async_trait]
pub trait Ticker: Send {
    async fn tick(&mut self);
}

/// 定时器工厂
pub trait Scheduler: Send + Sync {
    fn interval(&self, period: Duration) -> Box<dyn Ticker>;
}

/// 基于tokio的定时器；首个触发点在一个周期之后
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

struct TokioTicker(time::Interval);

#[async_trait]
impl Ticker for TokioTicker {
    async fn tick(&mut self) {
        self.0.tick().await;
    }
}

impl Scheduler for TokioScheduler {
    fn interval(&self, period: Duration) -> Box<dyn Ticker> {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Box::new(TokioTicker(interval))
    }
}

/// 手动触发的定时器
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    tickers: Arc<Mutex<Vec<mpsc::UnboundedSender<()>>>>,
}

struct ManualTicker(mpsc::UnboundedReceiver<()>);

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) {
        if self.0.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发所有仍存活的定时器，返回被触发的数量
    pub fn fire(&self) -> usize {
        let mut tickers = self.tickers.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        tickers.retain(|ticker| ticker.send(()).is_ok());
        tickers.len()
    }
}

impl Scheduler for ManualScheduler {
    fn interval(&self, _period: Duration) -> Box<dyn Ticker> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tickers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(tx);
        Box::new(ManualTicker(rx))
    }
}

/// 实时查询
pub struct RealTimeQuery<T> {
    query: Query<T>,
    interval: Duration,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<T: Send + Sync + 'static> RealTimeQuery<T> {
    /// 使用tokio定时器启动
    pub fn spawn(query: Query<T>, interval: Duration) -> Self {
        Self::spawn_with(query, interval, &TokioScheduler)
    }

    /// 立即发起首次拉取，随后每个 `interval` 刷新一次；间隔为0时不轮询
    pub fn spawn_with(query: Query<T>, interval: Duration, scheduler: &dyn Scheduler) -> Self {
        let cancel = CancellationToken::new();
        let ticker = (!interval.is_zero()).then(|| scheduler.interval(interval));

        let task = tokio::spawn(poll_loop(query.clone(), ticker, cancel.clone()));
        info!(query = %query.name(), interval_ms = interval.as_millis() as u64, "Real-time query started");

        Self {
            query,
            interval,
            cancel,
            task: Some(task),
        }
    }

    pub fn query(&self) -> &Query<T> {
        &self.query
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> FetchState<T> {
        self.query.state()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<FetchState<T>> {
        self.query.subscribe()
    }

    /// 手动刷新，不影响轮询节奏
    pub async fn refetch(&self) -> hospitrack_core::Result<Arc<T>> {
        self.query.refetch().await
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// 停止轮询并等待后台任务退出
    pub async fn stop(mut self) {
        self.shutdown();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!(query = %self.query.name(), "Real-time query stopped");
    }

    fn shutdown(&self) {
        self.cancel.cancel();
        self.query.deactivate();
    }
}

impl<T> Drop for RealTimeQuery<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn poll_loop<T: Send + Sync + 'static>(
    query: Query<T>,
    ticker: Option<Box<dyn Ticker>>,
    cancel: CancellationToken,
) {
    let run = async {
        let _ = query.start().await;
        let Some(mut ticker) = ticker else {
            debug!(query = %query.name(), "Polling disabled");
            return;
        };
        loop {
            ticker.tick().await;
            debug!(query = %query.name(), "Polling tick");
            let _ = query.refetch().await;
        }
    };

    tokio::select! {
        _ = cancel.cancelled() => debug!(query = %query.name(), "Polling cancelled"),
        _ = run => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Phase;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_query(counter: Arc<AtomicUsize>) -> Query<usize> {
        Query::new("beds", move || {
            let counter = counter.clone();
            Box::pin(async move { Ok(counter.fetch_add(1, Ordering::SeqCst) + 1) })
        })
    }

    async fn wait_for_calls(counter: &AtomicUsize, expected: usize) {
        for _ in 0..100 {
            if counter.load(Ordering::SeqCst) >= expected {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {} calls, saw {}", expected, counter.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let realtime = RealTimeQuery::spawn(counting_query(calls.clone()), Duration::from_secs(15));

        time::sleep(Duration::from_secs(46)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(realtime.state().phase, Phase::Success);

        realtime.stop().await;
        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_manual_ticks_and_cancellation() {
        let scheduler = ManualScheduler::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let realtime = RealTimeQuery::spawn_with(counting_query(calls.clone()), Duration::from_secs(30), &scheduler);

        wait_for_calls(&calls, 1).await;
        assert_eq!(scheduler.fire(), 1);
        wait_for_calls(&calls, 2).await;

        let query = realtime.query().clone();
        realtime.stop().await;

        // 任务退出后定时器已释放
        assert_eq!(scheduler.fire(), 0);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!query.is_active());
    }

    #[tokio::test]
    async fn test_zero_interval_disables_polling() {
        let scheduler = ManualScheduler::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let realtime = RealTimeQuery::spawn_with(counting_query(calls.clone()), Duration::ZERO, &scheduler);

        wait_for_calls(&calls, 1).await;
        assert_eq!(scheduler.fire(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        drop(realtime);
    }

    #[tokio::test]
    async fn test_drop_cancels_polling() {
        let scheduler = ManualScheduler::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let realtime = RealTimeQuery::spawn_with(counting_query(calls.clone()), Duration::from_secs(60), &scheduler);
        wait_for_calls(&calls, 1).await;

        drop(realtime);
        tokio::task::yield_now().await;
        assert_eq!(scheduler.fire(), 0);
    }
}
