use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};

/// 单槽定时器: 重新调度会取消上一次，Drop 时取消
///
/// 用于防抖、悬停菜单关闭、高亮清除、轮询等。
#[derive(Debug, Default)]
pub struct Timer {
    slot: Mutex<Option<AbortHandle>>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `delay` 之后执行 `task`
    pub fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // 截止时间在调度时确定，而不是任务首次被轮询时
        let deadline = Instant::now() + delay;
        let handle = tokio::spawn(async move {
            sleep_until(deadline).await;
            task.await;
        });
        self.replace(handle.abort_handle());
    }

    /// 立即执行一次，之后每隔 `period` 执行一次
    pub fn repeat<F, Fut>(&self, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let start = Instant::now();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tick().await;
            }
        });
        self.replace(handle.abort_handle());
    }

    pub fn cancel(&self) {
        if let Some(previous) = self.slot.lock().take() {
            previous.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn replace(&self, handle: AbortHandle) {
        if let Some(previous) = self.slot.lock().replace(handle) {
            previous.abort();
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// 多个并存的一次性定时器，Drop 时全部取消
#[derive(Debug, Default)]
pub struct TimerGroup {
    handles: Mutex<Vec<AbortHandle>>,
}

impl TimerGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let deadline = Instant::now() + delay;
        let handle = tokio::spawn(async move {
            sleep_until(deadline).await;
            task.await;
        });
        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle.abort_handle());
    }

    pub fn cancel_all(&self) {
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }

    pub fn pending(&self) -> usize {
        self.handles.lock().iter().filter(|h| !h.is_finished()).count()
    }
}

impl Drop for TimerGroup {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
