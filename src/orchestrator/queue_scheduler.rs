//! 排队调度器 - 编排层
//!
//! ## 职责
//!
//! 所有对受限流保护的上游（LLM）的调用都必须经过这里：
//!
//! 1. **串行执行**：同一时刻只有一个调用在进行
//! 2. **最小间隔**：距离上一次成功调用不足 `min_delay` 时先等待
//! 3. **限流重试**：遇到限流错误按 [`RetryPolicy`] 退避后重试同一个条目，队列不前进
//! 4. **其他错误**：立即返回给提交者，不重试
//!
//! ## 实现
//!
//! 调度器是一个独占队列的后台任务。`submit` 只负责把条目放进 `mpsc` 通道，
//! 然后等待 `oneshot` 回复；`last_call_time` 等状态只由这个任务读写，不需要锁。
//!
//! 调用方超时放弃等待时，已经开始的调用会继续完成；
//! 还没轮到的条目在开始前会被丢弃，不再访问上游。

use crate::error::{AppError, AppResult};
use crate::orchestrator::RetryPolicy;
use chrono::{DateTime, Local};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 类型擦除后的待执行任务
trait Job: Send {
    /// 执行一次；成功时结果已经交付给提交者
    fn attempt(&mut self) -> BoxFuture<'_, AppResult<()>>;
    /// 以错误结束
    fn reject(&mut self, error: AppError);
    /// 提交者是否已经不再等待
    fn caller_gone(&self) -> bool;
}

struct PendingCall<T, F> {
    operation: F,
    reply: Option<oneshot::Sender<AppResult<T>>>,
}

impl<T, F, Fut> Job for PendingCall<T, F>
where
    T: Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = AppResult<T>> + Send + 'static,
{
    fn attempt(&mut self) -> BoxFuture<'_, AppResult<()>> {
        let call = (self.operation)();
        Box::pin(async move {
            let value = call.await?;
            if let Some(reply) = self.reply.take() {
                let _ = reply.send(Ok(value));
            }
            Ok(())
        })
    }

    fn reject(&mut self, error: AppError) {
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(Err(error));
        }
    }

    fn caller_gone(&self) -> bool {
        self.reply.as_ref().map_or(true, |reply| reply.is_closed())
    }
}

/// 队列条目
struct QueueEntry {
    id: u64,
    job: Box<dyn Job>,
    retry_count: u32,
    enqueued_at: DateTime<Local>,
}

/// 排队调度器句柄
///
/// 可以廉价克隆，所有克隆共享同一个后台排队任务。
/// 必须在 tokio 运行时内创建。
#[derive(Clone)]
pub struct QueueScheduler {
    sender: mpsc::UnboundedSender<QueueEntry>,
    pending: Arc<AtomicUsize>,
    next_id: Arc<AtomicU64>,
}

impl QueueScheduler {
    /// 创建调度器并启动后台排队任务
    pub fn new(min_delay: Duration, policy: RetryPolicy) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));

        tokio::spawn(drain(receiver, min_delay, policy, pending.clone()));

        Self {
            sender,
            pending,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// 提交一个调用
    ///
    /// `operation` 在每次尝试时都会被重新调用，以产生新的 future。
    /// 返回调用结果，或最终错误（非限流错误 / 重试耗尽）。
    pub async fn submit<T, F, Fut>(&self, operation: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let entry = QueueEntry {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            job: Box::new(PendingCall {
                operation,
                reply: Some(reply),
            }),
            retry_count: 0,
            enqueued_at: Local::now(),
        };

        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(entry).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(AppError::SchedulerClosed);
        }

        response.await.map_err(|_| AppError::SchedulerClosed)?
    }

    /// 排队中（含正在执行）的条目数
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// 后台任务当前是否在处理条目
    pub fn is_processing(&self) -> bool {
        self.pending() > 0
    }
}

/// 后台排队任务：按 FIFO 逐个执行条目
async fn drain(
    mut receiver: mpsc::UnboundedReceiver<QueueEntry>,
    min_delay: Duration,
    policy: RetryPolicy,
    pending: Arc<AtomicUsize>,
) {
    let mut last_call_time: Option<Instant> = None;

    while let Some(mut entry) = receiver.recv().await {
        loop {
            if let Some(last) = last_call_time {
                let elapsed = last.elapsed();
                if elapsed < min_delay {
                    tokio::time::sleep(min_delay - elapsed).await;
                }
            }

            if entry.job.caller_gone() {
                info!(
                    "⏭️ 调用 #{} 的提交者已放弃等待，跳过 (已重试 {} 次)",
                    entry.id, entry.retry_count
                );
                break;
            }

            debug!(
                "▶️ 执行调用 #{} (第 {} 次尝试, 入队于 {})",
                entry.id,
                entry.retry_count + 1,
                entry.enqueued_at.format("%H:%M:%S%.3f")
            );

            let outcome = entry.job.attempt().await;
            match outcome {
                Ok(()) => {
                    last_call_time = Some(Instant::now());
                    debug!("✓ 调用 #{} 完成", entry.id);
                    break;
                }
                Err(error) => match policy.should_retry(entry.retry_count, &error) {
                    Some(delay) => {
                        entry.retry_count += 1;
                        warn!(
                            "⚠️ 调用 #{} 被限流，{}ms 后进行第 {}/{} 次重试: {}",
                            entry.id,
                            delay.as_millis(),
                            entry.retry_count,
                            policy.max_retries,
                            error
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        warn!(
                            "❌ 调用 #{} 失败 (已重试 {} 次): {}",
                            entry.id, entry.retry_count, error
                        );
                        entry.job.reject(error);
                        break;
                    }
                },
            }
        }

        pending.fetch_sub(1, Ordering::SeqCst);
    }

    debug!("调度器通道关闭，排队任务退出");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    const MIN_DELAY: Duration = Duration::from_millis(1000);

    fn scheduler() -> QueueScheduler {
        QueueScheduler::new(MIN_DELAY, RetryPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_are_spaced_by_min_delay() {
        let scheduler = scheduler();
        let spans: Arc<Mutex<Vec<(Instant, Instant)>>> = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..4u64 {
            let scheduler = scheduler.clone();
            let spans = spans.clone();
            handles.push(tokio::spawn(async move {
                scheduler
                    .submit(move || {
                        let spans = spans.clone();
                        async move {
                            let start = Instant::now();
                            tokio::time::sleep(Duration::from_millis(50 * (i + 1))).await;
                            spans.lock().unwrap().push((start, Instant::now()));
                            Ok(i)
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let spans = spans.lock().unwrap();
        assert_eq!(spans.len(), 4);
        for pair in spans.windows(2) {
            let (_, prev_end) = pair[0];
            let (next_start, _) = pair[1];
            assert!(next_start.duration_since(prev_end) >= MIN_DELAY);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_call_is_retried_with_growing_backoff() {
        let scheduler = scheduler();
        let attempts: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));

        let recorded = attempts.clone();
        let result = scheduler
            .submit(move || {
                let recorded = recorded.clone();
                async move {
                    let mut attempts = recorded.lock().unwrap();
                    attempts.push(Instant::now());
                    if attempts.len() <= 3 {
                        Err(AppError::rate_limited("test", "429 Too Many Requests"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");

        let attempts = attempts.lock().unwrap();
        assert_eq!(attempts.len(), 4);
        let gaps: Vec<Duration> = attempts.windows(2).map(|w| w[1] - w[0]).collect();
        assert!(gaps[0] >= Duration::from_millis(2000));
        assert!(gaps[1] > gaps[0]);
        assert!(gaps[2] > gaps[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted_returns_terminal_error() {
        let scheduler = scheduler();
        let count = Arc::new(AtomicU32::new(0));

        let counter = count.clone();
        let result: AppResult<()> = scheduler
            .submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(AppError::rate_limited("test", "429")) }
            })
            .await;

        assert!(result.unwrap_err().is_rate_limited());
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_fail_without_retry() {
        let scheduler = scheduler();
        let count = Arc::new(AtomicU32::new(0));

        let counter = count.clone();
        let started = Instant::now();
        let result: AppResult<()> = scheduler
            .submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(AppError::Other("network down".into())) }
            })
            .await;

        assert!(matches!(result, Err(AppError::Other(_))));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_order_is_kept_across_retries() {
        let scheduler = scheduler();
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let first_failures = Arc::new(AtomicU32::new(0));

        let first = {
            let scheduler = scheduler.clone();
            let order = order.clone();
            let failures = first_failures.clone();
            tokio::spawn(async move {
                scheduler
                    .submit(move || {
                        let order = order.clone();
                        let failures = failures.clone();
                        async move {
                            if failures.fetch_add(1, Ordering::SeqCst) < 2 {
                                return Err(AppError::rate_limited("test", "429"));
                            }
                            order.lock().unwrap().push("first");
                            Ok(())
                        }
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        let second = {
            let scheduler = scheduler.clone();
            let order = order.clone();
            tokio::spawn(async move {
                scheduler
                    .submit(move || {
                        let order = order.clone();
                        async move {
                            order.lock().unwrap().push("second");
                            Ok(())
                        }
                    })
                    .await
            })
        };

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(scheduler.pending(), 0);
        assert!(!scheduler.is_processing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_entries_are_skipped() {
        let scheduler = scheduler();
        let calls = Arc::new(AtomicU32::new(0));

        // 先完成一次调用，让下一条必须等待 min_delay
        scheduler.submit(|| async { Ok(()) }).await.unwrap();

        let counter = calls.clone();
        let waited = tokio::time::timeout(
            Duration::from_millis(100),
            scheduler.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            }),
        )
        .await;
        assert!(waited.is_err());

        // 排队任务醒来后发现提交者已放弃
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 0);
    }
}
