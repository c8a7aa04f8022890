//! 批量处理器 - 编排层
//!
//! ## 职责
//!
//! 当很多独立条目都要调用受限流保护的上游时，限制并发并控制节奏：
//!
//! 1. **分批**：按 `batch_size` 切成 ceil(N / batch_size) 个连续批次
//! 2. **批内并发**：同一批的条目同时执行，等待全部完成
//! 3. **批间停顿**：相邻两批之间固定停顿，最后一批之后不停顿
//!
//! 批间停顿和 [`QueueScheduler`](crate::orchestrator::QueueScheduler)
//! 自身的最小间隔是叠加关系。
//!
//! 本模块不捕获错误：`process_item` 需要自己兜底，保证总能返回结果。

use crate::utils::logging::{log_batch_complete, log_batch_start};
use futures::future::join_all;
use std::future::Future;
use std::time::Duration;

/// 默认批间停顿
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_millis(1000);

/// 批量处理器
#[derive(Debug, Clone, Copy)]
pub struct BatchRunner {
    batch_size: usize,
    pause: Duration,
}

impl BatchRunner {
    /// `batch_size` 为 0 时按 1 处理
    pub fn new(batch_size: usize, pause: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            pause,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 批次数量
    pub fn batch_count(&self, total: usize) -> usize {
        (total + self.batch_size - 1) / self.batch_size
    }

    /// 分批处理所有条目，结果按批次顺序拼接
    pub async fn run<I, T, F, Fut>(&self, items: Vec<I>, process_item: F) -> Vec<T>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = T>,
    {
        let total = items.len();
        let total_batches = self.batch_count(total);
        let mut results = Vec::with_capacity(total);
        let mut remaining = items.into_iter();

        for batch_index in 0..total_batches {
            let batch: Vec<I> = remaining.by_ref().take(self.batch_size).collect();
            let start = batch_index * self.batch_size;

            log_batch_start(batch_index + 1, total_batches, start + 1, start + batch.len(), total);

            let batch_results = self.run_batch(batch, &process_item).await;
            log_batch_complete(batch_index + 1, batch_results.len());
            results.extend(batch_results);

            if batch_index + 1 < total_batches {
                tokio::time::sleep(self.pause).await;
            }
        }

        results
    }

    /// 处理单个批次：批内全部并发，等待全部完成
    async fn run_batch<I, T, F, Fut>(&self, batch: Vec<I>, process_item: &F) -> Vec<T>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = T>,
    {
        join_all(batch.into_iter().map(process_item)).await
    }
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new(2, DEFAULT_BATCH_PAUSE)
    }
}

/// 使用默认批间停顿分批处理
pub async fn run_batches<I, T, F, Fut>(items: Vec<I>, batch_size: usize, process_item: F) -> Vec<T>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = T>,
{
    BatchRunner::new(batch_size, DEFAULT_BATCH_PAUSE)
        .run(items, process_item)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;
    use tokio_test::{assert_pending, assert_ready};

    #[tokio::test(start_paused = true)]
    async fn test_every_item_processed_once_with_pauses_between_batches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let results = run_batches((0..5).collect(), 2, |n: u32| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                n * 10
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(results.len(), 5);
        // 3 批 → 2 次停顿
        let elapsed = started.elapsed();
        assert!(elapsed >= DEFAULT_BATCH_PAUSE * 2);
        assert!(elapsed < DEFAULT_BATCH_PAUSE * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_run_in_order_items_concurrently() {
        let runner = BatchRunner::new(3, Duration::from_millis(1000));
        let batch_starts: Arc<Mutex<Vec<(u32, Instant)>>> = Arc::new(Mutex::new(Vec::new()));
        let started = Instant::now();

        let results = runner
            .run((0..6).collect(), |n: u32| {
                let batch_starts = batch_starts.clone();
                async move {
                    batch_starts.lock().unwrap().push((n, Instant::now()));
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    n
                }
            })
            .await;

        let mut sorted = results.clone();
        sorted.sort();
        assert_eq!(sorted, vec![0, 1, 2, 3, 4, 5]);
        // 批内并发：每批 500ms，两批加一次停顿
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(2000));
        assert!(elapsed < Duration::from_millis(2500));

        let starts = batch_starts.lock().unwrap();
        let first_batch_latest = starts.iter().filter(|(n, _)| *n < 3).map(|(_, t)| *t).max().unwrap();
        let second_batch_earliest = starts.iter().filter(|(n, _)| *n >= 3).map(|(_, t)| *t).min().unwrap();
        assert!(second_batch_earliest >= first_batch_latest + Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_pause_after_single_batch() {
        let runner = BatchRunner::new(4, Duration::from_secs(10));
        let mut task = tokio_test::task::spawn(runner.run(vec![1, 2, 3], |n: i32| async move { n + 1 }));
        let results = assert_ready!(task.poll());
        assert_eq!(results, vec![2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_batch_waits_for_pause() {
        let runner = BatchRunner::new(1, Duration::from_secs(10));
        let mut task = tokio_test::task::spawn(runner.run(vec![1, 2], |n: i32| async move { n }));
        assert_pending!(task.poll());
    }

    #[tokio::test]
    async fn test_empty_input_and_zero_batch_size() {
        let results: Vec<u8> = run_batches(Vec::<u8>::new(), 0, |n| async move { n }).await;
        assert!(results.is_empty());
        assert_eq!(BatchRunner::new(0, Duration::ZERO).batch_size(), 1);
        assert_eq!(BatchRunner::new(2, Duration::ZERO).batch_count(5), 3);
    }
}
