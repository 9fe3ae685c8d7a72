use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{broadcast, watch};
use super::types::{ProgressMode, UploadEvent, UploadId, UploadProgress};

/// 计算进度比例，结果总在 [0, 1] 内
pub fn fraction_of(bytes_uploaded: u64, total_bytes: u64) -> f64 {
    if total_bytes == 0 {
        return 1.0;
    }
    (bytes_uploaded.min(total_bytes) as f64 / total_bytes as f64).clamp(0.0, 1.0)
}

struct TaskTracker {
    upload_id: UploadId,
    total_bytes: u64,
    bytes_uploaded: AtomicU64,
}

/// 批次级进度聚合器
///
/// 批次开始时确定任务集合，之后只通过原子量更新，不需要加锁。
pub struct BatchProgress {
    mode: ProgressMode,
    trackers: Vec<TaskTracker>,
    updates: AtomicUsize,
    settled: AtomicBool,
    progress_tx: Arc<watch::Sender<f64>>,
    event_tx: broadcast::Sender<UploadEvent>,
}

impl BatchProgress {
    pub fn new(
        mode: ProgressMode,
        tasks: &[(UploadId, u64)],
        progress_tx: Arc<watch::Sender<f64>>,
        event_tx: broadcast::Sender<UploadEvent>,
    ) -> Arc<Self> {
        let trackers = tasks
            .iter()
            .map(|(upload_id, total_bytes)| TaskTracker {
                upload_id: *upload_id,
                total_bytes: *total_bytes,
                bytes_uploaded: AtomicU64::new(0),
            })
            .collect();

        progress_tx.send_replace(0.0);

        Arc::new(Self {
            mode,
            trackers,
            updates: AtomicUsize::new(0),
            settled: AtomicBool::new(false),
            progress_tx,
            event_tx,
        })
    }

    /// 为第 `index` 个任务创建进度上报器
    pub fn sink(self: &Arc<Self>, index: usize) -> ProgressSink {
        ProgressSink {
            index,
            batch: Some(self.clone()),
            total_bytes: self.trackers.get(index).map(|t| t.total_bytes).unwrap_or(0),
            reported: Arc::new(AtomicU64::new(0)),
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 当前聚合进度
    pub fn current(&self) -> f64 {
        *self.progress_tx.borrow()
    }

    /// 收到的进度更新次数
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::Relaxed)
    }

    /// 批次结束后不再写聚合进度，后台仍在运行的任务只发送自己的进度事件
    pub fn settle(&self) {
        // 在 watch 的写锁内置位，正在进行的聚合写入要么先完成，要么看到已结束
        self.progress_tx.send_if_modified(|_| {
            self.settled.store(true, Ordering::SeqCst);
            false
        });
    }

    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst)
    }

    fn publish(&self, index: usize, bytes_uploaded: u64) {
        let Some(tracker) = self.trackers.get(index) else {
            return;
        };
        tracker.bytes_uploaded.fetch_max(bytes_uploaded, Ordering::SeqCst);
        self.updates.fetch_add(1, Ordering::Relaxed);

        let task_fraction = fraction_of(bytes_uploaded, tracker.total_bytes);
        self.publish_aggregate(task_fraction);

        let _ = self.event_tx.send(UploadEvent::Progress(UploadProgress {
            upload_id: tracker.upload_id,
            bytes_uploaded,
            total_bytes: tracker.total_bytes,
            fraction: task_fraction,
        }));
    }

    fn publish_aggregate(&self, task_fraction: f64) {
        let aggregate = match self.mode {
            // 最后写入者获胜，不按文件大小加权
            ProgressMode::LastReported => task_fraction,
            ProgressMode::Weighted => {
                let (uploaded, total) = self.trackers.iter().fold((0u64, 0u64), |(u, t), tracker| {
                    (
                        u + tracker.bytes_uploaded.load(Ordering::SeqCst).min(tracker.total_bytes),
                        t + tracker.total_bytes,
                    )
                });
                fraction_of(uploaded, total)
            }
        };

        self.progress_tx.send_if_modified(|value| {
            if self.is_settled() {
                return false;
            }
            *value = aggregate;
            true
        });
    }
}

/// 单任务进度上报器
///
/// 保证上报的值单调不减且不超过总字节数，回退的值会被丢弃。
#[derive(Clone)]
pub struct ProgressSink {
    index: usize,
    batch: Option<Arc<BatchProgress>>,
    total_bytes: u64,
    reported: Arc<AtomicU64>,
    started: Arc<AtomicBool>,
}

impl ProgressSink {
    /// 不关联任何批次的上报器
    pub fn detached(total_bytes: u64) -> Self {
        Self {
            index: 0,
            batch: None,
            total_bytes,
            reported: Arc::new(AtomicU64::new(0)),
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 上报累计已发送的字节数
    pub fn report(&self, bytes_uploaded: u64) {
        let clamped = bytes_uploaded.min(self.total_bytes);
        let previous = self.reported.fetch_max(clamped, Ordering::SeqCst);
        let first = !self.started.swap(true, Ordering::SeqCst);

        if clamped <= previous && !first {
            return;
        }

        if let Some(batch) = &self.batch {
            batch.publish(self.index, clamped.max(previous));
        }
    }

    pub fn bytes_uploaded(&self) -> u64 {
        self.reported.load(Ordering::SeqCst)
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn fraction(&self) -> f64 {
        if !self.started.load(Ordering::SeqCst) {
            return 0.0;
        }
        fraction_of(self.bytes_uploaded(), self.total_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(mode: ProgressMode, sizes: &[u64]) -> (Arc<BatchProgress>, watch::Receiver<f64>) {
        let (progress_tx, progress_rx) = watch::channel(0.0);
        let (event_tx, _) = broadcast::channel(64);
        let tasks: Vec<_> = sizes.iter().map(|size| (UploadId::new(), *size)).collect();
        (BatchProgress::new(mode, &tasks, Arc::new(progress_tx), event_tx), progress_rx)
    }

    #[test]
    fn test_fraction_bounds() {
        assert_eq!(fraction_of(0, 100), 0.0);
        assert_eq!(fraction_of(50, 100), 0.5);
        assert_eq!(fraction_of(150, 100), 1.0);
        assert_eq!(fraction_of(0, 0), 1.0);
    }

    #[test]
    fn test_sink_is_monotonic() {
        let (batch, _rx) = batch(ProgressMode::LastReported, &[100]);
        let sink = batch.sink(0);

        sink.report(40);
        sink.report(20);
        assert_eq!(sink.bytes_uploaded(), 40);
        assert_eq!(sink.fraction(), 0.4);

        sink.report(500);
        assert_eq!(sink.bytes_uploaded(), 100);
        assert_eq!(sink.fraction(), 1.0);
    }

    #[test]
    fn test_regressions_are_not_published() {
        let (batch, _rx) = batch(ProgressMode::LastReported, &[100]);
        let sink = batch.sink(0);

        sink.report(10);
        sink.report(60);
        sink.report(30);
        sink.report(60);
        assert_eq!(batch.update_count(), 2);
    }

    #[test]
    fn test_last_reported_aggregate() {
        let (batch, rx) = batch(ProgressMode::LastReported, &[100, 1000]);
        let small = batch.sink(0);
        let large = batch.sink(1);

        small.report(100);
        assert_eq!(*rx.borrow(), 1.0);

        large.report(100);
        assert!((*rx.borrow() - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_weighted_aggregate() {
        let (batch, rx) = batch(ProgressMode::Weighted, &[100, 300]);
        batch.sink(0).report(100);
        assert_eq!(*rx.borrow(), 0.25);

        batch.sink(1).report(300);
        assert_eq!(*rx.borrow(), 1.0);
        assert_eq!(batch.current(), 1.0);
    }

    #[test]
    fn test_settled_batch_keeps_aggregate() {
        let (progress_tx, rx) = watch::channel(0.0);
        let (event_tx, mut event_rx) = broadcast::channel(64);
        let batch = BatchProgress::new(
            ProgressMode::LastReported,
            &[(UploadId::new(), 100)],
            Arc::new(progress_tx),
            event_tx,
        );
        let sink = batch.sink(0);

        sink.report(20);
        batch.settle();
        sink.report(70);

        assert!(batch.is_settled());
        assert_eq!(*rx.borrow(), 0.2);
        // 任务自己的进度事件照常发送
        let mut fractions = Vec::new();
        while let Ok(UploadEvent::Progress(progress)) = event_rx.try_recv() {
            fractions.push(progress.fraction);
        }
        assert_eq!(fractions, vec![0.2, 0.7]);
    }

    #[test]
    fn test_detached_sink() {
        let sink = ProgressSink::detached(10);
        assert_eq!(sink.fraction(), 0.0);
        sink.report(5);
        assert_eq!(sink.fraction(), 0.5);
        assert_eq!(sink.total_bytes(), 10);
    }
}
