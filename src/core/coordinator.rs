use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};
use super::errors::{AdmissionReason, Result, TransportError, UploadError};
use super::progress::BatchProgress;
use super::task::UploadTask;
use super::traits::ObjectStore;
use super::types::{BatchState, MediaPayload, MediaSlot, MediaUploadTask, UploadConfig, UploadEvent};

/// 工作任务回报的结果：(提交顺序下标, 任务记录, 上传结果)
type TaskReport = (usize, MediaUploadTask, std::result::Result<String, TransportError>);

/// 批量上传协调器
///
/// 一个批次要么全部成功（按提交顺序返回 URL），要么在第一个失败的任务结束时立即失败。
/// 失败时不会取消仍在运行的兄弟任务，也不会删除已经上传成功的对象。
#[derive(Clone)]
pub struct BatchCoordinator {
    store: Arc<dyn ObjectStore>,
    config: UploadConfig,
    event_tx: broadcast::Sender<UploadEvent>,
    progress_tx: Arc<watch::Sender<f64>>,
}

impl BatchCoordinator {
    pub fn new(store: Arc<dyn ObjectStore>, config: UploadConfig) -> Self {
        // 最大缓存 event_capacity 个事件
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let (progress_tx, _) = watch::channel(0.0);

        Self {
            store,
            config,
            event_tx,
            progress_tx: Arc::new(progress_tx),
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// 订阅事件
    ///
    /// 接收速度跟不上时会丢失事件（lagged error）
    pub fn subscribe_events(&self) -> broadcast::Receiver<UploadEvent> {
        self.event_tx.subscribe()
    }

    /// 订阅聚合进度，值在 [0, 1] 内
    pub fn subscribe_progress(&self) -> watch::Receiver<f64> {
        self.progress_tx.subscribe()
    }

    /// 同步准入检查，不发起任何网络请求
    pub fn admit(&self, slot: MediaSlot, existing: usize, submitted: usize) -> Result<()> {
        if submitted == 0 {
            return Err(UploadError::AdmissionRejected(AdmissionReason::Empty { slot }));
        }

        let max = self.config.capacity(slot);
        if existing + submitted > max {
            return Err(UploadError::AdmissionRejected(AdmissionReason::TooManyFiles {
                slot,
                existing,
                submitted,
                max,
            }));
        }

        Ok(())
    }

    /// 提交一个批次
    ///
    /// 返回的 URL 与 `payloads` 的顺序一一对应，与完成顺序无关。
    pub async fn submit_batch(
        &self,
        slot: MediaSlot,
        existing: usize,
        payloads: Vec<MediaPayload>,
    ) -> Result<Vec<String>> {
        let total_tasks = payloads.len();
        if let Err(err) = self.admit(slot, existing, total_tasks) {
            info!(%slot, existing, submitted = total_tasks, error = %err, "batch rejected at admission");
            self.emit_settled(slot, BatchState::AnyFailed, 0);
            return Err(err);
        }

        let tasks: Vec<UploadTask> = payloads
            .into_iter()
            .map(|payload| UploadTask::new(payload, self.event_tx.clone()))
            .collect();

        let totals: Vec<_> = tasks.iter().map(|task| (task.id(), task.record().size)).collect();
        let progress = BatchProgress::new(
            self.config.progress_mode,
            &totals,
            self.progress_tx.clone(),
            self.event_tx.clone(),
        );

        info!(%slot, existing, submitted = total_tasks, "batch admitted, starting uploads");

        let (report_tx, mut report_rx) = mpsc::unbounded_channel::<TaskReport>();
        for (index, task) in tasks.into_iter().enumerate() {
            let store = self.store.clone();
            let sink = progress.sink(index);
            let report_tx = report_tx.clone();

            // 不保留 JoinHandle：批次失败后其余任务在后台自然结束
            tokio::spawn(async move {
                let (record, result) = task.run(store, sink).await;
                if report_tx.send((index, record, result)).is_err() {
                    // 批次已经结束，结果被丢弃
                    warn!(index, "upload finished after its batch settled, object abandoned");
                }
            });
        }
        drop(report_tx);

        let mut urls: Vec<Option<String>> = vec![None; total_tasks];
        let mut settled = 0;

        while settled < total_tasks {
            let Some((index, record, result)) = report_rx.recv().await else {
                progress.settle();
                self.emit_settled(slot, BatchState::AnyFailed, total_tasks);
                return Err(UploadError::internal_error("upload worker exited without reporting"));
            };

            match result {
                Ok(url) => {
                    debug!(index, upload_id = %record.id, "batch member succeeded");
                    urls[index] = Some(url);
                    settled += 1;
                }
                Err(source) => {
                    warn!(
                        %slot,
                        index,
                        upload_id = %record.id,
                        name = %record.name,
                        succeeded = settled,
                        "batch failed, already uploaded siblings are abandoned"
                    );
                    progress.settle();
                    self.emit_settled(slot, BatchState::AnyFailed, total_tasks);
                    return Err(UploadError::Batch {
                        upload_id: record.id,
                        name: record.name,
                        source,
                    });
                }
            }
        }

        progress.settle();
        self.progress_tx.send_replace(1.0);
        self.emit_settled(slot, BatchState::AllSucceeded, total_tasks);
        info!(%slot, uploaded = total_tasks, "batch succeeded");

        urls.into_iter()
            .map(|url| url.ok_or_else(|| UploadError::internal_error("missing upload result")))
            .collect()
    }

    fn emit_settled(&self, slot: MediaSlot, state: BatchState, total_tasks: usize) {
        let _ = self.event_tx.send(UploadEvent::BatchSettled {
            slot,
            state,
            total_tasks,
        });
    }
}
