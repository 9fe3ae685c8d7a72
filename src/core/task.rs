use std::sync::Arc;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use super::errors::TransportError;
use super::progress::ProgressSink;
use super::traits::ObjectStore;
use super::types::{MediaPayload, MediaUploadTask, UploadEvent, UploadId, UploadState};
use crate::utils::destination_key;

/// 单个文件的上传生命周期
///
/// `Pending -> InProgress -> {Succeeded, Failed}`，终态只会到达一次。
pub struct UploadTask {
    record: MediaUploadTask,
    payload: MediaPayload,
    event_tx: broadcast::Sender<UploadEvent>,
}

impl UploadTask {
    pub fn new(payload: MediaPayload, event_tx: broadcast::Sender<UploadEvent>) -> Self {
        let record = MediaUploadTask {
            id: UploadId::new(),
            name: payload.name.clone(),
            size: payload.size(),
            state: UploadState::Pending,
            progress: 0.0,
            result_url: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };

        Self {
            record,
            payload,
            event_tx,
        }
    }

    pub fn id(&self) -> UploadId {
        self.record.id
    }

    pub fn state(&self) -> UploadState {
        self.record.state
    }

    pub fn record(&self) -> &MediaUploadTask {
        &self.record
    }

    pub fn is_valid_transition(from: UploadState, to: UploadState) -> bool {
        use UploadState::*;

        matches!(
            (from, to),
            (Pending, InProgress) | (Pending, Failed) | (InProgress, Succeeded) | (InProgress, Failed)
        )
    }

    fn transition(&mut self, new_state: UploadState) {
        let old_state = self.record.state;
        if !Self::is_valid_transition(old_state, new_state) {
            warn!(upload_id = %self.record.id, ?old_state, ?new_state, "ignoring invalid state transition");
            return;
        }

        self.record.state = new_state;
        if new_state.is_terminal() {
            self.record.completed_at = Some(Utc::now());
        } else if new_state == UploadState::InProgress {
            self.record.started_at = Some(Utc::now());
        }

        let _ = self.event_tx.send(UploadEvent::StateChanged {
            upload_id: self.record.id,
            old_state,
            new_state,
        });
    }

    /// 执行上传，返回最终的任务记录和结果
    pub async fn run(
        mut self,
        store: Arc<dyn ObjectStore>,
        sink: ProgressSink,
    ) -> (MediaUploadTask, Result<String, TransportError>) {
        self.transition(UploadState::InProgress);

        let result = self.upload(store.as_ref(), &sink).await;
        self.record.progress = sink.fraction();

        match &result {
            Ok(url) => {
                self.record.progress = 1.0;
                self.record.result_url = Some(url.clone());
                self.transition(UploadState::Succeeded);
                debug!(upload_id = %self.record.id, name = %self.record.name, %url, "upload succeeded");
                let _ = self.event_tx.send(UploadEvent::Completed {
                    upload_id: self.record.id,
                    url: url.clone(),
                });
            }
            Err(err) => {
                self.record.error = Some(err.to_string());
                self.transition(UploadState::Failed);
                warn!(upload_id = %self.record.id, name = %self.record.name, error = %err, "upload failed");
                let _ = self.event_tx.send(UploadEvent::Failed {
                    upload_id: self.record.id,
                    error: err.to_string(),
                });
            }
        }

        (self.record, result)
    }

    async fn upload(&self, store: &dyn ObjectStore, sink: &ProgressSink) -> Result<String, TransportError> {
        let size = self.payload.size();
        if let Some(limit) = store.max_object_bytes() {
            if size > limit {
                return Err(TransportError::SizeLimit { size, limit });
            }
        }

        let key = destination_key(&self.payload.name, self.record.id, Utc::now());
        debug!(upload_id = %self.record.id, store = store.name(), %key, size, "starting upload");

        let url = store.put(&key, self.payload.clone(), sink.clone()).await?;
        // 存储可能没有逐块上报，完成时补齐
        sink.report(size);

        Ok(url)
    }
}
