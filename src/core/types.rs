use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 上传任务唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct UploadId(pub Uuid);

impl UploadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// 短标识（前 8 位十六进制），用于生成存储 key
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 上传状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum UploadState {
    /// 已创建，尚未开始
    Pending,
    /// 上传中
    InProgress,
    /// 已完成
    Succeeded,
    /// 失败
    Failed,
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Succeeded | UploadState::Failed)
    }
}

/// 媒体槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSlot {
    /// 图集（最多 6 张）
    Gallery,
    /// 封面（恰好 1 张）
    Cover,
}

impl std::fmt::Display for MediaSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaSlot::Gallery => write!(f, "gallery"),
            MediaSlot::Cover => write!(f, "cover"),
        }
    }
}

/// 批次状态机: Idle -> AdmissionChecked -> InFlight -> {AllSucceeded, AnyFailed}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum BatchState {
    Idle,
    AdmissionChecked,
    InFlight,
    AllSucceeded,
    AnyFailed,
}

impl BatchState {
    pub fn is_settled(&self) -> bool {
        matches!(self, BatchState::AllSucceeded | BatchState::AnyFailed)
    }
}

/// 聚合进度的计算方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMode {
    /// 直接转发最近一次上报的单任务进度
    #[default]
    LastReported,
    /// 按字节数加权
    Weighted,
}

/// 待上传的文件内容
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl MediaPayload {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// 单个文件的上传记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaUploadTask {
    /// 任务 ID
    pub id: UploadId,
    /// 原始文件名
    pub name: String,
    /// 文件大小
    pub size: u64,
    /// 当前状态
    pub state: UploadState,
    /// 进度 [0, 1]
    pub progress: f64,
    /// 上传结果 URL（仅 Succeeded）
    pub result_url: Option<String>,
    /// 错误信息（仅 Failed）
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// 单个任务的进度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadProgress {
    pub upload_id: UploadId,
    pub bytes_uploaded: u64,
    pub total_bytes: u64,
    pub fraction: f64,
}

/// 上传事件
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// 状态变更
    StateChanged {
        upload_id: UploadId,
        old_state: UploadState,
        new_state: UploadState,
    },
    /// 进度更新
    Progress(UploadProgress),
    /// 任务完成
    Completed {
        upload_id: UploadId,
        url: String,
    },
    /// 任务失败
    Failed {
        upload_id: UploadId,
        error: String,
    },
    /// 整个批次结束
    BatchSettled {
        slot: MediaSlot,
        state: BatchState,
        total_tasks: usize,
    },
}

/// 上传相关配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// 图集容量
    pub gallery_max: usize,
    /// 封面容量
    pub cover_max: usize,
    /// 聚合进度方式
    pub progress_mode: ProgressMode,
    /// 事件通道容量
    pub event_capacity: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            gallery_max: 6,
            cover_max: 1,
            progress_mode: ProgressMode::LastReported,
            event_capacity: 256,
        }
    }
}

impl UploadConfig {
    pub fn capacity(&self, slot: MediaSlot) -> usize {
        match slot {
            MediaSlot::Gallery => self.gallery_max,
            MediaSlot::Cover => self.cover_max,
        }
    }
}

// 静态断言确保类型是 Send 的
const _: () = {
    fn assert_send<T: Send>() {}
    fn assert_types() {
        assert_send::<MediaUploadTask>();
        assert_send::<UploadEvent>();
        assert_send::<MediaPayload>();
    }
};
