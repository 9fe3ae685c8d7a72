pub mod core;
pub mod uploaders;
pub mod utils;
pub mod config;
pub mod api;
pub mod listing;

// 重新导出核心类型
pub use core::{
    BatchCoordinator,
    MediaForm,
    MediaCollection,
    MediaPayload,
    MediaSlot,
    MediaUploadTask,
    BatchState,
    ObjectStore,
    ProgressMode,
    ProgressSink,
    UploadConfig,
    UploadEvent,
    UploadId,
    UploadState,
    UploadError,
    TransportError,
    Result,
};

// 重新导出存储实现
pub use uploaders::{
    HttpObjectStore,
    MemoryObjectStore,
};

pub use api::{HttpListingApi, ListingApi};
pub use listing::{CurrentUser, ServiceEditor, ServiceRecord};
