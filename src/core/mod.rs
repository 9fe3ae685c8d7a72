mod types;
mod traits;
mod task;
mod errors;
mod progress;
mod progress_stream;
mod coordinator;
mod reconciler;

pub use types::{
    UploadId,
    UploadState,
    MediaSlot,
    BatchState,
    ProgressMode,
    MediaPayload,
    MediaUploadTask,
    UploadProgress,
    UploadEvent,
    UploadConfig,
};
pub use traits::ObjectStore;
pub use task::UploadTask;
pub use errors::{AdmissionReason, Result, TransportError, UploadError};
pub use progress::{fraction_of, BatchProgress, ProgressSink};
pub use progress_stream::ProgressStream;
pub use coordinator::BatchCoordinator;
pub use reconciler::{MediaCollection, MediaForm};
