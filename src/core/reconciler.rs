use tracing::{debug, info};
use super::coordinator::BatchCoordinator;
use super::errors::{AdmissionReason, Result, UploadError};
use super::types::{BatchState, MediaPayload, MediaSlot, UploadConfig};

/// 有序的媒体引用列表，长度不超过 `max`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCollection {
    items: Vec<String>,
    max: usize,
}

impl MediaCollection {
    pub fn new(max: usize) -> Self {
        Self {
            items: Vec::new(),
            max,
        }
    }

    pub fn with_items(items: Vec<String>, max: usize) -> Self {
        Self { items, max }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.items.clone()
    }

    /// 追加到末尾，超出容量时整体拒绝
    pub fn append(&mut self, references: Vec<String>) -> Result<()> {
        if self.items.len() + references.len() > self.max {
            return Err(UploadError::AdmissionRejected(AdmissionReason::TooManyFiles {
                slot: MediaSlot::Gallery,
                existing: self.items.len(),
                submitted: references.len(),
                max: self.max,
            }));
        }

        self.items.extend(references);
        Ok(())
    }

    /// 按位置删除，越界时什么也不做
    pub fn remove(&mut self, index: usize) -> Option<String> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }
}

/// 表单中的媒体状态：图集 + 封面
///
/// 只有在批次完全成功后才会修改集合；任何失败都保持原样并记录用户可见的错误。
#[derive(Debug, Clone)]
pub struct MediaForm {
    gallery: MediaCollection,
    cover: String,
    gallery_state: BatchState,
    cover_state: BatchState,
    error: Option<String>,
}

impl MediaForm {
    pub fn new(config: &UploadConfig) -> Self {
        Self::with_media(Vec::new(), String::new(), config)
    }

    /// 用已有记录中的媒体初始化
    pub fn with_media(gallery: Vec<String>, cover: String, config: &UploadConfig) -> Self {
        // 后端数据可能超过当前配置的容量，保留但不再允许追加
        Self {
            gallery: MediaCollection::with_items(gallery, config.gallery_max),
            cover,
            gallery_state: BatchState::Idle,
            cover_state: BatchState::Idle,
            error: None,
        }
    }

    pub fn gallery(&self) -> &[String] {
        self.gallery.as_slice()
    }

    pub fn cover(&self) -> &str {
        &self.cover
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn gallery_state(&self) -> BatchState {
        self.gallery_state
    }

    pub fn cover_state(&self) -> BatchState {
        self.cover_state
    }

    pub fn is_uploading(&self) -> bool {
        self.gallery_state == BatchState::InFlight || self.cover_state == BatchState::InFlight
    }

    pub fn append_to_gallery(&mut self, references: Vec<String>) -> Result<()> {
        self.gallery.append(references)
    }

    pub fn remove_from_gallery(&mut self, index: usize) {
        if let Some(removed) = self.gallery.remove(index) {
            debug!(index, %removed, "removed gallery entry");
        }
    }

    pub fn set_cover(&mut self, reference: impl Into<String>) {
        self.cover = reference.into();
    }

    pub fn clear_cover(&mut self) {
        self.cover.clear();
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// 上传一批图集图片，成功后按提交顺序追加
    pub async fn upload_gallery(
        &mut self,
        coordinator: &BatchCoordinator,
        payloads: Vec<MediaPayload>,
    ) -> Result<()> {
        self.error = None;
        self.gallery_state = BatchState::Idle;

        if let Err(err) = coordinator.admit(MediaSlot::Gallery, self.gallery.len(), payloads.len()) {
            return Err(self.record_failure(MediaSlot::Gallery, err));
        }
        self.gallery_state = BatchState::AdmissionChecked;

        self.gallery_state = BatchState::InFlight;
        let result = coordinator
            .submit_batch(MediaSlot::Gallery, self.gallery.len(), payloads)
            .await
            .and_then(|urls| self.gallery.append(urls));

        match result {
            Ok(()) => {
                self.gallery_state = BatchState::AllSucceeded;
                info!(gallery_len = self.gallery.len(), "gallery updated");
                Ok(())
            }
            Err(err) => Err(self.record_failure(MediaSlot::Gallery, err)),
        }
    }

    /// 上传封面；`payload` 为空时按准入失败处理
    pub async fn upload_cover(
        &mut self,
        coordinator: &BatchCoordinator,
        payload: Option<MediaPayload>,
    ) -> Result<()> {
        self.error = None;
        self.cover_state = BatchState::Idle;

        let payloads: Vec<MediaPayload> = payload.into_iter().collect();
        // 封面是替换而不是追加，已有封面不计入容量
        if let Err(err) = coordinator.admit(MediaSlot::Cover, 0, payloads.len()) {
            return Err(self.record_failure(MediaSlot::Cover, err));
        }
        self.cover_state = BatchState::AdmissionChecked;

        self.cover_state = BatchState::InFlight;
        match coordinator.submit_batch(MediaSlot::Cover, 0, payloads).await {
            Ok(mut urls) => match urls.pop() {
                Some(url) => {
                    self.set_cover(url);
                    self.cover_state = BatchState::AllSucceeded;
                    Ok(())
                }
                None => Err(self.record_failure(
                    MediaSlot::Cover,
                    UploadError::internal_error("cover batch returned no reference"),
                )),
            },
            Err(err) => Err(self.record_failure(MediaSlot::Cover, err)),
        }
    }

    fn record_failure(&mut self, slot: MediaSlot, err: UploadError) -> UploadError {
        match slot {
            MediaSlot::Gallery => self.gallery_state = BatchState::AnyFailed,
            MediaSlot::Cover => self.cover_state = BatchState::AnyFailed,
        }
        self.error = Some(err.user_message());
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gallery(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://cdn.example.com/{}.png", i)).collect()
    }

    #[test]
    fn test_remove_shifts_entries() {
        let mut form = MediaForm::with_media(gallery(3), String::new(), &UploadConfig::default());
        form.remove_from_gallery(1);

        assert_eq!(form.gallery(), &[
            "https://cdn.example.com/0.png".to_string(),
            "https://cdn.example.com/2.png".to_string(),
        ]);
    }

    #[test]
    fn test_remove_out_of_range_is_noop() {
        let mut form = MediaForm::with_media(gallery(2), String::new(), &UploadConfig::default());
        form.remove_from_gallery(5);
        assert_eq!(form.gallery().len(), 2);
    }

    #[test]
    fn test_append_respects_capacity() {
        let mut form = MediaForm::with_media(gallery(5), String::new(), &UploadConfig::default());

        assert!(form.append_to_gallery(gallery(2)).is_err());
        assert_eq!(form.gallery().len(), 5);

        assert!(form.append_to_gallery(vec!["x".to_string()]).is_ok());
        assert_eq!(form.gallery().last().map(String::as_str), Some("x"));
    }

    #[test]
    fn test_cover_set_and_clear() {
        let mut form = MediaForm::new(&UploadConfig::default());
        assert_eq!(form.cover(), "");

        form.set_cover("https://cdn.example.com/cover.png");
        assert_eq!(form.cover(), "https://cdn.example.com/cover.png");

        form.clear_cover();
        assert_eq!(form.cover(), "");
    }

    #[test]
    fn test_oversized_existing_gallery_is_kept() {
        let form = MediaForm::with_media(gallery(8), String::new(), &UploadConfig::default());
        assert_eq!(form.gallery().len(), 8);
    }
}
