use tracing::{info, warn};
use crate::api::ListingApi;
use crate::config::Config;
use crate::core::{BatchCoordinator, MediaForm, MediaPayload, Result, UploadConfig, UploadError};
use super::types::{normalize_phone, Category, City, CurrentUser, ServiceRecord};

const NAME_MIN_CHARS: usize = 10;
const NAME_MAX_CHARS: usize = 62;

/// 服务编辑表单
///
/// 持有记录字段和媒体状态；`service_id` 为空时提交会创建新记录。
pub struct ServiceEditor {
    service_id: Option<String>,
    record: ServiceRecord,
    media: MediaForm,
    upload_config: UploadConfig,
    phone_prefix: String,
    loading: bool,
    error: Option<String>,
}

impl ServiceEditor {
    /// 新建服务的空表单
    pub fn new(config: &Config) -> Self {
        Self {
            service_id: None,
            record: ServiceRecord::default(),
            media: MediaForm::new(&config.upload),
            upload_config: config.upload.clone(),
            phone_prefix: config.listing.phone_prefix.clone(),
            loading: false,
            error: None,
        }
    }

    /// 加载已有服务
    pub async fn load(api: &dyn ListingApi, service_id: &str, config: &Config) -> Result<Self> {
        let record = api.get_service(service_id).await?;
        info!(service_id, images = record.image_urls.len(), "service loaded");

        let media = MediaForm::with_media(record.image_urls.clone(), record.cover_img.clone(), &config.upload);
        Ok(Self {
            service_id: Some(service_id.to_string()),
            record,
            media,
            upload_config: config.upload.clone(),
            phone_prefix: config.listing.phone_prefix.clone(),
            loading: false,
            error: None,
        })
    }

    pub fn service_id(&self) -> Option<&str> {
        self.service_id.as_deref()
    }

    pub fn record(&self) -> &ServiceRecord {
        &self.record
    }

    pub fn media(&self) -> &MediaForm {
        &self.media
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// 提交中或上传中时不允许再次提交
    pub fn can_submit(&self) -> bool {
        !self.loading && !self.media.is_uploading()
    }

    /// 最近一次的错误：提交错误优先，其次是上传错误
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref().or(self.media.error())
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.record.name = name.into();
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.record.title = title.into();
    }

    pub fn set_city(&mut self, city: City) {
        self.record.city = city;
    }

    pub fn set_category(&mut self, category: Category) {
        self.record.category = category;
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.record.description = description.into();
    }

    pub fn set_phone(&mut self, raw: &str) {
        self.record.phone = normalize_phone(raw, &self.phone_prefix);
    }

    pub async fn upload_gallery(&mut self, coordinator: &BatchCoordinator, payloads: Vec<MediaPayload>) -> Result<()> {
        self.media.upload_gallery(coordinator, payloads).await
    }

    pub async fn upload_cover(&mut self, coordinator: &BatchCoordinator, payload: Option<MediaPayload>) -> Result<()> {
        self.media.upload_cover(coordinator, payload).await
    }

    pub fn remove_image(&mut self, index: usize) {
        self.media.remove_from_gallery(index);
    }

    pub fn remove_cover(&mut self) {
        self.media.clear_cover();
    }

    pub fn validate(&self) -> Result<()> {
        let name_chars = self.record.name.trim().chars().count();
        if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&name_chars) {
            return Err(UploadError::Validation(format!(
                "Name must be between {} and {} characters",
                NAME_MIN_CHARS, NAME_MAX_CHARS
            )));
        }
        if self.record.title.trim().is_empty() {
            return Err(UploadError::Validation("Title is required".to_string()));
        }
        if self.record.description.trim().is_empty() {
            return Err(UploadError::Validation("Description is required".to_string()));
        }
        let phone = normalize_phone(&self.record.phone, &self.phone_prefix);
        if phone.len() <= self.phone_prefix.len() {
            return Err(UploadError::Validation("Phone number is required".to_string()));
        }
        if self.media.gallery().is_empty() {
            return Err(UploadError::Validation("You must upload at least one image".to_string()));
        }
        if self.media.gallery().len() > self.upload_config.gallery_max {
            return Err(UploadError::Validation(format!(
                "You can only upload {} images per service",
                self.upload_config.gallery_max
            )));
        }

        Ok(())
    }

    /// 合并表单状态，生成要提交的完整记录
    pub fn build_record(&self, user: &CurrentUser) -> ServiceRecord {
        let mut record = self.record.clone();
        record.phone = normalize_phone(&record.phone, &self.phone_prefix);
        record.image_urls = self.media.gallery().to_vec();
        record.cover_img = self.media.cover().to_string();
        record.user_ref = Some(user.id.clone());
        record
    }

    /// 提交表单
    pub async fn submit(&mut self, api: &dyn ListingApi, user: &CurrentUser) -> Result<ServiceRecord> {
        if let Err(err) = self.validate() {
            self.error = Some(err.user_message());
            return Err(err);
        }

        self.loading = true;
        self.error = None;

        let record = self.build_record(user);
        let result = match &self.service_id {
            Some(service_id) => api.update_service(service_id, &record).await,
            None => api.create_service(&record).await,
        };
        self.loading = false;

        match result {
            Ok(saved) => {
                info!(service_id = ?saved.id, "service saved");
                if self.service_id.is_none() {
                    self.service_id = saved.id.clone();
                }
                self.record = saved.clone();
                // 之前失败的上传已不影响保存结果
                self.media.clear_error();
                Ok(saved)
            }
            Err(err) => {
                warn!(error = %err, "service submit failed");
                self.error = Some(err.user_message());
                Err(err)
            }
        }
    }
}
