use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use crate::core::{Result, UploadConfig};

/// 存储后端类型
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    #[default]
    Http,
    Memory,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub kind: StorageKind,
    /// 上传地址，对象 key 拼接在其后
    pub endpoint: String,
    /// 对外访问地址，缺省时使用上传地址
    pub public_base: Option<String>,
    pub token: Option<String>,
    pub chunk_size: usize,
    pub max_object_bytes: Option<u64>,
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Http,
            endpoint: "http://localhost:9000/media/".to_string(),
            public_base: None,
            token: None,
            chunk_size: 64 * 1024,
            max_object_bytes: Some(2 * 1024 * 1024),
            timeout_secs: 300,
        }
    }
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api/".to_string(),
            token: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ListingConfig {
    /// 电话号码国家区号前缀
    pub phone_prefix: String,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            phone_prefix: "258".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub log_filter: String,
    pub storage: StorageConfig,
    pub api: ApiConfig,
    pub upload: UploadConfig,
    pub listing: ListingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            storage: StorageConfig::default(),
            api: ApiConfig::default(),
            upload: UploadConfig::default(),
            listing: ListingConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Config> {
        Ok(toml::from_str(content)?)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_toml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ProgressMode;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.upload.gallery_max, 6);
        assert_eq!(config.upload.cover_max, 1);
        assert_eq!(config.listing.phone_prefix, "258");
        assert_eq!(config.storage.kind, StorageKind::Http);
    }

    #[test]
    fn test_partial_config() {
        let config = Config::from_toml(r#"
            log_filter = "debug"

            [storage]
            kind = "memory"
            endpoint = "mem://bucket"
            max_object_bytes = 4194304

            [upload]
            progress_mode = "weighted"
        "#).unwrap();

        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.storage.kind, StorageKind::Memory);
        assert_eq!(config.storage.max_object_bytes, Some(4 * 1024 * 1024));
        assert_eq!(config.storage.chunk_size, 64 * 1024);
        assert_eq!(config.upload.progress_mode, ProgressMode::Weighted);
        assert_eq!(config.upload.gallery_max, 6);
    }

    #[test]
    fn test_invalid_config() {
        assert!(Config::from_toml("[upload]\ngallery_max = \"six\"").is_err());
    }
}
