use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Body, Client, StatusCode};
use std::io::Cursor;
use tokio_util::io::ReaderStream;
use url::Url;
use crate::config::StorageConfig;
use crate::core::{MediaPayload, ObjectStore, ProgressSink, ProgressStream, Result, TransportError};

/// 基于 HTTP PUT 的对象存储
pub struct HttpObjectStore {
    client: Client,
    endpoint: Url,
    public_base: Option<Url>,
    token: Option<String>,
    chunk_size: usize,
    max_object_bytes: Option<u64>,
}

impl HttpObjectStore {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()?;

        let public_base = match &config.public_base {
            Some(base) => Some(Url::parse(&with_trailing_slash(base))?),
            None => None,
        };

        Ok(Self {
            client,
            endpoint: Url::parse(&with_trailing_slash(&config.endpoint))?,
            public_base,
            token: config.token.clone(),
            chunk_size: config.chunk_size.max(1),
            max_object_bytes: config.max_object_bytes,
        })
    }

    /// 对象上传成功后对外暴露的地址
    pub fn public_url(&self, key: &str) -> std::result::Result<Url, url::ParseError> {
        self.public_base.as_ref().unwrap_or(&self.endpoint).join(key)
    }
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, key: &str, payload: MediaPayload, progress: ProgressSink)
        -> std::result::Result<String, TransportError>
    {
        let target = self.endpoint
            .join(key)
            .map_err(|err| TransportError::Network(err.to_string()))?;
        let size = payload.size();

        // 按块读取请求体，每块上报一次进度
        let stream = ReaderStream::with_capacity(Cursor::new(payload.data), self.chunk_size);
        let body = Body::wrap_stream(ProgressStream::new(stream, progress));

        let mut request = self.client
            .put(target.clone())
            .header(CONTENT_LENGTH, size)
            .body(body);

        if let Some(content_type) = &payload.content_type {
            request = request.header(CONTENT_TYPE, content_type);
        }
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::PAYLOAD_TOO_LARGE {
            if let Some(limit) = self.max_object_bytes {
                return Err(TransportError::SizeLimit { size, limit });
            }
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TransportError::rejected(status.as_u16(), message));
        }

        // 优先使用服务端返回的地址
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        match location {
            Some(url) => Ok(url),
            None => self
                .public_url(key)
                .map(String::from)
                .map_err(|err| TransportError::Network(err.to_string())),
        }
    }

    fn max_object_bytes(&self) -> Option<u64> {
        self.max_object_bytes
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_prefers_public_base() {
        let config = StorageConfig {
            endpoint: "https://storage.example.com/upload".to_string(),
            public_base: Some("https://cdn.example.com/media".to_string()),
            ..Default::default()
        };
        let store = HttpObjectStore::new(&config).unwrap();

        assert_eq!(
            store.public_url("1-abc-a.png").unwrap().as_str(),
            "https://cdn.example.com/media/1-abc-a.png"
        );
    }

    #[test]
    fn test_public_url_falls_back_to_endpoint() {
        let config = StorageConfig {
            endpoint: "https://storage.example.com/upload/".to_string(),
            ..Default::default()
        };
        let store = HttpObjectStore::new(&config).unwrap();

        assert_eq!(
            store.public_url("k.png").unwrap().as_str(),
            "https://storage.example.com/upload/k.png"
        );
        assert_eq!(store.max_object_bytes(), Some(2 * 1024 * 1024));
    }

    #[test]
    fn test_invalid_endpoint() {
        let config = StorageConfig {
            endpoint: "not a url".to_string(),
            ..Default::default()
        };
        assert!(HttpObjectStore::new(&config).is_err());
    }
}
