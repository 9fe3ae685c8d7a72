use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;
use crate::config::ApiConfig;
use crate::core::{Result, UploadError};
use crate::listing::ServiceRecord;

/// 后端服务接口
#[async_trait]
pub trait ListingApi: Send + Sync {
    /// `GET /service/get/:id`
    async fn get_service(&self, service_id: &str) -> Result<ServiceRecord>;

    /// `POST /service/update/:id`，请求体是完整的记录
    async fn update_service(&self, service_id: &str, record: &ServiceRecord) -> Result<ServiceRecord>;

    /// `POST /service/create`
    async fn create_service(&self, record: &ServiceRecord) -> Result<ServiceRecord>;
}

/// 解析后端响应
///
/// - `{success: false, message}` 视为拒绝
/// - `{success: true, record}` 取 `record`
/// - 其它对象直接当作记录
pub fn parse_envelope(value: Value) -> Result<ServiceRecord> {
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Request failed")
            .to_string();
        return Err(UploadError::backend_rejection(message));
    }

    let record = match value {
        Value::Object(mut map) if map.contains_key("record") => {
            map.remove("record").unwrap_or(Value::Null)
        }
        Value::Object(mut map) => {
            map.remove("success");
            Value::Object(map)
        }
        other => {
            return Err(UploadError::backend_rejection(format!("Unexpected response: {}", other)));
        }
    };

    Ok(serde_json::from_value(record)?)
}

pub struct HttpListingApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpListingApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base = if config.base_url.ends_with('/') {
            config.base_url.clone()
        } else {
            format!("{}/", config.base_url)
        };

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
            token: config.token.clone(),
        })
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// `service/<action>/<id>`，id 作为单个路径段编码，`/` 和 `?` 不会改变路由
    pub fn service_endpoint(&self, action: &str, service_id: &str) -> Result<Url> {
        if matches!(service_id, "" | "." | "..") {
            return Err(UploadError::Validation(format!("Invalid service id: {:?}", service_id)));
        }

        let mut url = self.endpoint(&format!("service/{}/", action))?;
        url.path_segments_mut()
            .map_err(|_| UploadError::internal_error("listing api base url cannot hold a path"))?
            .pop_if_empty()
            .push(service_id);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<ServiceRecord> {
        let request = match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        let value: Value = response.json().await?;

        let result = parse_envelope(value);
        if let Err(err) = &result {
            warn!(status = status.as_u16(), error = %err, "listing request failed");
        }
        result
    }
}

#[async_trait]
impl ListingApi for HttpListingApi {
    async fn get_service(&self, service_id: &str) -> Result<ServiceRecord> {
        let url = self.service_endpoint("get", service_id)?;
        debug!(%url, "fetching service");
        self.send(self.client.get(url)).await
    }

    async fn update_service(&self, service_id: &str, record: &ServiceRecord) -> Result<ServiceRecord> {
        let url = self.service_endpoint("update", service_id)?;
        debug!(%url, "updating service");
        self.send(self.client.post(url).json(record)).await
    }

    async fn create_service(&self, record: &ServiceRecord) -> Result<ServiceRecord> {
        let url = self.endpoint("service/create")?;
        debug!(%url, "creating service");
        self.send(self.client.post(url).json(record)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejection_envelope() {
        let err = parse_envelope(json!({"success": false, "message": "Service not found!"})).unwrap_err();
        assert!(matches!(err, UploadError::BackendRejection { .. }));
        assert_eq!(err.user_message(), "Service not found!");
    }

    #[test]
    fn test_record_envelope() {
        let record = parse_envelope(json!({"success": true, "record": {"_id": "s1", "name": "Aulas de piano"}})).unwrap();
        assert_eq!(record.id.as_deref(), Some("s1"));
        assert_eq!(record.name, "Aulas de piano");
    }

    #[test]
    fn test_bare_record() {
        let record = parse_envelope(json!({"_id": "s2", "imageUrls": ["a", "b"]})).unwrap();
        assert_eq!(record.id.as_deref(), Some("s2"));
        assert_eq!(record.image_urls, vec!["a".to_string(), "b".to_string()]);
        assert!(!record.extra.contains_key("success"));
    }

    #[test]
    fn test_non_object_response() {
        assert!(parse_envelope(json!("oops")).is_err());
    }

    #[test]
    fn test_endpoint_join() {
        let api = HttpListingApi::new(&ApiConfig {
            base_url: "https://example.com/api".to_string(),
            ..Default::default()
        }).unwrap();

        assert_eq!(
            api.endpoint("service/get/42").unwrap().as_str(),
            "https://example.com/api/service/get/42"
        );
    }

    #[test]
    fn test_service_id_stays_in_one_segment() {
        let api = HttpListingApi::new(&ApiConfig {
            base_url: "https://example.com/api/".to_string(),
            ..Default::default()
        }).unwrap();

        assert_eq!(
            api.service_endpoint("get", "42").unwrap().as_str(),
            "https://example.com/api/service/get/42"
        );

        for id in ["../update/victim", "a/b", "x?delete=1", "../../admin", "a#frag"] {
            let url = api.service_endpoint("get", id).unwrap();
            let segments: Vec<&str> = url.path_segments().unwrap().collect();

            assert_eq!(segments.len(), 4, "{} -> {}", id, url);
            assert_eq!(&segments[..3], &["api", "service", "get"]);
            assert!(url.query().is_none());
            assert!(url.fragment().is_none());
        }

        let url = api.service_endpoint("update", "../update/victim").unwrap();
        assert_eq!(url.path(), "/api/service/update/..%2Fupdate%2Fvictim");
    }

    #[test]
    fn test_dot_service_ids_are_rejected() {
        let api = HttpListingApi::new(&ApiConfig::default()).unwrap();
        for id in ["", ".", ".."] {
            assert!(matches!(api.service_endpoint("get", id), Err(UploadError::Validation(_))));
        }
    }
}
