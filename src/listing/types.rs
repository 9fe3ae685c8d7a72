use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 服务所在城市
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum City {
    /// 未选择
    #[default]
    #[serde(rename = "All")]
    Unselected,
    Pemba,
    Lichinga,
    Nampula,
    Nacala,
    Quelimane,
    Tete,
    Moatize,
    Chimoio,
    Beira,
    Dondo,
    Maxixe,
    Inhambane,
    #[serde(rename = "Xai-Xai")]
    XaiXai,
    Maputo,
    Matola,
}

/// 服务分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum Category {
    /// 未选择
    #[default]
    #[serde(rename = "All")]
    Unselected,
    #[serde(rename = "Assistência Técnica")]
    TechnicalAssistance,
    #[serde(rename = "Aulas")]
    Classes,
    #[serde(rename = "Design e Tecnologia")]
    DesignAndTechnology,
    #[serde(rename = "Eventos")]
    Events,
    #[serde(rename = "Reformas")]
    Renovations,
    #[serde(rename = "Serviços Domésticos")]
    HomeServices,
    #[serde(rename = "Outros")]
    Other,
}

/// 后端保存的服务记录
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub city: City,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cover_img: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ref: Option<String>,
    /// 其余后端字段（时间戳等）原样保留
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 当前登录用户，提交时显式传入
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
}

impl CurrentUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// 只保留数字，并在缺少国家区号时补上
pub fn normalize_phone(raw: &str, prefix: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.starts_with(prefix) {
        digits
    } else {
        format!("{}{}", prefix, digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("84 123 4567", "258"), "258841234567");
        assert_eq!(normalize_phone("+258 84-123-4567", "258"), "258841234567");
        assert_eq!(normalize_phone("258841234567", "258"), "258841234567");
        assert_eq!(normalize_phone("", "258"), "258");
    }

    #[test]
    fn test_record_wire_format() {
        let json = serde_json::json!({
            "_id": "abc123",
            "name": "Canalizador em Maputo",
            "title": "Reparações",
            "city": "Xai-Xai",
            "category": "Serviços Domésticos",
            "phone": "258841234567",
            "description": "Serviço rápido",
            "coverImg": "https://cdn.example.com/c.png",
            "imageUrls": ["https://cdn.example.com/1.png"],
            "userRef": "u1",
            "createdAt": "2024-01-01T00:00:00Z"
        });

        let record: ServiceRecord = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(record.id.as_deref(), Some("abc123"));
        assert_eq!(record.city, City::XaiXai);
        assert_eq!(record.category, Category::HomeServices);
        assert_eq!(record.image_urls.len(), 1);
        assert!(record.extra.contains_key("createdAt"));

        assert_eq!(serde_json::to_value(&record).unwrap(), json);
    }

    #[test]
    fn test_missing_fields_default() {
        let record: ServiceRecord = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert_eq!(record.city, City::Unselected);
        assert_eq!(record.cover_img, "");
        assert!(record.image_urls.is_empty());
    }
}
