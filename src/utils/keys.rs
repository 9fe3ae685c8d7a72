use chrono::{DateTime, Utc};
use crate::core::UploadId;

/// 生成对象存储的目标 key：`{毫秒时间戳}-{任务短 ID}-{文件名}`
///
/// 同一毫秒内上传同名文件也不会冲突。
pub fn destination_key(name: &str, upload_id: UploadId, now: DateTime<Utc>) -> String {
    format!("{}-{}-{}", now.timestamp_millis(), upload_id.short(), sanitize_name(name))
}

/// 只保留 ASCII 字母数字和 `.-_`，其余替换为 `_`
pub fn sanitize_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let sanitized: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();

    if sanitized.is_empty() {
        "file".to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_destination_key_layout() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let id = UploadId::new();
        let key = destination_key("foto praia.jpg", id, now);

        assert_eq!(key, format!("1700000000123-{}-foto_praia.jpg", id.short()));
    }

    #[test]
    fn test_same_name_same_instant_differs() {
        let now = Utc::now();
        assert_ne!(
            destination_key("a.png", UploadId::new(), now),
            destination_key("a.png", UploadId::new(), now)
        );
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_name("Serviços.png"), "Servi_os.png");
        assert_eq!(sanitize_name(""), "file");
    }
}
