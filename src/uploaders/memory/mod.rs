use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use crate::core::{MediaPayload, ObjectStore, ProgressSink, TransportError};

/// 内存对象存储
///
/// 用于本地演示和测试：可以按文件名注入延迟和失败，并统计调用次数。
pub struct MemoryObjectStore {
    base_url: String,
    objects: RwLock<HashMap<String, Bytes>>,
    chunk_size: usize,
    chunk_delay: Duration,
    delays: HashMap<String, Duration>,
    failures: HashSet<String>,
    max_object_bytes: Option<u64>,
    put_count: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            objects: RwLock::new(HashMap::new()),
            chunk_size: 16 * 1024,
            chunk_delay: Duration::ZERO,
            delays: HashMap::new(),
            failures: HashSet::new(),
            max_object_bytes: None,
            put_count: AtomicUsize::new(0),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// 每块之间的等待时间
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// 指定文件在开始传输前等待
    pub fn with_delay_for(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    /// 指定文件上传失败
    pub fn with_failure(mut self, name: &str) -> Self {
        self.failures.insert(name.to_string());
        self
    }

    pub fn with_max_object_bytes(mut self, limit: u64) -> Self {
        self.max_object_bytes = Some(limit);
        self
    }

    /// `put` 被调用的次数
    pub fn put_count(&self) -> usize {
        self.put_count.load(Ordering::SeqCst)
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, payload: MediaPayload, progress: ProgressSink)
        -> Result<String, TransportError>
    {
        self.put_count.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(&payload.name) {
            tokio::time::sleep(*delay).await;
        }

        let size = payload.size();
        if let Some(limit) = self.max_object_bytes {
            if size > limit {
                return Err(TransportError::SizeLimit { size, limit });
            }
        }

        let mut sent = 0u64;
        progress.report(0);
        for chunk in payload.data.chunks(self.chunk_size) {
            if !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            } else {
                tokio::task::yield_now().await;
            }
            sent += chunk.len() as u64;
            progress.report(sent);

            // 传到一半断开
            if self.failures.contains(&payload.name) && sent * 2 >= size {
                return Err(TransportError::Network(format!("connection reset while sending {}", payload.name)));
            }
        }

        if self.failures.contains(&payload.name) {
            return Err(TransportError::Network(format!("connection reset while sending {}", payload.name)));
        }

        self.objects.write().await.insert(key.to_string(), payload.data);
        Ok(self.url_for(key))
    }

    fn max_object_bytes(&self) -> Option<u64> {
        self.max_object_bytes
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_stores_object() {
        let store = MemoryObjectStore::new("mem://bucket/").with_chunk_size(4);
        let sink = ProgressSink::detached(10);

        let url = store.put("k1", MediaPayload::new("a.png", vec![1u8; 10]), sink.clone()).await.unwrap();

        assert_eq!(url, "mem://bucket/k1");
        assert_eq!(store.put_count(), 1);
        assert_eq!(store.object("k1").await.map(|b| b.len()), Some(10));
        assert_eq!(store.keys().await, vec!["k1".to_string()]);
        assert_eq!(sink.bytes_uploaded(), 10);
    }

    #[tokio::test]
    async fn test_injected_failure_keeps_nothing() {
        let store = MemoryObjectStore::new("mem://bucket").with_failure("bad.png");
        let sink = ProgressSink::detached(10);

        let result = store.put("k1", MediaPayload::new("bad.png", vec![1u8; 10]), sink).await;

        assert!(matches!(result, Err(TransportError::Network(_))));
        assert_eq!(store.object_count().await, 0);
    }
}
