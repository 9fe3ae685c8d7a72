use async_trait::async_trait;
use super::errors::TransportError;
use super::progress::ProgressSink;
use super::types::MediaPayload;

/// 远程对象存储 - 所有存储实现都必须实现此接口
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 把 payload 写入 `key`，成功后返回可访问的 URL。
    ///
    /// 实现需要通过 `progress` 上报已发送的字节数；失败时不返回任何部分结果。
    async fn put(&self, key: &str, payload: MediaPayload, progress: ProgressSink)
        -> Result<String, TransportError>;

    /// 单个对象的大小上限
    fn max_object_bytes(&self) -> Option<u64> {
        None
    }

    /// 存储名称（日志用）
    fn name(&self) -> &str;
}
