use std::pin::Pin;
use std::task::{Context, Poll};
use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use super::progress::ProgressSink;

pin_project! {
    /// 包装请求体的字节流，每读出一块就上报累计字节数
    pub struct ProgressStream<S> {
        #[pin]
        inner: S,
        sink: ProgressSink,
        bytes_sent: u64,
    }
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, sink: ProgressSink) -> Self {
        sink.report(0);
        Self {
            inner,
            sink,
            bytes_sent: 0,
        }
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = std::io::Result<Bytes>>
{
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if !chunk.is_empty() {
                    *this.bytes_sent += chunk.len() as u64;
                    this.sink.report(*this.bytes_sent);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::io::Cursor;
    use tokio_util::io::ReaderStream;

    #[tokio::test]
    async fn test_stream_reports_each_chunk() {
        let data = vec![7u8; 10];
        let sink = ProgressSink::detached(10);
        let inner = ReaderStream::with_capacity(Cursor::new(data), 4);
        let stream = ProgressStream::new(inner, sink.clone());

        let chunks: Vec<_> = stream.collect().await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(sink.bytes_uploaded(), 10);
        assert_eq!(sink.fraction(), 1.0);
    }
}
