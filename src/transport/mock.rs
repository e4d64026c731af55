use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use reqwest::Url;

use super::{ByteStream, ProbeInfo, RangeTransport, TransportError, TransportErrorKind};
use crate::ranges::BlockRange;

/// Scripted reply for one range, so session tests can dictate exactly what
/// the wire does without a server.
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream these chunks, then end cleanly.
    Chunks(Vec<Bytes>),
    /// Fail the fetch call itself, before any bytes flow.
    Refuse(TransportErrorKind),
    /// Stream the chunks, then fail mid body.
    FailAfter(Vec<Bytes>, TransportErrorKind),
    /// Never yield anything. The stream stays pending until the request is
    /// torn down, which is how cancellation races are exercised.
    Stall,
}

#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    scripts: HashMap<Option<BlockRange>, Script>,
    probe: Option<ProbeInfo>,
    fetches: Vec<(Url, Option<BlockRange>)>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, range: Option<BlockRange>, script: Script) {
        self.inner.lock().unwrap().scripts.insert(range, script);
    }

    pub fn script_probe(&self, probe: ProbeInfo) {
        self.inner.lock().unwrap().probe = Some(probe);
    }

    /// Every fetch the session issued, in call order.
    pub fn fetches(&self) -> Vec<(Url, Option<BlockRange>)> {
        self.inner.lock().unwrap().fetches.clone()
    }
}

#[async_trait]
impl RangeTransport for MockTransport {
    async fn fetch(
        &self,
        url: Url,
        range: Option<BlockRange>,
    ) -> Result<ByteStream, TransportError> {
        let script = {
            let mut inner = self.inner.lock().unwrap();
            inner.fetches.push((url, range));
            inner
                .scripts
                .get(&range)
                .cloned()
                .unwrap_or_else(|| panic!("no script for range {range:?}"))
        };

        match script {
            Script::Chunks(chunks) => {
                Ok(stream::iter(chunks.into_iter().map(Ok)).boxed())
            }
            Script::Refuse(kind) => Err(TransportError::new(kind, "scripted refusal")),
            Script::FailAfter(chunks, kind) => {
                let mut items: Vec<Result<Bytes, TransportError>> =
                    chunks.into_iter().map(Ok).collect();
                items.push(Err(TransportError::new(kind, "scripted mid-body failure")));
                Ok(stream::iter(items).boxed())
            }
            Script::Stall => Ok(stream::pending().boxed()),
        }
    }

    async fn probe(&self, _url: Url) -> Result<ProbeInfo, TransportError> {
        self.inner
            .lock()
            .unwrap()
            .probe
            .ok_or_else(|| TransportError::new(TransportErrorKind::NotImplemented, "no probe scripted"))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn scripted_chunks_come_back_in_order() {
        let transport = MockTransport::new();
        let range = BlockRange::new(0, 7).unwrap();
        transport.script(
            Some(range),
            Script::Chunks(vec![Bytes::from_static(b"abcd"), Bytes::from_static(b"efgh")]),
        );

        let url: Url = "http://example.test/delta".parse().unwrap();
        let mut stream = transport.fetch(url.clone(), Some(range)).await.unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap(), "abcd");
        assert_eq!(stream.next().await.unwrap().unwrap(), "efgh");
        assert!(stream.next().await.is_none());
        assert_eq!(transport.fetches(), vec![(url, Some(range))]);
    }

    #[rstest]
    #[tokio::test]
    async fn refusal_fails_the_fetch_call() {
        let transport = MockTransport::new();
        transport.script(None, Script::Refuse(TransportErrorKind::ConnectionRefused));

        let url: Url = "http://example.test/delta".parse().unwrap();
        // the ok side holds a stream with no Debug impl, so unwrap the
        // error without formatting it
        let err = transport.fetch(url, None).await.err().unwrap();
        assert_eq!(err.kind, TransportErrorKind::ConnectionRefused);
    }
}
