use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use reqwest::Url;
use thiserror::Error;

use crate::ranges::BlockRange;

mod http;
#[cfg(test)]
pub mod mock;

pub use http::HttpTransport;

pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Classified transport failures, one variant per failure the session error
/// codes distinguish. `ErrorCode` maps these 1:1 into its numeric bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    ConnectionRefused,
    RemoteHostClosed,
    HostNotFound,
    TimedOut,
    SslHandshake,
    TemporaryFailure,
    TooManyRedirects,
    UnknownNetwork,

    ProxyConnectionRefused,
    ProxyConnectionClosed,
    ProxyNotFound,
    ProxyTimedOut,
    ProxyAuthenticationRequired,
    UnknownProxy,

    AccessDenied,
    NotFound,
    AuthenticationRequired,
    Conflict,
    Gone,
    UnknownContent,

    ProtocolUnknown,
    InvalidOperation,
    ProtocolFailure,

    InternalServerError,
    NotImplemented,
    ServiceUnavailable,
    UnknownServer,
}

#[derive(Debug, Clone, Error)]
#[error("{detail}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub detail: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// What a HEAD request against the target tells us up front: the advertised
/// size (if any) and whether the server claims to honor byte ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeInfo {
    pub content_length: Option<u64>,
    pub accepts_ranges: bool,
}

/// Seam between the download session and the actual HTTP stack, so sessions
/// can be driven by a scripted transport in tests.
///
/// `fetch` with `Some(range)` must send `Range: bytes=<from>-<to>` and yield
/// only that slice; with `None` it streams the whole body. Redirects are
/// followed by the implementation, not surfaced to the caller.
#[async_trait]
pub trait RangeTransport: Clone + Send + Sync + 'static {
    async fn fetch(
        &self,
        url: Url,
        range: Option<BlockRange>,
    ) -> Result<ByteStream, TransportError>;

    async fn probe(&self, url: Url) -> Result<ProbeInfo, TransportError>;
}
