use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, RANGE};
use reqwest::{redirect, Client, StatusCode, Url};

use super::{ByteStream, ProbeInfo, RangeTransport, TransportError, TransportErrorKind};
use crate::ranges::BlockRange;

/// Live transport backed by a pooled reqwest client. Redirects are followed
/// up to a fixed depth; connection reuse across the per-range requests comes
/// from the shared pool. No timeouts are set here, timeout policy belongs to
/// whoever drives the session.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    const MAX_REDIRECTS: usize = 10;

    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .redirect(redirect::Policy::limited(Self::MAX_REDIRECTS))
            .pool_max_idle_per_host(8)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RangeTransport for HttpTransport {
    async fn fetch(
        &self,
        url: Url,
        range: Option<BlockRange>,
    ) -> Result<ByteStream, TransportError> {
        let mut request = self.client.get(url.clone());
        if let Some(range) = range {
            request = request.header(RANGE, range.header_value());
        }

        let response = request
            .send()
            .await
            .map_err(|err| TransportError::new(classify_reqwest_error(&err), err.to_string()))?;

        let status = response.status();
        if let Some(kind) = check_status(status, range.is_some()) {
            return Err(TransportError::new(
                kind,
                format!("{url} answered {status}"),
            ));
        }

        let stream = response
            .bytes_stream()
            .map_err(|err| TransportError::new(classify_reqwest_error(&err), err.to_string()))
            .boxed();
        Ok(stream)
    }

    async fn probe(&self, url: Url) -> Result<ProbeInfo, TransportError> {
        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(|err| TransportError::new(classify_reqwest_error(&err), err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::new(
                classify_status(status),
                format!("HEAD {url} answered {status}"),
            ));
        }

        let headers = response.headers();
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok());
        let accepts_ranges = headers
            .get(ACCEPT_RANGES)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.eq_ignore_ascii_case("bytes"));

        Ok(ProbeInfo {
            content_length,
            accepts_ranges,
        })
    }
}

/// Accept or reject a reply status. Ranged requests must come back as 206
/// partial content: a server that ignores the range header answers 200 with
/// the whole file, and delivering a prefix of that as the requested slice
/// would corrupt the target.
pub(crate) fn check_status(status: StatusCode, ranged: bool) -> Option<TransportErrorKind> {
    if !status.is_success() {
        return Some(classify_status(status));
    }
    if ranged && status != StatusCode::PARTIAL_CONTENT {
        return Some(TransportErrorKind::InvalidOperation);
    }
    None
}

/// Classify a non-success HTTP status into the transport failure taxonomy.
pub(crate) fn classify_status(status: StatusCode) -> TransportErrorKind {
    match status.as_u16() {
        401 => TransportErrorKind::AuthenticationRequired,
        403 => TransportErrorKind::AccessDenied,
        404 => TransportErrorKind::NotFound,
        407 => TransportErrorKind::ProxyAuthenticationRequired,
        409 => TransportErrorKind::Conflict,
        410 => TransportErrorKind::Gone,
        400..=499 => TransportErrorKind::UnknownContent,
        500 => TransportErrorKind::InternalServerError,
        501 => TransportErrorKind::NotImplemented,
        503 => TransportErrorKind::ServiceUnavailable,
        502 | 504..=599 => TransportErrorKind::UnknownServer,
        _ => TransportErrorKind::ProtocolFailure,
    }
}

/// Classify a reqwest failure. reqwest exposes coarse predicates plus a
/// source chain; the io error underneath the connector carries the precise
/// cause when there is one, dns and tls failures only show up as text.
pub(crate) fn classify_reqwest_error(err: &reqwest::Error) -> TransportErrorKind {
    if err.is_timeout() {
        return TransportErrorKind::TimedOut;
    }
    if err.is_redirect() {
        return TransportErrorKind::TooManyRedirects;
    }
    if err.is_builder() {
        return TransportErrorKind::InvalidOperation;
    }

    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            return classify_io(io.kind());
        }
        source = inner.source();
    }

    let text = err.to_string().to_lowercase();
    if text.contains("dns error") || text.contains("failed to lookup address") {
        return TransportErrorKind::HostNotFound;
    }
    if text.contains("certificate") || text.contains("tls") || text.contains("ssl") {
        return TransportErrorKind::SslHandshake;
    }

    if err.is_connect() {
        return TransportErrorKind::ConnectionRefused;
    }
    if err.is_body() || err.is_decode() {
        return TransportErrorKind::ProtocolFailure;
    }
    TransportErrorKind::UnknownNetwork
}

fn classify_io(kind: std::io::ErrorKind) -> TransportErrorKind {
    use std::io::ErrorKind as Io;
    match kind {
        Io::ConnectionRefused => TransportErrorKind::ConnectionRefused,
        Io::ConnectionReset | Io::ConnectionAborted | Io::BrokenPipe => {
            TransportErrorKind::RemoteHostClosed
        }
        Io::TimedOut => TransportErrorKind::TimedOut,
        Io::NotConnected | Io::Interrupted => TransportErrorKind::TemporaryFailure,
        Io::UnexpectedEof => TransportErrorKind::ProtocolFailure,
        _ => TransportErrorKind::UnknownNetwork,
    }
}
