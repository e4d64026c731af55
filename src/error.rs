use std::fmt;

use crate::transport::TransportErrorKind;

/// Stable error codes surfaced to the controller when a session fails.
///
/// The values are grouped into non-overlapping bands per failure class
/// (connection, proxy, content access, protocol, server side) so consumers
/// can match on a class by range without the codes ever shifting underneath
/// them. The mapping from transport failures lives in the `From` impl below
/// and is the single place a new transport failure kind has to be wired up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    // connection class
    ConnectionRefused = 1,
    RemoteHostClosed = 2,
    HostNotFound = 3,
    ConnectionTimedOut = 4,
    SslHandshakeFailed = 5,
    TemporaryNetworkFailure = 6,
    TooManyRedirects = 7,
    UnknownNetwork = 8,

    // proxy class
    ProxyConnectionRefused = 20,
    ProxyConnectionClosed = 21,
    ProxyNotFound = 22,
    ProxyTimedOut = 23,
    ProxyAuthenticationRequired = 24,
    UnknownProxy = 25,

    // content access class
    ContentAccessDenied = 40,
    ContentNotFound = 41,
    AuthenticationRequired = 42,
    ContentConflict = 43,
    ContentGone = 44,
    UnknownContent = 45,

    // protocol class
    ProtocolUnknown = 60,
    ProtocolInvalidOperation = 61,
    ProtocolFailure = 62,

    // server side class
    InternalServerError = 80,
    OperationNotImplemented = 81,
    ServiceUnavailable = 82,

    // catch-all
    UnknownServer = 99,
}

impl ErrorCode {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionRefused => "connection refused",
            Self::RemoteHostClosed => "remote host closed the connection",
            Self::HostNotFound => "host not found",
            Self::ConnectionTimedOut => "connection timed out",
            Self::SslHandshakeFailed => "ssl handshake failed",
            Self::TemporaryNetworkFailure => "temporary network failure",
            Self::TooManyRedirects => "too many redirects",
            Self::UnknownNetwork => "unknown network error",
            Self::ProxyConnectionRefused => "proxy connection refused",
            Self::ProxyConnectionClosed => "proxy closed the connection",
            Self::ProxyNotFound => "proxy not found",
            Self::ProxyTimedOut => "proxy timed out",
            Self::ProxyAuthenticationRequired => "proxy authentication required",
            Self::UnknownProxy => "unknown proxy error",
            Self::ContentAccessDenied => "content access denied",
            Self::ContentNotFound => "content not found",
            Self::AuthenticationRequired => "authentication required",
            Self::ContentConflict => "content conflict",
            Self::ContentGone => "content gone",
            Self::UnknownContent => "unknown content error",
            Self::ProtocolUnknown => "unknown protocol",
            Self::ProtocolInvalidOperation => "invalid protocol operation",
            Self::ProtocolFailure => "protocol failure",
            Self::InternalServerError => "internal server error",
            Self::OperationNotImplemented => "operation not implemented",
            Self::ServiceUnavailable => "service unavailable",
            Self::UnknownServer => "unknown server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.as_str(), self.code())
    }
}

impl From<TransportErrorKind> for ErrorCode {
    fn from(kind: TransportErrorKind) -> Self {
        use TransportErrorKind as K;
        match kind {
            K::ConnectionRefused => Self::ConnectionRefused,
            K::RemoteHostClosed => Self::RemoteHostClosed,
            K::HostNotFound => Self::HostNotFound,
            K::TimedOut => Self::ConnectionTimedOut,
            K::SslHandshake => Self::SslHandshakeFailed,
            K::TemporaryFailure => Self::TemporaryNetworkFailure,
            K::TooManyRedirects => Self::TooManyRedirects,
            K::UnknownNetwork => Self::UnknownNetwork,
            K::ProxyConnectionRefused => Self::ProxyConnectionRefused,
            K::ProxyConnectionClosed => Self::ProxyConnectionClosed,
            K::ProxyNotFound => Self::ProxyNotFound,
            K::ProxyTimedOut => Self::ProxyTimedOut,
            K::ProxyAuthenticationRequired => Self::ProxyAuthenticationRequired,
            K::UnknownProxy => Self::UnknownProxy,
            K::AccessDenied => Self::ContentAccessDenied,
            K::NotFound => Self::ContentNotFound,
            K::AuthenticationRequired => Self::AuthenticationRequired,
            K::Conflict => Self::ContentConflict,
            K::Gone => Self::ContentGone,
            K::UnknownContent => Self::UnknownContent,
            K::ProtocolUnknown => Self::ProtocolUnknown,
            K::InvalidOperation => Self::ProtocolInvalidOperation,
            K::ProtocolFailure => Self::ProtocolFailure,
            K::InternalServerError => Self::InternalServerError,
            K::NotImplemented => Self::OperationNotImplemented,
            K::ServiceUnavailable => Self::ServiceUnavailable,
            K::UnknownServer => Self::UnknownServer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TransportErrorKind::ConnectionRefused, 1)]
    #[case(TransportErrorKind::UnknownNetwork, 8)]
    #[case(TransportErrorKind::ProxyConnectionRefused, 20)]
    #[case(TransportErrorKind::UnknownProxy, 25)]
    #[case(TransportErrorKind::NotFound, 41)]
    #[case(TransportErrorKind::ProtocolFailure, 62)]
    #[case(TransportErrorKind::InternalServerError, 80)]
    #[case(TransportErrorKind::UnknownServer, 99)]
    fn transport_kinds_map_to_stable_codes(#[case] kind: TransportErrorKind, #[case] code: u8) {
        assert_eq!(ErrorCode::from(kind).code(), code);
    }

    #[rstest]
    fn display_carries_code_and_description() {
        let rendered = ErrorCode::ConnectionRefused.to_string();
        assert_eq!(rendered, "connection refused (code 1)");
    }
}
