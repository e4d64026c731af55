use std::fmt;

use bytes::Bytes;
use reqwest::Url;

use crate::error::ErrorCode;
use crate::ranges::BlockRange;
use crate::transport::TransportErrorKind;

/// Instructions from the controller into the downloader event loop.
#[derive(Debug, Clone)]
pub enum DownloadCommand {
    Start {
        bytes_have: u64,
        bytes_total: u64,
        url: Url,
    },
    /// The block plan answering a `RangesRequested` event, one message for
    /// the whole plan.
    Ranges(Vec<BlockRange>),
    Cancel,
}

/// Everything a session reports back to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    /// A start was accepted, requests go out once the plan arrives.
    Started,
    /// The session wants its block plan, answer with `Ranges`.
    RangesRequested,
    Progress(Progress),
    /// A ranged request completed, `data` is exactly the requested slice.
    BlockData { range: BlockRange, data: Bytes },
    /// One chunk of a sequential whole-file fetch, in stream order.
    SeqData(Bytes),
    Finished,
    Canceled,
    Error(ErrorCode),
}

/// One aggregated progress tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub percent: u8,
    pub bytes_received: u64,
    pub bytes_total: u64,
    pub speed: f64,
    pub unit: SpeedUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedUnit {
    BytesPerSec,
    KbPerSec,
    MbPerSec,
}

impl SpeedUnit {
    /// Scale a raw bytes-per-second figure into the band used for reporting.
    pub fn scale(raw: f64) -> (f64, SpeedUnit) {
        if raw < 1024.0 {
            (raw, Self::BytesPerSec)
        } else if raw < 1024.0 * 1024.0 {
            (raw / 1024.0, Self::KbPerSec)
        } else {
            (raw / (1024.0 * 1024.0), Self::MbPerSec)
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BytesPerSec => "bytes/sec",
            Self::KbPerSec => "kB/s",
            Self::MbPerSec => "MB/s",
        }
    }
}

impl fmt::Display for SpeedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one in-flight request tells the event loop. Ranged requests report
/// byte deltas that get aggregated; the sequential whole-file request
/// reports its own cumulative count, forwarded unscaled.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum RequestEvent {
    Progress {
        delta: u64,
        speed: f64,
        unit: SpeedUnit,
    },
    SeqProgress {
        received: u64,
        speed: f64,
        unit: SpeedUnit,
    },
    SeqData(Bytes),
    Done {
        range: BlockRange,
        data: Bytes,
    },
    Canceled,
    Failed(TransportErrorKind),
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 0.0, SpeedUnit::BytesPerSec)]
    #[case(1023.0, 1023.0, SpeedUnit::BytesPerSec)]
    #[case(1024.0, 1.0, SpeedUnit::KbPerSec)]
    #[case(524_288.0, 512.0, SpeedUnit::KbPerSec)]
    #[case(1_048_576.0, 1.0, SpeedUnit::MbPerSec)]
    #[case(3_145_728.0, 3.0, SpeedUnit::MbPerSec)]
    fn raw_speeds_scale_into_bands(
        #[case] raw: f64,
        #[case] scaled: f64,
        #[case] unit: SpeedUnit,
    ) {
        assert_eq!(SpeedUnit::scale(raw), (scaled, unit));
    }

    #[rstest]
    fn units_render_like_the_progress_line_expects() {
        assert_eq!(SpeedUnit::BytesPerSec.to_string(), "bytes/sec");
        assert_eq!(SpeedUnit::KbPerSec.to_string(), "kB/s");
        assert_eq!(SpeedUnit::MbPerSec.to_string(), "MB/s");
    }
}
