use reqwest::Url;
use tokio_util::sync::CancellationToken;

/// Mutable state for one start-to-terminal download pass. The event loop
/// holds at most one of these; dropping it is the return to idle.
#[derive(Debug)]
pub(super) struct Session {
    pub url: Url,
    pub bytes_total: u64,
    pub bytes_received: u64,
    pub outstanding: usize,
    pub cancel_requested: bool,
    pub errored: bool,
    pub phase: Phase,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Phase {
    /// Start accepted, waiting for the controller to answer with the plan.
    AwaitingPlan,
    /// Requests are on the wire.
    Downloading,
}

impl Session {
    pub fn new(url: Url, bytes_have: u64, bytes_total: u64) -> Self {
        Self {
            url,
            bytes_total,
            bytes_received: bytes_have,
            outstanding: 0,
            cancel_requested: false,
            errored: false,
            phase: Phase::AwaitingPlan,
            cancel: CancellationToken::new(),
        }
    }
}

/// Whole percent of `received` out of `total`, floored, clamped to 100 so a
/// rounding overshoot on the final tick can never report above full.
pub(super) fn percent(received: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let ratio = received as f64 * 100.0 / total as f64;
    ratio.floor().min(100.0) as u8
}
