use std::time::Instant;

use bytes::BytesMut;
use futures::StreamExt;
use reqwest::Url;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{RequestEvent, SpeedUnit};
use crate::prelude::*;
use crate::ranges::BlockRange;
use crate::transport::{RangeTransport, TransportErrorKind};

/// One range (or whole-file) request cycle: stream the body, report bytes
/// and speed as they arrive, and settle on exactly one of done, canceled or
/// failed. Cancellation wins every race with natural completion.
pub(super) struct BlockRequest<T> {
    range: BlockRange,
    url: Url,
    transport: T,
    events_tx: mpsc::Sender<RequestEvent>,
    cancel: CancellationToken,
}

impl<T: RangeTransport> BlockRequest<T> {
    pub(super) fn new(
        range: BlockRange,
        url: Url,
        transport: T,
        events_tx: mpsc::Sender<RequestEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            range,
            url,
            transport,
            events_tx,
            cancel,
        }
    }

    #[instrument(name = "block request", level = "debug", skip_all, fields(range = %self.range))]
    pub(super) async fn run(self) {
        let Self {
            range,
            url,
            transport,
            events_tx,
            cancel,
        } = self;

        let started = Instant::now();
        let sentinel = range.is_sentinel();

        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("canceled before the request went out");
                let _ = events_tx.send(RequestEvent::Canceled).await;
                return;
            }
            fetched = transport.fetch(url, (!sentinel).then_some(range)) => match fetched {
                Ok(stream) => stream,
                Err(err) => {
                    warn!("request failed before any data: {err}");
                    let _ = events_tx.send(RequestEvent::Failed(err.kind)).await;
                    return;
                }
            },
        };
        let mut stream = stream;

        let expected = (!sentinel).then(|| range.len());
        let mut body = BytesMut::new();
        let mut received: u64 = 0;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("canceled after {received} bytes");
                    let _ = events_tx.send(RequestEvent::Canceled).await;
                    return;
                }
                chunk = stream.next() => chunk,
            };

            let mut chunk = match chunk {
                Some(Ok(chunk)) => chunk,
                Some(Err(err)) => {
                    warn!("transport failed mid body: {err}");
                    let _ = events_tx.send(RequestEvent::Failed(err.kind)).await;
                    return;
                }
                None => break,
            };

            // a server that ignores the range header answers with more than
            // we asked for; keep the slice we wanted, drop the rest.
            if let Some(expected) = expected {
                let remaining = expected - received;
                if chunk.len() as u64 > remaining {
                    warn!(
                        "reply overruns the range, dropping {} surplus bytes",
                        chunk.len() as u64 - remaining
                    );
                    chunk.truncate(remaining as usize);
                }
            }
            received += chunk.len() as u64;
            let (speed, unit) = speed_sample(received, started);

            let sent = if sentinel {
                events_tx.send(RequestEvent::SeqData(chunk)).await.is_ok()
                    && events_tx
                        .send(RequestEvent::SeqProgress {
                            received,
                            speed,
                            unit,
                        })
                        .await
                        .is_ok()
            } else {
                let delta = chunk.len() as u64;
                body.extend_from_slice(&chunk);
                events_tx
                    .send(RequestEvent::Progress { delta, speed, unit })
                    .await
                    .is_ok()
            };
            if !sent {
                debug!("event loop is gone, abandoning request");
                return;
            }

            if expected.is_some_and(|expected| received >= expected) {
                break;
            }
        }

        // an abort that lands between the last chunk and here still settles
        // the request as canceled, never finished.
        if cancel.is_cancelled() {
            debug!("canceled at completion");
            let _ = events_tx.send(RequestEvent::Canceled).await;
            return;
        }

        if let Some(expected) = expected {
            if received < expected {
                warn!("short reply: got {received} of {expected} bytes");
                let _ = events_tx
                    .send(RequestEvent::Failed(TransportErrorKind::ProtocolFailure))
                    .await;
                return;
            }
        }

        debug!("request complete, {received} bytes");
        let _ = events_tx
            .send(RequestEvent::Done {
                range,
                data: body.freeze(),
            })
            .await;
    }
}

fn speed_sample(received: u64, started: Instant) -> (f64, SpeedUnit) {
    let elapsed = started.elapsed().as_secs_f64().max(1e-3);
    SpeedUnit::scale(received as f64 / elapsed)
}
