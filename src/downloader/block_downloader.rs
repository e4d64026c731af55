use tokio::sync::mpsc;

use super::block_request::BlockRequest;
use super::session::{percent, Phase, Session};
use super::{DownloadCommand, DownloadEvent, DownloaderHandle, Progress, RequestEvent};
use crate::error::ErrorCode;
use crate::prelude::*;
use crate::ranges::BlockRange;
use crate::transport::RangeTransport;

/// Event loop orchestrating the concurrent range requests of one download
/// pass and folding their reports into a single controller-facing stream.
///
/// All session state lives here and is only touched between awaits, so the
/// counters need no locking: commands and request events are handled one at
/// a time, each handler running to completion before the next is taken.
pub struct BlockRangeDownloader<T> {
    transport: T,
    commands_rx: mpsc::UnboundedReceiver<DownloadCommand>,
    request_tx: mpsc::Sender<RequestEvent>,
    request_rx: mpsc::Receiver<RequestEvent>,
    events_tx: mpsc::Sender<DownloadEvent>,
    session: Option<Session>,
}

impl<T: RangeTransport> BlockRangeDownloader<T> {
    const EVENT_BUFFER_SIZE: usize = 64;
    const REQUEST_BUFFER_SIZE: usize = 64;

    pub fn new(transport: T) -> (Self, DownloaderHandle, mpsc::Receiver<DownloadEvent>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(Self::EVENT_BUFFER_SIZE);
        let (request_tx, request_rx) = mpsc::channel(Self::REQUEST_BUFFER_SIZE);

        let downloader = Self {
            transport,
            commands_rx,
            request_tx,
            request_rx,
            events_tx,
            session: None,
        };

        (downloader, DownloaderHandle::new(commands_tx), events_rx)
    }

    #[instrument(name = "block downloader", level = "info", skip_all)]
    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut commands_open = true;
        loop {
            tokio::select! {
                command = self.commands_rx.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command).await?,
                    None => {
                        debug!("all handles dropped");
                        commands_open = false;
                        // a plan can only arrive over a handle, so a session
                        // with nothing outstanding can never advance now
                        if self
                            .session
                            .as_ref()
                            .is_some_and(|session| session.outstanding == 0)
                        {
                            warn!("abandoning session still waiting for its block plan");
                            self.session = None;
                        }
                    }
                },
                // the loop keeps a sender of its own, so this never yields None
                Some(event) = self.request_rx.recv() => {
                    self.handle_request_event(event).await?;
                }
            }

            if !commands_open && self.session.is_none() {
                info!("no handles and no active session, shutting down");
                return Ok(());
            }
        }
    }

    async fn handle_command(&mut self, command: DownloadCommand) -> anyhow::Result<()> {
        match command {
            DownloadCommand::Start {
                bytes_have,
                bytes_total,
                url,
            } => {
                if self.session.is_some() {
                    warn!("start ignored, a session is already active");
                    return Ok(());
                }
                info!(%url, bytes_have, bytes_total, "starting session");
                self.session = Some(Session::new(url, bytes_have, bytes_total));
                self.events_tx.send(DownloadEvent::Started).await?;
                self.events_tx.send(DownloadEvent::RangesRequested).await?;
            }
            DownloadCommand::Ranges(plan) => self.handle_plan(plan).await?,
            DownloadCommand::Cancel => self.handle_cancel(),
        }
        Ok(())
    }

    fn handle_cancel(&mut self) {
        match self.session.as_mut() {
            Some(session) if session.cancel_requested => {
                debug!("cancel already in progress");
            }
            Some(session) if session.outstanding > 0 => {
                info!(
                    "cancel requested, aborting {} outstanding requests",
                    session.outstanding
                );
                session.cancel_requested = true;
                session.cancel.cancel();
            }
            _ => debug!("cancel with nothing outstanding is a no-op"),
        }
    }

    async fn handle_plan(&mut self, plan: Vec<BlockRange>) -> anyhow::Result<()> {
        let Some(session) = self.session.as_mut() else {
            warn!("block plan with no active session, dropping");
            return Ok(());
        };
        if session.phase != Phase::AwaitingPlan {
            warn!("unexpected block plan while downloading, dropping");
            return Ok(());
        }
        session.phase = Phase::Downloading;

        let transport = self.transport.clone();
        let request_tx = self.request_tx.clone();

        if plan.len() == 1 && plan[0].is_sentinel() {
            info!("no partial content support, fetching the whole file in one stream");
            session.outstanding = 1;
            let request = BlockRequest::new(
                BlockRange::SEQUENTIAL,
                session.url.clone(),
                transport,
                request_tx,
                session.cancel.child_token(),
            );
            tokio::spawn(request.run());
            return Ok(());
        }

        let mut spawned = 0;
        for range in plan {
            if range.is_sentinel() {
                // a lone zero pair means sequential mode; buried inside a
                // longer plan it is a malformed entry
                warn!("sentinel range inside a block plan, skipping");
                continue;
            }
            let request = BlockRequest::new(
                range,
                session.url.clone(),
                transport.clone(),
                request_tx.clone(),
                session.cancel.child_token(),
            );
            tokio::spawn(request.run());
            spawned += 1;
        }
        session.outstanding = spawned;
        info!("issued {spawned} block range requests");

        if spawned == 0 {
            info!("empty block plan, nothing to fetch");
            self.session = None;
            self.events_tx.send(DownloadEvent::Finished).await?;
        }
        Ok(())
    }

    async fn handle_request_event(&mut self, event: RequestEvent) -> anyhow::Result<()> {
        let Some(session) = self.session.as_mut() else {
            // every request settles with one terminal and the session only
            // drops once all of them are in, so this cannot happen
            warn!("request event after session drained: {event:?}");
            return Ok(());
        };

        let mut settled_one = false;
        match event {
            RequestEvent::Progress { delta, speed, unit } => {
                session.bytes_received += delta;
                let progress = Progress {
                    percent: percent(session.bytes_received, session.bytes_total),
                    bytes_received: session.bytes_received,
                    bytes_total: session.bytes_total,
                    speed,
                    unit,
                };
                self.events_tx.send(DownloadEvent::Progress(progress)).await?;
            }
            RequestEvent::SeqProgress {
                received,
                speed,
                unit,
            } => {
                // single stream, forwarded unscaled
                session.bytes_received = received;
                let progress = Progress {
                    percent: percent(received, session.bytes_total),
                    bytes_received: received,
                    bytes_total: session.bytes_total,
                    speed,
                    unit,
                };
                self.events_tx.send(DownloadEvent::Progress(progress)).await?;
            }
            RequestEvent::SeqData(data) => {
                self.events_tx.send(DownloadEvent::SeqData(data)).await?;
            }
            RequestEvent::Done { range, data } => {
                if !range.is_sentinel() {
                    self.events_tx
                        .send(DownloadEvent::BlockData { range, data })
                        .await?;
                }
                settled_one = true;
            }
            RequestEvent::Canceled => settled_one = true,
            RequestEvent::Failed(kind) => {
                if session.errored || session.cancel_requested {
                    debug!("suppressing follow-up failure {kind:?}");
                } else {
                    session.errored = true;
                    let code = ErrorCode::from(kind);
                    error!("block request failed: {code}");
                    self.events_tx.send(DownloadEvent::Error(code)).await?;
                }
                settled_one = true;
            }
        }

        if settled_one {
            session.outstanding -= 1;
            if session.outstanding > 0 {
                return Ok(());
            }

            let errored = session.errored;
            let canceled = session.cancel_requested;
            self.session = None;
            if errored {
                info!("errored session fully drained");
            } else if canceled {
                info!("canceled session fully drained");
                self.events_tx.send(DownloadEvent::Canceled).await?;
            } else {
                info!("all block requests finished");
                self.events_tx.send(DownloadEvent::Finished).await?;
            }
        }
        Ok(())
    }
}
