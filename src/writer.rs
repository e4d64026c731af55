use std::path::Path;

use reqwest::Url;
use tokio::fs::{File, OpenOptions};
use tokio::io::{self, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::downloader::{DownloadEvent, DownloaderHandle};
use crate::prelude::*;
use crate::ranges::BlockRange;
use crate::transport::RangeTransport;

/// Writes completed blocks into the target file at their own offsets, and
/// appends sequential chunks in arrival order starting from the top.
pub struct RangeWriter {
    file: File,
    seq_position: u64,
}

impl RangeWriter {
    /// Opens (or creates) the target and sizes it to the final length up
    /// front, so blocks can land at any offset in any order. Existing
    /// bytes are kept for resumed sessions.
    pub async fn create(path: &Path, bytes_total: u64) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .open(path)
            .await?;
        file.set_len(bytes_total).await?;
        Ok(Self {
            file,
            seq_position: 0,
        })
    }

    pub async fn write_block(&mut self, range: BlockRange, data: &[u8]) -> anyhow::Result<()> {
        trace!("writing {} bytes at offset {}", data.len(), range.from);
        self.file.seek(io::SeekFrom::Start(range.from)).await?;
        self.file.write_all(data).await?;
        Ok(())
    }

    pub async fn append_seq(&mut self, data: &[u8]) -> anyhow::Result<()> {
        trace!("appending {} bytes at offset {}", data.len(), self.seq_position);
        self.file.seek(io::SeekFrom::Start(self.seq_position)).await?;
        self.file.write_all(data).await?;
        self.seq_position += data.len() as u64;
        Ok(())
    }

    pub async fn finish(mut self) -> anyhow::Result<()> {
        self.file.flush().await?;
        Ok(())
    }
}

/// Resolves the effective plan and total for a session. An explicit total is
/// trusted as given; otherwise a HEAD probe supplies the size, and a server
/// without range support downgrades a ranged plan to one sequential fetch.
/// An empty plan always means the whole file.
pub async fn resolve_plan<T: RangeTransport>(
    transport: &T,
    url: &Url,
    mut plan: Vec<BlockRange>,
    total: Option<u64>,
) -> anyhow::Result<(Vec<BlockRange>, u64)> {
    let bytes_total = match total {
        Some(total) => total,
        None => {
            info!(%url, "probing for size and range support");
            let probe = transport.probe(url.clone()).await?;
            let Some(total) = probe.content_length else {
                anyhow::bail!("server did not report a content length, pass --total");
            };
            if !plan.is_empty() && !probe.accepts_ranges {
                warn!("server does not accept range requests, fetching the whole file instead");
                plan.clear();
            }
            total
        }
    };
    if plan.is_empty() {
        plan = vec![BlockRange::SEQUENTIAL];
    }
    Ok((plan, bytes_total))
}

/// Drives one session end to end: answers the plan request, writes data as
/// it lands, prints progress, and turns ctrl-c into a cancel request.
pub async fn drive(
    handle: DownloaderHandle,
    mut events_rx: mpsc::Receiver<DownloadEvent>,
    mut writer: RangeWriter,
    plan: Vec<BlockRange>,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, canceling the session");
                handle.cancel()?;
            }
            event = events_rx.recv() => {
                let Some(event) = event else {
                    anyhow::bail!("downloader stopped before the session settled");
                };
                match event {
                    DownloadEvent::Started => info!("download started"),
                    DownloadEvent::RangesRequested => {
                        debug!("supplying block plan with {} ranges", plan.len());
                        handle.supply_ranges(plan.clone())?;
                    }
                    DownloadEvent::Progress(progress) => {
                        println!(
                            "{:>3}% {} of {} bytes at {:.1} {}",
                            progress.percent,
                            progress.bytes_received,
                            progress.bytes_total,
                            progress.speed,
                            progress.unit,
                        );
                    }
                    DownloadEvent::BlockData { range, data } => {
                        writer.write_block(range, &data).await?;
                    }
                    DownloadEvent::SeqData(data) => {
                        writer.append_seq(&data).await?;
                    }
                    DownloadEvent::Finished => {
                        writer.finish().await?;
                        println!("finished");
                        return Ok(());
                    }
                    DownloadEvent::Canceled => {
                        println!("canceled");
                        return Ok(());
                    }
                    DownloadEvent::Error(code) => {
                        anyhow::bail!("download failed: {code}");
                    }
                }
            }
        }
    }
}
