use reqwest::Url;
use tokio::sync::mpsc;

use super::DownloadCommand;
use crate::ranges::BlockRange;

/// Control side of a downloader. All three calls enqueue and return
/// immediately; the loop acts on them in order.
#[derive(Debug, Clone)]
pub struct DownloaderHandle {
    commands_tx: mpsc::UnboundedSender<DownloadCommand>,
}

impl DownloaderHandle {
    pub(super) fn new(commands_tx: mpsc::UnboundedSender<DownloadCommand>) -> Self {
        Self { commands_tx }
    }

    pub fn start(&self, bytes_have: u64, bytes_total: u64, url: Url) -> anyhow::Result<()> {
        self.send(DownloadCommand::Start {
            bytes_have,
            bytes_total,
            url,
        })
    }

    pub fn supply_ranges(&self, ranges: Vec<BlockRange>) -> anyhow::Result<()> {
        self.send(DownloadCommand::Ranges(ranges))
    }

    pub fn cancel(&self) -> anyhow::Result<()> {
        self.send(DownloadCommand::Cancel)
    }

    fn send(&self, command: DownloadCommand) -> anyhow::Result<()> {
        self.commands_tx
            .send(command)
            .map_err(|_| anyhow::anyhow!("downloader event loop has shut down"))
    }
}
