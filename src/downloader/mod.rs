pub mod block_downloader;

mod block_request;
mod comms;
mod handle;
mod session;

pub use block_downloader::BlockRangeDownloader;
pub use comms::*;
pub use handle::DownloaderHandle;
