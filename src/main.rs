mod cli;
mod downloader;
mod error;
mod prelude;
mod ranges;
mod transport;
mod writer;

use cli::Cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use downloader::BlockRangeDownloader;
use transport::HttpTransport;
use writer::RangeWriter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,blockfetch=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let matches = Cli::parse();
    let url = matches.url.into_url();
    let transport = HttpTransport::new()?;

    let (plan, bytes_total) =
        writer::resolve_plan(&transport, &url, matches.ranges, matches.total).await?;

    let writer = RangeWriter::create(&matches.output, bytes_total).await?;

    let (engine, handle, events_rx) = BlockRangeDownloader::new(transport);
    let engine = tokio::spawn(engine.run());

    handle.start(matches.have, bytes_total, url)?;
    writer::drive(handle, events_rx, writer, plan).await?;

    engine.await??;
    Ok(())
}
