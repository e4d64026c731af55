use clap::{self, Parser};

use reqwest::{IntoUrl, Url};
use std::path::PathBuf;
use std::str::FromStr;

use crate::ranges::BlockRange;

#[derive(Debug, Clone)]
pub struct TargetUrl(Url);

impl TargetUrl {
    pub fn new(url: impl IntoUrl) -> Result<Self, anyhow::Error> {
        let url = url.into_url()?;
        match url.scheme() {
            "http" | "https" => Ok(TargetUrl(url)),
            scheme @ _ => anyhow::bail!("unsupported scheme {:?} for download target", scheme),
        }
    }

    pub fn into_url(self) -> Url {
        self.0
    }
}

impl FromStr for TargetUrl {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[derive(Parser, Debug)]
#[command(author, about, long_about = None)]
/// a block range downloader for applying zsync style deltas over http.
pub struct Cli {
    #[arg(required = true)]
    /// the url of the remote file to fetch. http and https only.
    pub url: TargetUrl,

    #[arg(short, long)]
    /// path the downloaded bytes are written to.
    pub output: PathBuf,

    #[arg(short, long = "range", value_name = "FROM-TO")]
    /// block range to fetch, inclusive byte offsets written FROM-TO.
    /// repeat for several ranges; omit to fetch the whole file.
    pub ranges: Vec<BlockRange>,

    #[arg(long, default_value = "0")]
    /// bytes of the target already present locally.
    pub have: u64,

    #[arg(long)]
    /// total size of the remote file in bytes. probed from the server when
    /// not given.
    pub total: Option<u64>,
}
