use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use batchdl::config::{TransferConfig, DEFAULT_CHUNK_SIZE};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// URLs to download (if given, tasks-file is ignored)
    #[arg(index = 1)]
    pub urls: Vec<String>,

    /// Path to the file containing URLs (one per line, '#' starts a comment)
    #[arg(short = 't', long = "tasks-file", default_value = "download.txt")]
    pub tasks_file: PathBuf,

    /// Directory to save downloaded files
    #[arg(short = 'd', long = "download-dir", default_value = "downloads")]
    pub download_dir: PathBuf,

    /// Bytes written between two interruption checks
    #[arg(long = "chunk-size", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Connect timeout in seconds
    #[arg(long = "connect-timeout", default_value_t = 10)]
    pub connect_timeout: u64,

    /// Print one JSON object per event instead of progress bars
    #[arg(long)]
    pub json: bool,

    /// Manage the download list from an interactive prompt
    #[arg(short = 'i', long)]
    pub interactive: bool,
}

impl Args {
    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout),
            chunk_size: self.chunk_size,
            ..TransferConfig::default()
        }
    }
}
