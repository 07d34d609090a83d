mod cli;
mod commands;
mod render;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Args;

fn main() -> Result<()> {
    let mut args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Output dir might not exist yet, so we resolve it relative to current dir
    if args.download_dir.is_relative() {
        if let Ok(cwd) = std::env::current_dir() {
            args.download_dir = cwd.join(&args.download_dir);
        }
    }

    let config = args.transfer_config();
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        if args.interactive {
            return crate::commands::run_interactive(args.download_dir, config).await;
        }

        let urls = if args.urls.is_empty() {
            crate::commands::read_task_file(&args.tasks_file).await?
        } else {
            args.urls
        };
        crate::commands::run_downloads(urls, args.download_dir, config, args.json).await
    })
}
