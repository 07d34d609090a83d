use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};

use batchdl::utils::destination_for;
use batchdl::{DownloadId, DownloadRecord, DownloadRegistry, DownloadState, EventSink, TransferConfig};

use crate::render::Output;

/// URLs from a task file: one per line, blank lines and `#` comments skipped.
pub async fn read_task_file(input: &Path) -> Result<Vec<String>> {
    let file = fs::File::open(input)
        .await
        .context(format!("Failed to open input file: {:?}", input))?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();
    let mut urls = vec![];
    while let Some(line) = lines.next_line().await? {
        let raw = line.trim();
        if raw.is_empty() || raw.starts_with('#') {
            continue;
        }
        urls.push(raw.to_string());
    }
    Ok(urls)
}

async fn ensure_dir(output: &Path) -> Result<()> {
    if !output.exists() {
        fs::create_dir_all(output)
            .await
            .context("Failed to create output directory")?;
    }
    Ok(())
}

/// Download every URL at once. Ctrl+C interrupts whatever is still running.
pub async fn run_downloads(
    urls: Vec<String>,
    output: PathBuf,
    config: TransferConfig,
    json: bool,
) -> Result<()> {
    if urls.is_empty() {
        bail!("No URLs to download");
    }
    ensure_dir(&output).await?;

    let mut registry = DownloadRegistry::new(config);
    let mut out = Output::new(json);

    for (index, url) in urls.iter().enumerate() {
        let id = registry.add(url.clone(), destination_for(&output, url, index + 1));
        out.track(id, url);
    }
    registry.start_all();
    for record in registry.records() {
        out.mark_started(record.id());
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            result = &mut ctrl_c, if !interrupted => {
                result.context("Failed to listen for Ctrl+C")?;
                interrupted = true;
                let count = registry.interrupt_all();
                out.println(format!("Interrupting {} active download(s)...", count));
                for record in registry.records() {
                    if record.state() == DownloadState::Interrupting {
                        out.mark_interrupting(record.id());
                    }
                }
            }
            event = registry.next_event() => match event {
                Some(event) => out.deliver(&event),
                None => break,
            },
        }
    }

    let failed = registry
        .records()
        .filter(|r| r.state() == DownloadState::Errored)
        .count();
    if failed > 0 {
        bail!("{} of {} downloads did not complete", failed, registry.len());
    }
    Ok(())
}

/// Interactive console over a download list.
pub async fn run_interactive(output: PathBuf, config: TransferConfig) -> Result<()> {
    ensure_dir(&output).await?;

    let mut registry = DownloadRegistry::new(config);
    let mut out = Output::new(false);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    out.println(HELP);
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break;
                };
                match Command::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => {
                        apply(command, &mut registry, &mut out, &output, &mut lines).await?;
                    }
                    Err(message) => out.println(message),
                }
            }
            Some(event) = registry.next_event(), if registry.has_active() => {
                out.deliver(&event);
            }
        }
    }

    if registry.interrupt_all() > 0 {
        out.println("Waiting for active downloads to stop...");
    }
    registry.drain(&mut out).await;
    Ok(())
}

const HELP: &str = "Commands: add <url> [path] | start | interrupt <n|id> | interrupt-all | clear | list | quit";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Add { url: String, path: Option<PathBuf> },
    Start,
    Interrupt(String),
    InterruptAll,
    Clear,
    List,
    Help,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(Self::Help);
        };
        let command = match verb {
            "add" => {
                let url = words.next().ok_or("usage: add <url> [path]")?;
                Self::Add {
                    url: url.to_string(),
                    path: words.next().map(PathBuf::from),
                }
            }
            "start" => Self::Start,
            "interrupt" => Self::Interrupt(
                words.next().ok_or("usage: interrupt <n|id>")?.to_string(),
            ),
            "interrupt-all" => Self::InterruptAll,
            "clear" => Self::Clear,
            "list" | "ls" => Self::List,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(format!("Unknown command '{}'. {}", other, HELP)),
        };
        Ok(command)
    }
}

async fn apply<R>(
    command: Command,
    registry: &mut DownloadRegistry,
    out: &mut Output,
    output: &Path,
    lines: &mut tokio::io::Lines<R>,
) -> Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    match command {
        Command::Add { url, path } => {
            let destination = match path {
                Some(path) if path.is_absolute() => path,
                Some(path) => output.join(path),
                None => destination_for(output, &url, registry.len() + 1),
            };
            let id = registry.add(url.clone(), destination);
            out.track(id, &url);
        }
        Command::Start => {
            let started = registry.start_all();
            for record in registry.records() {
                if record.state() == DownloadState::Running {
                    out.mark_started(record.id());
                }
            }
            out.println(format!("Started {} download(s)", started));
        }
        Command::Interrupt(target) => match resolve(registry, &target) {
            Some(id) if registry.interrupt(id) => out.mark_interrupting(id),
            Some(_) => out.println("That download is not running"),
            None => out.println(format!("No download matches '{}'", target)),
        },
        Command::InterruptAll => {
            registry.interrupt_all();
            for record in registry.records() {
                if record.state() == DownloadState::Interrupting {
                    out.mark_interrupting(record.id());
                }
            }
        }
        Command::Clear => {
            if registry.is_empty() {
                return Ok(());
            }
            out.println(
                "Are you sure you want to clear all downloads? Active downloads will be interrupted. [y/N]",
            );
            let answer = lines.next_line().await.context("Failed to read confirmation")?;
            if matches!(answer.as_deref().map(str::trim), Some("y" | "Y" | "yes")) {
                let removed = registry.clear();
                out.forget_all();
                out.println(format!("Cleared {} download(s)", removed));
            }
        }
        Command::List => {
            for line in list_lines(registry.records()) {
                out.println(line);
            }
        }
        Command::Help => out.println(HELP),
        Command::Quit => {}
    }
    Ok(())
}

/// A 1-based list position or a full download id.
fn resolve(registry: &DownloadRegistry, target: &str) -> Option<DownloadId> {
    if let Ok(position) = target.parse::<usize>() {
        return registry
            .records()
            .nth(position.checked_sub(1)?)
            .map(DownloadRecord::id);
    }
    let id = target.parse::<DownloadId>().ok()?;
    registry.get(id).map(DownloadRecord::id)
}

fn list_lines<'a>(records: impl Iterator<Item = &'a DownloadRecord>) -> Vec<String> {
    let mut lines = vec![format!("{:<4} {:<13} {:>8}  {}", "#", "Status", "Progress", "URL")];
    for (index, record) in records.enumerate() {
        let status = match record.error() {
            Some(message) if record.state() == DownloadState::Errored => {
                format!("{} ({})", record.state(), message)
            }
            _ => record.state().to_string(),
        };
        lines.push(format!(
            "{:<4} {:<13} {:>7}%  {} -> {}",
            index + 1,
            status,
            record.percent(),
            record.url(),
            record.destination().display()
        ));
    }
    if lines.len() == 1 {
        lines.push("No downloads in the list.".to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(
            Command::parse("add http://example.test/a.bin out.bin"),
            Ok(Command::Add {
                url: "http://example.test/a.bin".to_string(),
                path: Some(PathBuf::from("out.bin")),
            })
        );
        assert_eq!(Command::parse("  start "), Ok(Command::Start));
        assert_eq!(
            Command::parse("interrupt 2"),
            Ok(Command::Interrupt("2".to_string()))
        );
        assert_eq!(Command::parse("interrupt-all"), Ok(Command::InterruptAll));
        assert_eq!(Command::parse(""), Ok(Command::Help));
        assert!(Command::parse("add").is_err());
        assert!(Command::parse("frobnicate").is_err());
    }

    #[test]
    fn resolves_positions_and_ids() {
        let mut registry = DownloadRegistry::default();
        let a = registry.add("http://example.test/a", "a");
        let b = registry.add("http://example.test/b", "b");

        assert_eq!(resolve(&registry, "1"), Some(a));
        assert_eq!(resolve(&registry, "2"), Some(b));
        assert_eq!(resolve(&registry, "0"), None);
        assert_eq!(resolve(&registry, "3"), None);
        assert_eq!(resolve(&registry, &b.to_string()), Some(b));
        assert_eq!(resolve(&registry, "nope"), None);
    }

    #[test]
    fn list_shows_every_record() {
        let mut registry = DownloadRegistry::default();
        assert_eq!(list_lines(registry.records()).len(), 2);

        registry.add("http://example.test/a", "a");
        let lines = list_lines(registry.records());
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("idle"));
        assert!(lines[1].contains("http://example.test/a"));
    }

    #[tokio::test]
    async fn task_file_skips_blanks_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("download.txt");
        fs::write(&path, "# list\nhttp://example.test/a\n\n  http://example.test/b  \n")
            .await
            .unwrap();

        let urls = read_task_file(&path).await.unwrap();
        assert_eq!(urls, vec!["http://example.test/a", "http://example.test/b"]);
    }
}
