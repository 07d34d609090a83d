use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::Write;

use batchdl::{DownloadEvent, DownloadId, EventSink};

/// One progress bar per download, drawn on stderr.
pub struct ProgressRenderer {
    multi_progress: MultiProgress,
    bars: HashMap<DownloadId, ProgressBar>,
}

impl ProgressRenderer {
    pub fn new() -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            bars: HashMap::new(),
        }
    }

    pub fn track(&mut self, id: DownloadId, label: &str) {
        let pb = self.multi_progress.add(ProgressBar::new(100));
        let style = ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos:>3}% {prefix} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        pb.set_style(style);
        pb.set_prefix(label.to_string());
        pb.set_message("Ready to download");
        self.bars.insert(id, pb);
    }

    pub fn mark_started(&self, id: DownloadId) {
        if let Some(pb) = self.bars.get(&id) {
            pb.set_message("Downloading...");
        }
    }

    pub fn mark_interrupting(&self, id: DownloadId) {
        if let Some(pb) = self.bars.get(&id) {
            pb.set_message("Interrupting...");
        }
    }

    /// Drop every bar, e.g. after the list was cleared.
    pub fn forget_all(&mut self) {
        for (_, pb) in self.bars.drain() {
            pb.finish_and_clear();
            self.multi_progress.remove(&pb);
        }
    }

    /// Print a line above the bars without tearing them.
    pub fn println(&self, line: impl AsRef<str>) {
        if self.multi_progress.println(line.as_ref()).is_err() {
            eprintln!("{}", line.as_ref());
        }
    }
}

impl Default for ProgressRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for ProgressRenderer {
    fn on_progress(&mut self, id: DownloadId, percent: u8) {
        if let Some(pb) = self.bars.get(&id) {
            pb.set_position(u64::from(percent));
        }
    }

    fn on_finished(&mut self, id: DownloadId) {
        if let Some(pb) = self.bars.get(&id) {
            // Integer percents can stop at 99; a finished download shows 100.
            pb.set_position(100);
            pb.finish_with_message("Complete!");
        }
    }

    fn on_error(&mut self, id: DownloadId, message: &str) {
        if let Some(pb) = self.bars.get(&id) {
            pb.abandon_with_message(format!("Error: {}", message));
        }
    }
}

/// Whatever the binary renders events to.
pub enum Output {
    Bars(ProgressRenderer),
    Json(JsonLines<std::io::Stdout>),
}

impl Output {
    pub fn new(json: bool) -> Self {
        if json {
            Self::Json(JsonLines::new(std::io::stdout()))
        } else {
            Self::Bars(ProgressRenderer::new())
        }
    }

    pub fn track(&mut self, id: DownloadId, label: &str) {
        if let Self::Bars(bars) = self {
            bars.track(id, label);
        }
    }

    pub fn mark_started(&self, id: DownloadId) {
        if let Self::Bars(bars) = self {
            bars.mark_started(id);
        }
    }

    pub fn mark_interrupting(&self, id: DownloadId) {
        if let Self::Bars(bars) = self {
            bars.mark_interrupting(id);
        }
    }

    pub fn forget_all(&mut self) {
        if let Self::Bars(bars) = self {
            bars.forget_all();
        }
    }

    /// Human-readable notices go to stderr so JSON output stays parseable.
    pub fn println(&self, line: impl AsRef<str>) {
        match self {
            Self::Bars(bars) => bars.println(line),
            Self::Json(_) => eprintln!("{}", line.as_ref()),
        }
    }
}

impl EventSink for Output {
    fn on_progress(&mut self, id: DownloadId, percent: u8) {
        match self {
            Self::Bars(bars) => bars.on_progress(id, percent),
            Self::Json(json) => json.on_progress(id, percent),
        }
    }

    fn on_finished(&mut self, id: DownloadId) {
        match self {
            Self::Bars(bars) => bars.on_finished(id),
            Self::Json(json) => json.on_finished(id),
        }
    }

    fn on_error(&mut self, id: DownloadId, message: &str) {
        match self {
            Self::Bars(bars) => bars.on_error(id, message),
            Self::Json(json) => json.on_error(id, message),
        }
    }
}

/// Writes every event as one JSON line.
pub struct JsonLines<W: Write> {
    out: W,
}

impl<W: Write> JsonLines<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn write(&mut self, event: &DownloadEvent) {
        if let Err(e) = self.try_write(event) {
            tracing::warn!(error = %e, "failed to write event");
        }
    }

    fn try_write(&mut self, event: &DownloadEvent) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

impl<W: Write> EventSink for JsonLines<W> {
    fn on_progress(&mut self, id: DownloadId, percent: u8) {
        self.write(&DownloadEvent::Progress { id, percent });
    }

    fn on_finished(&mut self, id: DownloadId) {
        self.write(&DownloadEvent::Finished { id });
    }

    fn on_error(&mut self, id: DownloadId, message: &str) {
        self.write(&DownloadEvent::Error {
            id,
            message: message.to_string(),
        });
    }
}
