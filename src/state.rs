use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier correlating a download with every event it produces.
///
/// Ids are random and never reused, including across `clear()`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct DownloadId(Uuid);

impl DownloadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DownloadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl std::str::FromStr for DownloadId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle of a download record.
///
/// `Idle` is the only initial state, `Finished` and `Errored` are terminal.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    #[default]
    Idle,
    Running,
    Interrupting,
    Finished,
    Errored,
}

impl DownloadState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Interrupting => "interrupting",
            Self::Finished => "finished",
            Self::Errored => "errored",
        }
    }

    /// A worker exists and has not reported its terminal event yet.
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Interrupting)
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Errored)
    }
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
