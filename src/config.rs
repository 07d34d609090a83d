use reqwest::Client;
use std::time::Duration;

/// Size of the pieces a response body is written in.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// HTTP and I/O settings shared by every transfer of a registry.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Upper bound on bytes written between two cancellation checks.
    pub chunk_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("batchdl/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: Duration::from_secs(10),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl TransferConfig {
    pub fn build_client(&self) -> Client {
        Client::builder()
            .user_agent(&self.user_agent)
            .connect_timeout(self.connect_timeout)
            .build()
            .unwrap_or_else(|_| Client::new())
    }

    /// Chunk size with zero mapped to the default, since a zero-sized
    /// chunk would never make progress.
    pub fn effective_chunk_size(&self) -> usize {
        if self.chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            self.chunk_size
        }
    }
}
