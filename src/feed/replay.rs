//! JSON-lines bar replay

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::common::errors::Result;
use crate::common::events::EngineEvent;
use crate::common::traits::BarFeed;
use crate::common::types::{Bar, RawBar};

/// Replays recorded bars, one JSON object per line
///
/// Blank lines and lines starting with `#` are skipped. Records that fail
/// to parse or normalize are logged and dropped.
pub struct ReplayFeed {
    path: PathBuf,
    name: String,
    /// Delay between bars; `None` replays as fast as the receiver drains
    pace: Option<Duration>,
}

impl ReplayFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("replay:{}", path.display());
        Self { path, name, pace: None }
    }

    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = Some(pace);
        self
    }

    /// Parse one line into a bar, `Ok(None)` for skippable lines
    pub fn parse_line(line: &str) -> Result<Option<Bar>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let raw: RawBar = serde_json::from_str(line)?;
        Bar::from_raw(raw).map(Some)
    }
}

#[async_trait]
impl BarFeed for ReplayFeed {
    async fn start(&mut self, sender: mpsc::Sender<EngineEvent>) -> Result<()> {
        info!("Starting {}", self.name);
        let file = File::open(&self.path).await?;
        let mut lines = BufReader::new(file).lines();

        let mut line_no = 0usize;
        let mut sent = 0usize;
        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            let bar = match Self::parse_line(&line) {
                Ok(Some(bar)) => bar,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Skipping line {} of {}: {}", line_no, self.name, e);
                    continue;
                }
            };

            if sender.send(EngineEvent::Bar(bar)).await.is_err() {
                debug!("Receiver dropped, stopping {}", self.name);
                break;
            }
            sent += 1;

            if let Some(pace) = self.pace {
                tokio::time::sleep(pace).await;
            }
        }

        info!("{} finished: {} bars from {} lines", self.name, sent, line_no);
        Ok(())
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}
