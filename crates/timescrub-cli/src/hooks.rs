//! Playback hooks that print each subject's most recent record per frame.

use std::cell::Cell;
use std::io::Write;

use async_trait::async_trait;
use tracing::info;

use timescrub_player::{Loader, PlayerHooks};
use timescrub_types::{RequestSpec, SubjectRequest, Timestamp};

pub struct PrintHooks {
    subjects: Vec<SubjectRequest>,
    window_ms: i64,
    frames: Cell<u64>,
}

impl PrintHooks {
    pub fn new(subjects: impl IntoIterator<Item = String>, window_ms: i64) -> Self {
        Self {
            subjects: subjects.into_iter().map(SubjectRequest::new).collect(),
            window_ms,
            frames: Cell::new(0),
        }
    }

    /// Frames shown so far.
    pub fn frames(&self) -> u64 {
        self.frames.get()
    }

    /// One output line per subject: the latest record within the window
    /// ending at `ts`, or a dash when there is none.
    pub async fn render(&self, loader: &dyn Loader, ts: Timestamp) -> anyhow::Result<Vec<String>> {
        let mut lines = Vec::with_capacity(self.subjects.len());
        for spec in &self.subjects {
            let records = loader
                .get_message(spec, ts.saturating_sub(self.window_ms).max(0), ts)
                .await?;
            let shown = match records.first() {
                Some(record) => format!(
                    "@{} {}",
                    record.timestamp,
                    serde_json::Value::Object(record.payload.clone())
                ),
                None => "-".to_string(),
            };
            lines.push(format!("{ts:>8}  {:<24} {shown}", spec.subject()));
        }
        Ok(lines)
    }
}

#[async_trait(?Send)]
impl PlayerHooks for PrintHooks {
    async fn on_play(&self, _loader: &dyn Loader, ts: Timestamp) -> anyhow::Result<()> {
        info!(ts, "playing");
        Ok(())
    }

    async fn on_pause(&self, _loader: &dyn Loader, ts: Timestamp) -> anyhow::Result<()> {
        info!(ts, "paused");
        Ok(())
    }

    async fn on_seek(&self, loader: &dyn Loader, ts: Timestamp) -> anyhow::Result<bool> {
        let lines = self.render(loader, ts).await?;
        let mut out = std::io::stdout().lock();
        for line in lines {
            writeln!(out, "{line}")?;
        }
        self.frames.set(self.frames.get() + 1);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use timescrub_cache::{CacheError, DataProvider};
    use timescrub_player::PlaybackDataLoader;
    use timescrub_types::{Record, TimeRange};

    use crate::source::Recording;

    /// Serves straight from a recording, latest first.
    struct RecordingProvider(Recording);

    #[async_trait(?Send)]
    impl DataProvider for RecordingProvider {
        async fn get(
            &self,
            spec: &dyn RequestSpec,
            range: TimeRange,
        ) -> Result<Vec<Arc<Record>>, CacheError> {
            let mut records = self.0.in_range(spec.subject(), range);
            records.reverse();
            Ok(records)
        }

        fn start_time(&self) -> Timestamp {
            self.0.start_time()
        }

        fn end_time(&self) -> Timestamp {
            self.0.end_time()
        }

        fn clear(&self) {}
    }

    #[tokio::test]
    async fn test_render_shows_latest_in_window() {
        let recording = Recording::from_reader(
            concat!(
                "{\"subject\":\"pos\",\"timestamp\":10,\"x\":1}\n",
                "{\"subject\":\"pos\",\"timestamp\":50,\"x\":2}\n",
            )
            .as_bytes(),
        )
        .unwrap();
        let loader = PlaybackDataLoader::new(RecordingProvider(recording));
        let hooks = PrintHooks::new(["pos".to_string(), "temp".to_string()], 100);

        let lines = hooks.render(&loader, 60).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("pos"));
        assert!(lines[0].contains("@50 {\"x\":2}"));
        assert!(lines[1].trim_end().ends_with('-'));

        assert!(hooks.on_seek(&loader, 60).await.unwrap());
        assert_eq!(hooks.frames(), 1);
    }
}
