//! Recorded captures and a simulated remote that serves them.
//!
//! A recording is JSON lines, one record per line:
//!
//! ```text
//! {"subject": "status/position", "timestamp": 120, "x": 1.5, "y": -0.25}
//! ```
//!
//! [`SimulatedSource`] plays the part of the remote end of a transport: it
//! reads requests off one channel and, after a fixed latency, writes batches
//! as raw JSON onto another.

use std::collections::BTreeSet;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use timescrub_types::{Batch, Record, Request, TimeRange, Timestamp};

// ============================================================================
// Recording
// ============================================================================

/// An in-memory capture, sorted by timestamp.
#[derive(Clone, Debug, Default)]
pub struct Recording {
    records: Vec<Arc<Record>>,
}

impl Recording {
    pub fn new(mut records: Vec<Arc<Record>>) -> Self {
        records.sort_by_key(|r| r.timestamp);
        Self { records }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening recording {}", path.display()))?;
        let recording = Self::from_reader(BufReader::new(file))
            .with_context(|| format!("reading recording {}", path.display()))?;
        debug!(
            path = %path.display(),
            records = recording.len(),
            start = recording.start_time(),
            end = recording.end_time(),
            "loaded recording"
        );
        Ok(recording)
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut records = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: Record = serde_json::from_str(&line)
                .with_context(|| format!("line {}", index + 1))?;
            records.push(Arc::new(record));
        }
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn start_time(&self) -> Timestamp {
        self.records.first().map_or(0, |r| r.timestamp)
    }

    pub fn end_time(&self) -> Timestamp {
        self.records.last().map_or(0, |r| r.timestamp)
    }

    /// Distinct subjects, sorted.
    pub fn subjects(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.subject.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Records of `subject` within `range`, ascending.
    pub fn in_range(&self, subject: &str, range: TimeRange) -> Vec<Arc<Record>> {
        self.records
            .iter()
            .filter(|r| r.subject == subject && range.contains(r.timestamp))
            .cloned()
            .collect()
    }

    /// The latest record of `subject` at or before `t`.
    pub fn latest_at(&self, subject: &str, t: Timestamp) -> Option<Arc<Record>> {
        self.records
            .iter()
            .rev()
            .find(|r| r.subject == subject && r.timestamp <= t)
            .cloned()
    }
}

// ============================================================================
// Simulated remote
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceMode {
    /// Answer each request with everything in its range, declaring the
    /// request's own bounds.
    Ranged,
    /// Answer each request with the subject's latest record at or before the
    /// request end.
    Live,
}

pub struct SimulatedSource {
    recording: Rc<Recording>,
    mode: SourceMode,
    latency: Duration,
}

impl SimulatedSource {
    pub fn new(recording: Rc<Recording>, mode: SourceMode, latency: Duration) -> Self {
        Self { recording, mode, latency }
    }

    /// The batch this source sends back for `request`.
    pub fn answer(&self, request: &Request) -> Batch {
        let range = request.range();
        match self.mode {
            SourceMode::Ranged => Batch::new(
                request.subject.clone(),
                range,
                self.recording.in_range(&request.subject, range),
            ),
            SourceMode::Live => match self.recording.latest_at(&request.subject, range.end) {
                Some(record) => Batch::new(
                    request.subject.clone(),
                    TimeRange::at(record.timestamp),
                    vec![record],
                ),
                None => Batch::new(request.subject.clone(), range, Vec::new()),
            },
        }
    }

    /// Serve requests until the request channel closes or nobody is
    /// listening for replies.
    ///
    /// Must be called from within a `tokio::task::LocalSet` context.
    pub fn spawn(
        self,
        mut requests: mpsc::UnboundedReceiver<Request>,
        replies: mpsc::UnboundedSender<Value>,
    ) -> JoinHandle<()> {
        tokio::task::spawn_local(async move {
            while let Some(request) = requests.recv().await {
                let batch = self.answer(&request);
                trace!(
                    subject = %request.subject,
                    range = %request.range(),
                    items = batch.items.len(),
                    "answering request"
                );
                let reply_tx = replies.clone();
                let latency = self.latency;
                tokio::task::spawn_local(async move {
                    tokio::time::sleep(latency).await;
                    let _ = reply_tx.send(batch.encode());
                });
                if replies.is_closed() {
                    break;
                }
            }
            debug!("simulated source finished");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio::task::LocalSet;

    const SAMPLE: &str = r#"
{"subject": "pos", "timestamp": 120, "x": 1}
{"subject": "pos", "timestamp": 40, "x": 0}

{"subject": "temp", "timestamp": 90, "c": 21.5}
{"subject": "pos", "timestamp": 250, "x": 2}
"#;

    fn sample() -> Recording {
        Recording::from_reader(SAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn test_load_sorts_and_skips_blank_lines() {
        let recording = sample();
        assert_eq!(recording.len(), 4);
        assert_eq!((recording.start_time(), recording.end_time()), (40, 250));
        assert_eq!(recording.subjects(), vec!["pos".to_string(), "temp".to_string()]);
        let latest = recording.latest_at("pos", 200).unwrap();
        assert_eq!(latest.timestamp, 120);
        assert_eq!(latest.get("x"), Some(&serde_json::json!(1)));
        assert!(recording.latest_at("temp", 89).is_none());
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let err = Recording::from_reader("{\"subject\":\"a\",\"timestamp\":1}\nnot json\n".as_bytes())
            .unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let recording = Recording::load(file.path()).unwrap();
        assert_eq!(recording.len(), 4);
        assert!(Recording::load(Path::new("/definitely/not/here.jsonl")).is_err());
    }

    #[test]
    fn test_ranged_answer_declares_request_bounds() {
        let source = SimulatedSource::new(Rc::new(sample()), SourceMode::Ranged, Duration::ZERO);
        let batch = source.answer(&Request::new("pos", TimeRange::new(100, 199)));
        assert_eq!(batch.range, TimeRange::new(100, 199));
        assert_eq!(batch.items.len(), 1);

        let empty = source.answer(&Request::new("pos", TimeRange::new(300, 399)));
        assert!(empty.is_empty());
        assert_eq!(empty.range, TimeRange::new(300, 399));
    }

    #[test]
    fn test_live_answer_is_latest_before_end() {
        let source = SimulatedSource::new(Rc::new(sample()), SourceMode::Live, Duration::ZERO);
        let batch = source.answer(&Request::new("pos", TimeRange::new(0, 200)));
        assert_eq!(batch.items.len(), 1);
        assert_eq!(batch.items[0].timestamp, 120);
        assert_eq!(batch.range, TimeRange::at(120));

        let none = source.answer(&Request::new("pos", TimeRange::new(0, 10)));
        assert!(none.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_source_replies_after_latency() {
        LocalSet::new()
            .run_until(async {
                let source = SimulatedSource::new(
                    Rc::new(sample()),
                    SourceMode::Ranged,
                    Duration::from_millis(30),
                );
                let (req_tx, req_rx) = mpsc::unbounded_channel();
                let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
                let handle = source.spawn(req_rx, reply_tx);

                let started = tokio::time::Instant::now();
                req_tx.send(Request::new("pos", TimeRange::new(0, 99))).unwrap();
                let reply = reply_rx.recv().await.unwrap();
                assert!(started.elapsed() >= Duration::from_millis(30));

                let batch = Batch::decode(reply).unwrap();
                assert_eq!(batch.items[0].timestamp, 40);

                drop(req_tx);
                handle.await.unwrap();
            })
            .await;
    }
}
