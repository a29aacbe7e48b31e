//! JSON Lines replay source.
//!
//! One `Batch` per line, in sequence order. Blank lines are skipped. The
//! final batch of the file is always flagged `is_last`, so a recording cut
//! short still terminates the run.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};

use emaflow_core::Batch;
use emaflow_pipeline::{BatchSource, BoxFuture, PipelineResult};
use tracing::{debug, info};

use crate::error::{ReplayError, ReplayResult};

struct Reader {
    lines: Lines<BufReader<File>>,
    line_no: usize,
    /// One-batch lookahead so the final batch can be flagged.
    peeked: Option<ReplayResult<Batch>>,
    batches_read: u64,
}

impl Reader {
    fn open(path: &Path) -> ReplayResult<Self> {
        let file = File::open(path)?;
        let mut reader = Self {
            lines: BufReader::new(file).lines(),
            line_no: 0,
            peeked: None,
            batches_read: 0,
        };
        reader.peeked = reader.read_batch();
        Ok(reader)
    }

    /// Next non-blank line parsed as a batch, `None` at end of file.
    fn read_batch(&mut self) -> Option<ReplayResult<Batch>> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            return Some(Batch::from_json(&line).map_err(|e| ReplayError::Format {
                line: self.line_no,
                reason: e.to_string(),
            }));
        }
    }

    fn advance(&mut self) -> ReplayResult<Batch> {
        let current = self.peeked.take().ok_or_else(|| ReplayError::Format {
            line: self.line_no,
            reason: "read past end of recording".to_string(),
        })?;
        self.peeked = self.read_batch();

        let mut batch = current?;
        if self.peeked.is_none() {
            batch.is_last = true;
        }
        self.batches_read += 1;
        Ok(batch)
    }
}

/// Replays a recorded stream from a JSON Lines file.
pub struct ReplaySource {
    path: PathBuf,
    reader: parking_lot::Mutex<Option<Reader>>,
}

impl ReplaySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reader: parking_lot::Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the file. No-op if already open.
    pub fn open(&self) -> ReplayResult<()> {
        let mut reader = self.reader.lock();
        if reader.is_none() {
            info!(path = %self.path.display(), "Opening replay file");
            *reader = Some(Reader::open(&self.path)?);
        }
        Ok(())
    }

    /// Close the file. No-op if not open.
    pub fn close(&self) {
        if let Some(reader) = self.reader.lock().take() {
            info!(
                path = %self.path.display(),
                batches = reader.batches_read,
                "Closed replay file"
            );
        }
    }

    fn read_next(&self) -> ReplayResult<Batch> {
        let mut guard = self.reader.lock();
        let reader = guard.as_mut().ok_or(ReplayError::NotStarted)?;
        let batch = reader.advance()?;
        debug!(seq_id = batch.seq_id, events = batch.events.len(), "Replayed batch");
        Ok(batch)
    }
}

impl BatchSource for ReplaySource {
    fn start(&self) -> BoxFuture<'_, PipelineResult<()>> {
        Box::pin(async move { Ok(self.open()?) })
    }

    fn has_next(&self) -> bool {
        self.reader
            .lock()
            .as_ref()
            .is_some_and(|r| r.peeked.is_some())
    }

    fn next(&self) -> BoxFuture<'_, PipelineResult<Batch>> {
        Box::pin(async move { Ok(self.read_next()?) })
    }

    fn stop(&self) -> BoxFuture<'_, PipelineResult<()>> {
        self.close();
        Box::pin(async { Ok(()) })
    }
}

/// Write `batches` as a replayable JSON Lines recording.
///
/// Returns the number of batches written.
pub fn write_recording(path: &Path, batches: &[Batch]) -> ReplayResult<usize> {
    let mut writer = BufWriter::new(File::create(path)?);
    for batch in batches {
        serde_json::to_writer(&mut writer, batch)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(batches.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use emaflow_core::{Event, SecurityType, Timestamp};
    use emaflow_pipeline::PipelineError;
    use tempfile::TempDir;

    fn batch(seq_id: u64) -> Batch {
        Batch::new(
            seq_id,
            vec![Event::new(
                "IBM.FR",
                SecurityType::Equity,
                101.5,
                Timestamp::from_secs(1_000 + seq_id as i64),
            )],
            vec!["IBM.FR".to_string()],
        )
    }

    #[tokio::test]
    async fn test_replay_round_trip_forces_last() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("batches.jsonl");
        write_recording(&path, &[batch(1), batch(2), batch(3)]).unwrap();

        let source = ReplaySource::new(&path);
        assert!(!source.has_next());
        source.start().await.unwrap();

        let mut seen = Vec::new();
        while source.has_next() {
            seen.push(source.next().await.unwrap());
        }
        source.stop().await.unwrap();

        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], batch(1));
        assert!(!seen[1].is_last);
        assert!(seen[2].is_last);
    }

    #[tokio::test]
    async fn test_blank_lines_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("batches.jsonl");
        std::fs::write(
            &path,
            "\n{\"seq_id\":1,\"lookup_symbols\":[]}\n\n{\"seq_id\":2}\n\n",
        )
        .unwrap();

        let source = ReplaySource::new(&path);
        source.start().await.unwrap();
        assert_eq!(source.next().await.unwrap().seq_id, 1);
        let last = source.next().await.unwrap();
        assert_eq!(last.seq_id, 2);
        assert!(last.is_last);
        assert!(!source.has_next());
    }

    #[tokio::test]
    async fn test_bad_line_reports_position() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("batches.jsonl");
        std::fs::write(&path, "{\"seq_id\":1}\nnot json\n").unwrap();

        let source = ReplaySource::new(&path);
        source.start().await.unwrap();
        assert!(source.next().await.is_ok());
        assert!(source.has_next());

        match source.read_next() {
            Err(ReplayError::Format { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("batches.jsonl");
        write_recording(&path, &[batch(1)]).unwrap();

        let source = ReplaySource::new(&path);
        source.start().await.unwrap();
        source.start().await.unwrap();
        assert!(source.next().await.unwrap().is_last);

        source.stop().await.unwrap();
        source.stop().await.unwrap();
        assert!(!source.has_next());
    }

    #[tokio::test]
    async fn test_missing_file_is_source_error() {
        let source = ReplaySource::new("/nonexistent/emaflow/batches.jsonl");
        let err = source.start().await.unwrap_err();
        assert!(matches!(err, PipelineError::Source(_)));
    }

    #[tokio::test]
    async fn test_next_before_start() {
        let source = ReplaySource::new("unused.jsonl");
        assert!(matches!(source.read_next(), Err(ReplayError::NotStarted)));
    }
}
