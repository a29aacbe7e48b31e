//! JSON Lines result sink.
//!
//! One line per submission:
//!
//! ```text
//! {"kind":"indicators","batch_seq_id":1,"items":[{"symbol":"A","ema_fast":..,"ema_slow":..}]}
//! {"kind":"crossovers","batch_seq_id":1,"items":[]}
//! ```
//!
//! The file is flushed after each batch's crossover line, so a reader
//! never sees half a batch after a clean submission.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use emaflow_core::{CrossoverEvent, Indicator};
use emaflow_pipeline::{BoxFuture, PipelineError, PipelineResult, ResultSink};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ReplayResult;

/// One line of the output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SinkRecord {
    Indicators {
        batch_seq_id: u64,
        items: Vec<Indicator>,
    },
    Crossovers {
        batch_seq_id: u64,
        items: Vec<CrossoverEvent>,
    },
}

struct Output {
    writer: BufWriter<File>,
    records_written: u64,
}

/// Writes submissions to a JSON Lines file, truncating it on create.
pub struct JsonLinesSink {
    path: PathBuf,
    output: parking_lot::Mutex<Output>,
}

impl JsonLinesSink {
    pub fn create(path: impl Into<PathBuf>) -> ReplayResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        info!(path = %path.display(), "Opening JSON Lines sink");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        Ok(Self {
            path,
            output: parking_lot::Mutex::new(Output {
                writer: BufWriter::new(file),
                records_written: 0,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records_written(&self) -> u64 {
        self.output.lock().records_written
    }

    fn write_record(&self, record: &SinkRecord, flush: bool) -> ReplayResult<()> {
        let mut output = self.output.lock();
        serde_json::to_writer(&mut output.writer, record)?;
        output.writer.write_all(b"\n")?;
        output.records_written += 1;
        if flush {
            output.writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for JsonLinesSink {
    fn drop(&mut self) {
        let output = self.output.get_mut();
        if output.writer.flush().is_ok() {
            debug!(
                path = %self.path.display(),
                records = output.records_written,
                "Closed JSON Lines sink"
            );
        }
    }
}

impl ResultSink for JsonLinesSink {
    fn submit_indicators(
        &self,
        batch_seq_id: u64,
        indicators: Vec<Indicator>,
    ) -> BoxFuture<'_, PipelineResult<()>> {
        Box::pin(async move {
            let record = SinkRecord::Indicators {
                batch_seq_id,
                items: indicators,
            };
            self.write_record(&record, false)
                .map_err(|e| PipelineError::Sink(e.to_string()))
        })
    }

    fn submit_crossovers(
        &self,
        batch_seq_id: u64,
        crossovers: Vec<CrossoverEvent>,
    ) -> BoxFuture<'_, PipelineResult<()>> {
        Box::pin(async move {
            let record = SinkRecord::Crossovers {
                batch_seq_id,
                items: crossovers,
            };
            self.write_record(&record, true)
                .map_err(|e| PipelineError::Sink(e.to_string()))
        })
    }
}

/// Read back every record of a sink output file.
pub fn read_records(path: &Path) -> ReplayResult<Vec<SinkRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            records.push(serde_json::from_str(&line)?);
        }
    }
    Ok(records)
}
