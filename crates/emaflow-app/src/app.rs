//! Application wiring: builds the source, sink and pipeline from
//! configuration and runs them to completion.

use crate::config::{AppConfig, SourceKind};
use crate::error::{AppError, AppResult};
use emaflow_pipeline::{BatchSource, Pipeline, PipelineReport};
use emaflow_replay::{JsonLinesSink, ReplaySource, SyntheticSource};
use emaflow_telemetry::Metrics;
use std::sync::Arc;
use tracing::{info, warn};

/// Main application.
pub struct Application {
    config: AppConfig,
    pipeline: Pipeline,
}

impl Application {
    /// Validate the configuration and build the pipeline.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let pipeline = Pipeline::new(config.pipeline.clone(), config.tracker)?;
        Ok(Self { config, pipeline })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn build_source(&self) -> AppResult<Arc<dyn BatchSource>> {
        let source: Arc<dyn BatchSource> = match self.config.source.kind {
            SourceKind::Replay => {
                let path = self.config.source.path.as_deref().ok_or_else(|| {
                    AppError::Config("source.path is required for replay sources".to_string())
                })?;
                info!(path, "Using replay source");
                Arc::new(ReplaySource::new(path))
            }
            SourceKind::Synthetic => {
                info!(batches = self.config.source.synthetic.batches, "Using synthetic source");
                Arc::new(SyntheticSource::new(self.config.source.synthetic.clone())?)
            }
        };
        Ok(source)
    }

    /// Run the pipeline until the source is drained, a fatal error occurs
    /// or Ctrl-C is received.
    pub async fn run(self) -> AppResult<PipelineReport> {
        let source = self.build_source()?;
        let sink = Arc::new(JsonLinesSink::create(&self.config.sink.path)?);

        let report = tokio::select! {
            result = self.pipeline.run(source, sink.clone()) => result?,
            _ = tokio::signal::ctrl_c() => {
                warn!("Shutdown signal received, abandoning run");
                return Err(AppError::Shutdown);
            }
        };

        info!(
            batches = report.batches_submitted,
            last_seq_id = ?report.last_seq_id,
            events = report.events_processed,
            late_events = report.late_events,
            windows_closed = report.windows_closed,
            trackers = report.trackers,
            indicators = report.indicators_submitted,
            crossovers = report.crossovers_submitted,
            output = %sink.path().display(),
            "Run complete"
        );

        if self.config.telemetry.dump_metrics {
            println!("{}", Metrics::gather_text()?);
        }

        Ok(report)
    }
}
