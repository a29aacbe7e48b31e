//! emaflow - sharded EMA crossover pipeline, entry point.

use anyhow::Result;
use clap::Parser;
use emaflow_app::{AppConfig, Application, ConfigOrigin, SourceKind, DEFAULT_CONFIG_PATH};
use tracing::{info, warn};

/// Streaming EMA crossover pipeline
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via EMAFLOW_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Number of shards (overrides pipeline.num_shards)
    #[arg(long)]
    shards: Option<usize>,

    /// Number of producers (overrides pipeline.num_producers)
    #[arg(long)]
    producers: Option<usize>,

    /// Shard queue capacity (overrides pipeline.queue_capacity)
    #[arg(long = "queue-size")]
    queue_size: Option<usize>,

    /// Replay a JSON Lines recording instead of the configured source
    #[arg(short, long, conflicts_with = "synthetic")]
    input: Option<String>,

    /// Use the synthetic generator regardless of the configured source
    #[arg(long)]
    synthetic: bool,

    /// Output JSON Lines file (overrides sink.path)
    #[arg(short, long)]
    output: Option<String>,
}

impl Args {
    fn apply(self, config: &mut AppConfig) {
        if let Some(shards) = self.shards {
            config.pipeline.num_shards = shards;
        }
        if let Some(producers) = self.producers {
            config.pipeline.num_producers = producers;
        }
        if let Some(queue_size) = self.queue_size {
            config.pipeline.queue_capacity = queue_size;
        }
        if let Some(input) = self.input {
            config.source.kind = SourceKind::Replay;
            config.source.path = Some(input);
        }
        if self.synthetic {
            config.source.kind = SourceKind::Synthetic;
        }
        if let Some(output) = self.output {
            config.sink.path = output;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config first: it carries the default log filter.
    let (mut config, origin) = AppConfig::load(args.config.as_deref())?;
    emaflow_telemetry::init_logging(&config.telemetry.log_filter)?;

    info!("Starting emaflow v{}", env!("CARGO_PKG_VERSION"));
    match &origin {
        ConfigOrigin::File(path) => info!(path = %path, "Config file loaded"),
        ConfigOrigin::Defaults => {
            warn!(path = DEFAULT_CONFIG_PATH, "Config file not found, using defaults")
        }
    }

    args.apply(&mut config);
    info!(
        shards = config.pipeline.num_shards,
        producers = config.pipeline.num_producers,
        queue_capacity = config.pipeline.queue_capacity,
        source = ?config.source.kind,
        output = %config.sink.path,
        "Configuration loaded"
    );

    let app = Application::new(config)?;
    app.run().await?;

    Ok(())
}
