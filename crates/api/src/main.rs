//! Attention Monitor - Main Entry Point

use std::path::PathBuf;

use anyhow::Context;
use api::{init_logging, run_server, AnalysisPipeline, AppConfig, RenderTargets};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Eye-tracking attention analysis for recorded webcam videos")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, short, global = true, env = "ATTENTION_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (default)
    Serve {
        /// Override the configured bind address
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },
    /// Analyze one video and print the JSON report
    Analyze {
        video: PathBuf,

        /// Directory for the rendered plots
        #[arg(long, default_value = ".", value_name = "DIR")]
        out_dir: PathBuf,

        /// Write annotated frames to this directory
        #[arg(long, value_name = "DIR")]
        annotate_dir: Option<PathBuf>,

        /// Annotate every Nth frame
        #[arg(long, default_value_t = 30)]
        annotate_every: u32,

        /// Stop after this many frames while annotating
        #[arg(long, value_name = "FRAMES", requires = "annotate_dir")]
        max_frames: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    init_logging(&config.server.log_level, config.server.log_format)
        .context("installing tracing subscriber")?;

    info!("=== Attention Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind_addr = bind;
            }
            run_server(config)
                .await
                .map_err(|e| anyhow::anyhow!("server failed: {}", e))?;
        }
        Command::Analyze {
            video,
            out_dir,
            annotate_dir,
            annotate_every,
            max_frames,
        } => {
            if annotate_dir.is_some() {
                config.annotate.dir = annotate_dir;
                config.annotate.every = annotate_every;
                config.annotate.max_frames = max_frames;
            }
            let pipeline = AnalysisPipeline::from_config(&config).context("building pipeline")?;
            let targets = RenderTargets {
                plot: out_dir.join(&config.storage.plot_file),
                pie: Some(out_dir.join(&config.storage.pie_file)),
            };

            let report = tokio::task::spawn_blocking(move || pipeline.run(&video, &targets))
                .await
                .context("analysis task panicked")?
                .context("analysis failed")?;

            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
