//! # Lumen daemon
//!
//! Runs the status-to-LED bridge against an OPC server.
//!
//! ```bash
//! # Stream a colour chase to a local OPC server, render on status changes
//! echo '{"home":true,"status":{"level":8}}' | lumen-daemon --server 127.0.0.1:7890 -v
//! ```
//!
//! Status arrives on stdin as JSON lines (`{"home":bool,"status":...}`).
//! Ctrl-C stops every loop.

mod demo;
mod input;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::Receiver;
use demo::{ChaseSequencer, LogRenderer, StrandLengths};
use input::Status;
use lumen_bridge::{
    Bridge, BridgeConfig, BridgeError, Sequencer, SequencerFactory, Shutdown, StatusHub,
    TcpConnector,
};
use std::path::PathBuf;
use std::thread;
use tracing::{info, warn};

/// Lumen bridge daemon
#[derive(Parser, Debug)]
#[command(name = "lumen-daemon")]
#[command(about = "Drive OPC LED devices from a status feed", long_about = None)]
#[command(version)]
struct Args {
    /// OPC server address (overrides the config file)
    ///
    /// Format: HOST:PORT (e.g. 127.0.0.1:7890)
    #[arg(long, env = "LUMEN_SERVER")]
    server: Option<String>,

    /// TOML config file
    #[arg(long, env = "LUMEN_CONFIG")]
    config: Option<PathBuf>,

    /// Render intensity, 0.0 to 1.0 (overrides the config file)
    #[arg(long, env = "LUMEN_INTENSITY")]
    intensity: Option<f32>,

    /// Demo device strand lengths, comma separated; 0 marks an unused output
    #[arg(long, env = "LUMEN_STRANDS", default_value = "64,64")]
    strands: StrandLengths,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Config file (or defaults) with command-line overrides applied.
    fn bridge_config(&self) -> Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                BridgeConfig::from_toml_str(&raw)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            },
            None => BridgeConfig::default(),
        };

        if let Some(server) = &self.server {
            config.server = server.clone();
        }
        if let Some(intensity) = self.intensity {
            config.intensity = intensity;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("lumen_bridge={level}").parse()?)
                .add_directive(format!("lumen_device={level}").parse()?)
                .add_directive(format!("lumen_daemon={level}").parse()?),
        )
        .init();
    Ok(())
}

/// Drain the error channel into the log until every loop has exited.
fn observe_errors(errors: Receiver<BridgeError>) -> usize {
    let mut seen = 0;
    for err in errors.iter() {
        seen += 1;
        warn!("Bridge error: {}", err);
    }
    seen
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;
    let config = args.bridge_config()?;

    let shutdown = Shutdown::new();
    let handler = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Interrupt received, shutting down");
        handler.trigger();
    })
    .context("Failed to install Ctrl-C handler")?;

    let hub: StatusHub<Status> = StatusHub::new(config.status_capacity);
    let connector = TcpConnector::new(config.connect_timeout(), config.write_timeout());
    let strands = args.strands.clone();
    let sequencer: SequencerFactory =
        Box::new(move || Ok(Box::new(ChaseSequencer::new(strands)) as Box<dyn Sequencer>));

    let (bridge, errors) = Bridge::start(
        &config,
        &hub,
        LogRenderer::default(),
        sequencer,
        &connector,
        shutdown.clone(),
    )?;

    let observer = thread::Builder::new()
        .name("lumen-errors".into())
        .spawn(move || observe_errors(errors))
        .context("Failed to spawn error observer")?;
    input::spawn_stdin_reader(hub.clone()).context("Failed to spawn status reader")?;

    info!("Lumen daemon running against {}. Press Ctrl+C to stop.", config.server);
    shutdown.signal().wait();

    hub.close();
    let metrics = bridge.metrics().clone();
    let exit = bridge.join();
    let reported = observer
        .join()
        .map_err(|_| anyhow::anyhow!("Error observer panicked"))?;
    let totals = metrics.snapshot();

    info!(
        "Stopped: {} render(s), {} frame(s) sent, {} send failure(s), {} error(s) reported",
        totals.renders, totals.frames_sent, totals.send_failures, reported
    );

    for (name, result) in [
        ("status listener", exit.status),
        ("render loop", exit.render),
        ("frame streamer", exit.stream),
    ] {
        if let Err(e) = result {
            warn!("{} ended with error: {}", name, e);
        }
    }
    Ok(())
}
