//! Automated order-execution gateway - entry point.
//!
//! Reads structured trade signals (one JSON object per line) on stdin and
//! forwards them to the execution pipeline. The signal-extraction
//! collaborator runs as a separate process and pipes into us.

use anyhow::Result;
use clap::Parser;
use pilot_core::TradeSignal;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Automated brokerage order-execution gateway
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via PILOT_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    pilot_telemetry::init_logging()?;

    info!("Starting pilot v{}", env!("CARGO_PKG_VERSION"));

    let config = pilot_bot::AppConfig::load(args.config)?;

    let (tx, rx) = mpsc::channel::<TradeSignal>(64);
    tokio::spawn(read_signals_from_stdin(tx));

    let app = pilot_bot::Application::new(config)?;
    app.run(rx).await?;

    Ok(())
}

/// Forward newline-delimited JSON signals from stdin into the loop.
/// Malformed lines are logged and skipped. Dropping the sender on EOF
/// shuts the loop down cleanly.
async fn read_signals_from_stdin(tx: mpsc::Sender<TradeSignal>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<TradeSignal>(line) {
                    Ok(signal) => {
                        if tx.send(signal).await.is_err() {
                            return; // loop stopped
                        }
                    }
                    Err(e) => warn!(error = %e, raw = %line, "Ignoring malformed signal"),
                }
            }
            Ok(None) => {
                info!("Signal input closed");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read signal input");
                return;
            }
        }
    }
}
