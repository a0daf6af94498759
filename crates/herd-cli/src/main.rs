//! herd - catalog lifecycle checks against a management API

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use herd_cli::Cli;
use herd_common::telemetry::{init_logging, LoggingConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&LoggingConfig {
        format: cli.global.log_format,
        ..Default::default()
    })?;

    // Ctrl-C ends any wait in progress with a cancellation error
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            trigger.cancel();
        }
    });

    cli.run(cancel).await
}
