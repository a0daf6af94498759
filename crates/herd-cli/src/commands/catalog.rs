//! `herd catalog` commands
//!
//! - `get <id>` prints the catalog as JSON
//! - `wait <id>` polls until the catalog reaches a target state
//! - `delete <id>` deletes the catalog and waits for its removal
//! - `check-destroyed <id>...` fails if any of the catalogs still exists

use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use herd_common::wait::{wait_for_state_until_cancelled, PollSpec};
use herd_common::{Error, STATE_ACTIVE, STATE_ERROR, STATE_REMOVED, STATE_REMOVING};
use herd_provider::checks::{
    check_destroyed_all, check_exists, delete_resource, disappear_until_cancelled, state_refresh,
};
use herd_provider::client::http::ManagementClient;
use herd_provider::{ApiObject, Catalog, ProviderConfig, ResourceClient};

/// Inspect, wait on and delete catalogs
#[derive(Args, Debug)]
pub struct CatalogArgs {
    #[command(subcommand)]
    pub command: CatalogCommand,
}

#[derive(Subcommand, Debug)]
pub enum CatalogCommand {
    /// Print a catalog as JSON
    Get {
        /// Catalog id
        id: String,
    },

    /// Wait until a catalog reaches a target state
    Wait(WaitArgs),

    /// Delete a catalog and wait until it is removed
    Delete {
        /// Catalog id
        id: String,

        /// Return once the deletion is accepted
        #[arg(long)]
        no_wait: bool,
    },

    /// Fail if any of the catalogs still exists
    CheckDestroyed {
        /// Catalog ids
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

/// Poll settings for `herd catalog wait`
#[derive(Args, Debug)]
pub struct WaitArgs {
    /// Catalog id
    pub id: String,

    /// States that mean "still in progress"
    #[arg(long, value_delimiter = ',', default_values_t = [STATE_ACTIVE.to_string(), STATE_REMOVING.to_string()])]
    pub pending: Vec<String>,

    /// States that mean success ("removed" also matches a missing catalog)
    #[arg(long, value_delimiter = ',', default_values_t = [STATE_REMOVED.to_string()])]
    pub target: Vec<String>,

    /// States that mean the server gave up
    #[arg(long, value_delimiter = ',', default_values_t = [STATE_ERROR.to_string()])]
    pub failure: Vec<String>,

    /// Overall timeout, e.g. "10m" (default: wait_timeout_secs from config)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Delay before the first probe (default: wait_delay_secs from config)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub delay: Option<Duration>,

    /// Minimum time between probes (default: wait_min_interval_secs from config)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub min_interval: Option<Duration>,

    /// Poll at a fixed interval instead of backing off
    #[arg(long, value_parser = humantime::parse_duration)]
    pub poll_interval: Option<Duration>,

    /// Consecutive target observations required
    #[arg(long, default_value_t = 1)]
    pub target_occurrences: u32,
}

impl WaitArgs {
    /// Build the poll spec, falling back to configured timing
    pub fn poll_spec(&self, config: &ProviderConfig) -> PollSpec {
        let mut spec = PollSpec::new(self.pending.iter().cloned(), self.target.iter().cloned())
            .with_failure(self.failure.iter().cloned())
            .with_timeout(
                self.timeout
                    .unwrap_or(Duration::from_secs(config.wait_timeout_secs)),
            )
            .with_initial_delay(
                self.delay
                    .unwrap_or(Duration::from_secs(config.wait_delay_secs)),
            )
            .with_min_interval(
                self.min_interval
                    .unwrap_or(Duration::from_secs(config.wait_min_interval_secs)),
            )
            .with_target_occurrences(self.target_occurrences);
        if let Some(interval) = self.poll_interval {
            spec = spec.with_poll_interval(interval);
        }
        spec
    }
}

/// Run a catalog command against the configured management API
pub async fn run(
    args: CatalogArgs,
    config: &ProviderConfig,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let client = ManagementClient::new(config).context("failed to create management API client")?;
    execute_to_stdout(args.command, &client.catalogs(), config, cancel).await
}

/// Run a catalog command and print its output once it finishes
///
/// Output is buffered so stdout is never locked while a wait is in progress.
pub async fn execute_to_stdout<C>(
    command: CatalogCommand,
    client: &C,
    config: &ProviderConfig,
    cancel: &CancellationToken,
) -> anyhow::Result<()>
where
    C: ResourceClient<Resource = Catalog>,
{
    let mut out = Vec::new();
    let result = execute(command, client, config, cancel, &mut out).await;
    std::io::stdout().lock().write_all(&out)?;
    result
}

/// Run a catalog command against any catalog client, writing results to `out`
pub async fn execute<C, W>(
    command: CatalogCommand,
    client: &C,
    config: &ProviderConfig,
    cancel: &CancellationToken,
    out: &mut W,
) -> anyhow::Result<()>
where
    C: ResourceClient<Resource = Catalog>,
    W: Write,
{
    match command {
        CatalogCommand::Get { id } => {
            let catalog = check_exists(client, &id).await?;
            writeln!(out, "{}", serde_json::to_string_pretty(&catalog)?)?;
        }
        CatalogCommand::Wait(args) => {
            let spec = args.poll_spec(config);
            let description = format!("{} {}", Catalog::KIND, args.id);
            let done = wait_for_state_until_cancelled(
                &spec,
                &description,
                cancel,
                state_refresh(client, &args.id),
            )
            .await
            .map_err(|e| {
                let action = format!("reach {}", args.target.join("|"));
                Error::wait(Catalog::KIND, &args.id, action, e)
            })?;
            writeln!(
                out,
                "{} {} reached state {} after {} checks",
                Catalog::KIND,
                args.id,
                done.state,
                done.attempts
            )?;
        }
        CatalogCommand::Delete { id, no_wait } => {
            if no_wait {
                let catalog = check_exists(client, &id).await?;
                delete_resource(client, &catalog).await?;
                info!(id = %id, "Deletion requested");
                writeln!(out, "{} {} deletion requested", Catalog::KIND, id)?;
            } else {
                disappear_until_cancelled(client, &id, &config.removal_spec(), cancel).await?;
                writeln!(out, "{} {} removed", Catalog::KIND, id)?;
            }
        }
        CatalogCommand::CheckDestroyed { ids } => {
            check_destroyed_all(client, &ids).await?;
            writeln!(out, "{} {} destroyed", ids.len(), Catalog::COLLECTION)?;
        }
    }
    Ok(())
}
