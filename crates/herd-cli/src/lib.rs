//! herd CLI library

pub mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use herd_common::telemetry::LogFormat;
use herd_provider::config::{resolve, ProviderConfig};

/// herd - lifecycle checks for resources behind a cluster-management API
#[derive(Parser, Debug)]
#[command(name = "herd")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Connection and output flags shared by every command
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Management API URL (overrides HERD_API_URL and the config file)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// API bearer token (overrides HERD_TOKEN and the config file)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Config file (default: ~/.herd/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log line format: text or json
    #[arg(long, global = true, env = "HERD_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,
}

impl GlobalArgs {
    /// Resolve provider configuration: flags, then environment, then file
    pub fn provider_config(&self) -> anyhow::Result<ProviderConfig> {
        let config = resolve(self.config.as_deref()).context("failed to load configuration")?;
        Ok(config.with_overrides(self.api_url.clone(), self.token.clone(), self.insecure))
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect, wait on and delete catalogs
    Catalog(commands::catalog::CatalogArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        let config = self.global.provider_config()?;
        match self.command {
            Commands::Catalog(args) => commands::catalog::run(args, &config, &cancel).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_are_accepted_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "herd",
            "catalog",
            "get",
            "cat-foo",
            "--api-url",
            "https://mgmt.example.com",
            "--insecure",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(
            cli.global.api_url.as_deref(),
            Some("https://mgmt.example.com")
        );
        assert!(cli.global.insecure);
        assert_eq!(cli.global.log_format, LogFormat::Json);
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        let err = Cli::try_parse_from(["herd", "--log-format", "yaml", "catalog", "get", "x"])
            .unwrap_err();
        assert!(err.to_string().contains("yaml"));
    }

    #[test]
    fn flags_override_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"api_url": "https://from-file", "token": "file-token", "wait_timeout_secs": 42}"#,
        )
        .unwrap();

        let global = GlobalArgs {
            api_url: Some("https://from-flag".to_string()),
            token: None,
            insecure: false,
            config: Some(path),
            log_format: LogFormat::Text,
        };
        let config = global.provider_config().unwrap();

        assert_eq!(config.api_url.as_deref(), Some("https://from-flag"));
        assert_eq!(config.wait_timeout_secs, 42);
    }
}
