use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};
use uuid::Uuid;

use confstream_kernel::{InMemoryLogStore, RepoError, Repository, VersionedRecord};

mod app_config;
mod config;

use app_config::AppConfig;
use config::CliConfig;

type DemoRepo = Repository<AppConfig, InMemoryLogStore>;
type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Confstream demo CLI
#[derive(Parser, Debug)]
#[command(name = "confstream")]
#[command(about = "Replicated versioned configuration (in-memory demo)", long_about = None)]
struct Cli {
    /// Path to a JSON array of update commands
    #[arg(long)]
    updates: String,

    /// Number of repository instances sharing the log
    #[arg(long, default_value_t = 2)]
    instances: usize,

    /// First version of the printed history (inclusive)
    #[arg(long)]
    from: Option<u64>,

    /// End of the printed history (exclusive)
    #[arg(long)]
    to: Option<u64>,

    /// Attempts per command after losing a concurrent update
    #[arg(long, default_value_t = 5)]
    max_retries: u32,

    /// Apply the configured logLevel to this process as it changes
    #[arg(long)]
    follow_log_level: bool,

    /// Keep following the log until interrupted
    #[arg(long)]
    watch: bool,
}

/// One entry of the updates file.
#[derive(Debug, Deserialize)]
struct UpdateCommand {
    by: String,
    config: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct Rejection {
    by: String,
    reason: String,
}

#[derive(Debug, Serialize)]
struct InstanceView {
    instance: Uuid,
    version: u64,
}

/// Wrapper for JSON output
#[derive(Debug, Serialize)]
struct CliOutput {
    latest: VersionedRecord<AppConfig>,
    history: Vec<VersionedRecord<AppConfig>>,
    rejected: Vec<Rejection>,
    instances: Vec<InstanceView>,
}

fn init_tracing() -> FilterHandle {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    handle
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = init_tracing();
    ensure!(cli.instances > 0, "--instances must be at least 1");

    let settings = CliConfig::from_env()?;
    let data = fs::read_to_string(&cli.updates)
        .with_context(|| format!("read updates file {}", cli.updates))?;
    let commands: Vec<UpdateCommand> =
        serde_json::from_str(&data).context("parse updates file")?;

    // ----------------------------
    // Start instances
    // ----------------------------
    let store = Arc::new(InMemoryLogStore::new());
    let cancel = CancellationToken::new();
    let mut repos = Vec::with_capacity(cli.instances);
    let mut feeds = Vec::with_capacity(cli.instances);
    for index in 0..cli.instances {
        let follow = cli.follow_log_level.then(|| filter.clone());
        let repo: DemoRepo = Repository::new(Arc::clone(&store), settings.repo.clone())
            .with_on_update(move |record| on_config_update(index, record, follow.as_ref()));
        feeds.push(repo.start(cancel.clone()).await.context("start repository")?);
        repos.push(repo);
    }

    // ----------------------------
    // Apply updates
    // ----------------------------
    let mut head: u64 = 0;
    let mut rejected = Vec::new();
    for (position, command) in commands.iter().enumerate() {
        let repo = &repos[position % repos.len()];
        match apply(repo, command, cli.max_retries).await {
            Ok(record) => {
                tracing::info!(version = record.version, by = %record.updated_by, "update applied");
                head = head.max(record.version);
            }
            Err(err @ (RepoError::Validation(_) | RepoError::TypeMismatch(_))) => {
                tracing::warn!(by = %command.by, error = %err, "update rejected");
                rejected.push(Rejection {
                    by: command.by.clone(),
                    reason: err.to_string(),
                });
            }
            Err(err) => {
                return Err(err).with_context(|| format!("apply update by {}", command.by))
            }
        }
    }

    // ----------------------------
    // Converge and report
    // ----------------------------
    converge(&repos, head).await?;

    let from = cli.from.unwrap_or(1);
    let to = cli.to.unwrap_or(head + 1);
    let history = repos[0].list_by_version_range(from, to).await?;
    let instances = repos
        .iter()
        .map(|repo| -> Result<InstanceView> {
            Ok(InstanceView {
                instance: repo.instance_id(),
                version: repo.get_latest_versioned()?.version,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let output = CliOutput {
        latest: repos[0].get_latest_versioned()?,
        history,
        rejected,
        instances,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    if cli.watch {
        tracing::info!("watching for config changes, press ctrl-c to stop");
        tokio::signal::ctrl_c().await.context("wait for ctrl-c")?;
    }

    // ----------------------------
    // Shutdown
    // ----------------------------
    cancel.cancel();
    for feed in feeds {
        feed.stopped().await;
    }
    Ok(())
}

fn on_config_update(
    instance: usize,
    record: &VersionedRecord<AppConfig>,
    filter: Option<&FilterHandle>,
) {
    tracing::debug!(instance, version = record.version, cfg = ?record.value, "config updated");
    let Some(filter) = filter else {
        return;
    };
    if let Err(err) = filter.reload(EnvFilter::new(&record.value.log_level)) {
        tracing::warn!(error = %err, "could not apply configured log level");
    }
}

async fn apply(
    repo: &DemoRepo,
    command: &UpdateCommand,
    max_retries: u32,
) -> Result<VersionedRecord<AppConfig>, RepoError> {
    let mut attempt = 0;
    loop {
        match repo.update_json(&command.by, command.config.clone()).await {
            Err(err) if err.is_retryable() && attempt < max_retries => {
                attempt += 1;
                tracing::warn!(by = %command.by, attempt, error = %err, "retrying update");
            }
            outcome => return outcome,
        }
    }
}

async fn converge(repos: &[DemoRepo], version: u64) -> Result<()> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let behind = repos
            .iter()
            .filter(|repo| {
                repo.get_latest_versioned()
                    .map(|record| record.version < version)
                    .unwrap_or(true)
            })
            .count();
        if behind == 0 {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("{behind} instance(s) did not reach version {version}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_ids_serialize_as_uuid_strings() {
        let view = InstanceView {
            instance: Uuid::nil(),
            version: 3,
        };
        let doc = serde_json::to_value(&view).unwrap();
        assert_eq!(doc["instance"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(doc["version"], 3);
    }
}
