use anyhow::{Context, Result};
use confstream_kernel::RepoConfig;

// Repository settings for the demo, sourced from environment variables.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub repo: RepoConfig,
}

impl CliConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut repo = RepoConfig::default();
        if let Some(stream) = lookup("CONFSTREAM_STREAM").filter(|value| !value.is_empty()) {
            repo.stream = stream;
        }
        if let Some(value) = lookup("CONFSTREAM_OPERATION_TIMEOUT_MS") {
            repo.operation_timeout_ms = value
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .with_context(|| format!("parse CONFSTREAM_OPERATION_TIMEOUT_MS={value}"))?;
        }
        repo.skip_index_operations = lookup("CONFSTREAM_SKIP_INDEX")
            .map(|value| matches!(value.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Ok(Self { repo })
    }
}
