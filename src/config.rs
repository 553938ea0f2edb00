use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_duration_millis(key: &str, default_millis: u64) -> Duration {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|millis| *millis > 0)
        .map(Duration::from_millis)
        .unwrap_or_else(|| Duration::from_millis(default_millis))
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}

/// When a processed message is removed from the mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchivePolicy {
    /// Trash as soon as the message is queued. A crash before parsing loses
    /// the export.
    OnDiscovery,
    /// Trash only after the export was parsed and persisted. A crash causes
    /// re-delivery, which the location dedup makes harmless.
    #[default]
    OnCompletion,
}

impl FromStr for ArchivePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "on_discovery" | "discovery" => Ok(ArchivePolicy::OnDiscovery),
            "on_completion" | "completion" => Ok(ArchivePolicy::OnCompletion),
            other => Err(format!(
                "unsupported archive policy '{other}', use 'on_discovery' or 'on_completion'"
            )),
        }
    }
}

impl fmt::Display for ArchivePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchivePolicy::OnDiscovery => write!(f, "on_discovery"),
            ArchivePolicy::OnCompletion => write!(f, "on_completion"),
        }
    }
}

/// Runtime configuration for the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub label: String,
    pub discovery_interval: Duration,
    pub parse_interval: Duration,
    pub catalog_path: PathBuf,
    pub archive_policy: ArchivePolicy,
    /// Where exports that fail to parse are copied for inspection.
    pub quarantine_dir: Option<PathBuf>,
}

impl IngestConfig {
    pub fn from_env() -> Self {
        let archive_policy = env::var("KINDLE_ARCHIVE_POLICY")
            .ok()
            .and_then(|value| match ArchivePolicy::from_str(&value) {
                Ok(policy) => Some(policy),
                Err(err) => {
                    log::warn!("{}, falling back to default", err);
                    None
                }
            })
            .unwrap_or_default();

        Self {
            label: env_string("KINDLE_LABEL", "Kindle"),
            discovery_interval: env_duration_millis("KINDLE_DISCOVERY_INTERVAL_MS", 1_000),
            parse_interval: env_duration_millis("KINDLE_PARSE_INTERVAL_MS", 1_000),
            catalog_path: PathBuf::from(env_string("KINDLE_CATALOG_PATH", "./books.json")),
            archive_policy,
            quarantine_dir: env_path("KINDLE_QUARANTINE_DIR"),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
