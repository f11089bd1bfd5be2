//! Layered configuration: built-in defaults, an optional `scanforge.toml`,
//! environment variables, then CLI flags — each layer overriding the last.
//! Every effective value remembers which layer set it, following the
//! teacher's `ConfigSource`/`effective_config` discovery pattern scaled down
//! to the settings this system actually has.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use sf_schema::severity::SeverityLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Env,
    Cli,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub max_parallel: usize,
    pub per_task_timeout_secs: u64,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub backoff_factor: u32,
    pub max_backoff_ms: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            per_task_timeout_secs: 300,
            max_retries: 2,
            base_backoff_ms: 500,
            backoff_factor: 2,
            max_backoff_ms: 30_000,
        }
    }
}

impl From<&SchedulerSettings> for sf_scheduler::SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        sf_scheduler::SchedulerConfig {
            max_parallel: settings.max_parallel,
            per_task_timeout: std::time::Duration::from_secs(settings.per_task_timeout_secs),
            retry: sf_scheduler::RetryPolicy {
                max_retries: settings.max_retries,
                base_backoff: std::time::Duration::from_millis(settings.base_backoff_ms),
                backoff_factor: settings.backoff_factor,
                max_backoff: std::time::Duration::from_millis(settings.max_backoff_ms),
                retryable_exit_codes: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
struct TomlConfig {
    scheduler: Option<SchedulerSettings>,
    default_scenario: Option<String>,
    severity_floor: Option<String>,
    checkpoint_dir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub scheduler: SchedulerSettings,
    pub default_scenario: String,
    pub severity_floor: Option<SeverityLevel>,
    pub checkpoint_dir: Utf8PathBuf,
    pub source_attribution: BTreeMap<String, ConfigSource>,
}

impl Default for Config {
    fn default() -> Self {
        let mut source_attribution = BTreeMap::new();
        for key in ["scheduler", "default_scenario", "severity_floor", "checkpoint_dir"] {
            source_attribution.insert(key.to_string(), ConfigSource::Default);
        }
        Self {
            scheduler: SchedulerSettings::default(),
            default_scenario: "code_commit".to_string(),
            severity_floor: None,
            checkpoint_dir: Utf8PathBuf::from(".scanforge/checkpoints"),
            source_attribution,
        }
    }
}

/// CLI flags that can override configuration; `None` means "not passed",
/// leaving the file/env/default layers in effect.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<Utf8PathBuf>,
    pub max_parallel: Option<usize>,
    pub checkpoint_dir: Option<Utf8PathBuf>,
    pub severity_floor: Option<String>,
}

impl Config {
    /// Discover configuration starting from the current working directory.
    pub fn discover(overrides: &CliOverrides) -> Result<Self> {
        let start_dir = std::env::current_dir().context("reading current directory")?;
        Self::discover_from(&start_dir, overrides)
    }

    /// Path-driven variant so tests avoid touching the real working directory.
    pub fn discover_from(start_dir: &Path, overrides: &CliOverrides) -> Result<Self> {
        let mut config = Self::default();

        let config_path = overrides
            .config_path
            .clone()
            .or_else(|| Self::discover_config_file(start_dir));

        if let Some(path) = config_path {
            let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            let file: TomlConfig = toml::from_str(&raw).with_context(|| format!("parsing {path}"))?;
            if let Some(scheduler) = file.scheduler {
                config.scheduler = scheduler;
                config.source_attribution.insert("scheduler".to_string(), ConfigSource::File);
            }
            if let Some(scenario) = file.default_scenario {
                config.default_scenario = scenario;
                config.source_attribution.insert("default_scenario".to_string(), ConfigSource::File);
            }
            if let Some(floor) = file.severity_floor {
                config.severity_floor = Some(
                    floor
                        .parse()
                        .map_err(|_| anyhow::anyhow!("invalid severity_floor {floor} in {path}"))?,
                );
                config.source_attribution.insert("severity_floor".to_string(), ConfigSource::File);
            }
            if let Some(dir) = file.checkpoint_dir {
                config.checkpoint_dir = Utf8PathBuf::from(dir);
                config.source_attribution.insert("checkpoint_dir".to_string(), ConfigSource::File);
            }
        }

        if let Ok(value) = std::env::var("SCANFORGE_MAX_PARALLEL") {
            config.scheduler.max_parallel = value.parse().context("SCANFORGE_MAX_PARALLEL must be an integer")?;
            config.source_attribution.insert("scheduler".to_string(), ConfigSource::Env);
        }
        if let Ok(value) = std::env::var("SCANFORGE_CHECKPOINT_DIR") {
            config.checkpoint_dir = Utf8PathBuf::from(value);
            config.source_attribution.insert("checkpoint_dir".to_string(), ConfigSource::Env);
        }
        if let Ok(value) = std::env::var("SCANFORGE_SEVERITY_FLOOR") {
            config.severity_floor = Some(
                value
                    .parse()
                    .map_err(|_| anyhow::anyhow!("invalid SCANFORGE_SEVERITY_FLOOR value {value}"))?,
            );
            config.source_attribution.insert("severity_floor".to_string(), ConfigSource::Env);
        }

        if let Some(max_parallel) = overrides.max_parallel {
            config.scheduler.max_parallel = max_parallel;
            config.source_attribution.insert("scheduler".to_string(), ConfigSource::Cli);
        }
        if let Some(dir) = &overrides.checkpoint_dir {
            config.checkpoint_dir = dir.clone();
            config.source_attribution.insert("checkpoint_dir".to_string(), ConfigSource::Cli);
        }
        if let Some(floor) = &overrides.severity_floor {
            config.severity_floor = Some(
                floor
                    .parse()
                    .map_err(|_| anyhow::anyhow!("invalid --severity-floor value {floor}"))?,
            );
            config.source_attribution.insert("severity_floor".to_string(), ConfigSource::Cli);
        }

        Ok(config)
    }

    fn discover_config_file(start_dir: &Path) -> Option<Utf8PathBuf> {
        let candidate = start_dir.join("scanforge.toml");
        candidate
            .exists()
            .then(|| Utf8PathBuf::from_path_buf(candidate).expect("path built from a UTF-8 start_dir"))
    }

    /// Effective values with their source, for the `status --config` surface.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, ConfigSource)> {
        let mut out = BTreeMap::new();
        let source = |key: &str| self.source_attribution.get(key).copied().unwrap_or(ConfigSource::Default);
        out.insert(
            "scheduler.max_parallel".to_string(),
            (self.scheduler.max_parallel.to_string(), source("scheduler")),
        );
        out.insert("default_scenario".to_string(), (self.default_scenario.clone(), source("default_scenario")));
        out.insert(
            "severity_floor".to_string(),
            (
                self.severity_floor.map(|s| s.to_string()).unwrap_or_else(|| "none".to_string()),
                source("severity_floor"),
            ),
        );
        out.insert("checkpoint_dir".to_string(), (self.checkpoint_dir.to_string(), source("checkpoint_dir")));
        out
    }
}
