use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use renamer_engine::{AtomicFileWriter, NamerSettings, OrchestratorSettings, RetryPolicy};
use renamer_logging::{renamer_info, renamer_warn};
use serde::{Deserialize, Serialize};

/// Tunables read from the RON config file. Missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PersistedConfig {
    pub(crate) namer: PersistedNamer,
    pub(crate) retry: PersistedRetry,
    pub(crate) stop: PersistedStop,
    /// How often `watch` refreshes the progress line.
    pub(crate) watch_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PersistedNamer {
    pub(crate) base_url: String,
    pub(crate) text_model: String,
    pub(crate) image_model: String,
    pub(crate) connect_timeout_secs: u64,
    pub(crate) request_timeout_secs: u64,
    pub(crate) max_reply_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PersistedRetry {
    pub(crate) max_attempts: u32,
    pub(crate) backoff_step_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PersistedStop {
    pub(crate) poll_interval_ms: u64,
    pub(crate) timeout_ms: u64,
}

impl Default for PersistedConfig {
    fn default() -> Self {
        Self {
            namer: PersistedNamer::default(),
            retry: PersistedRetry::default(),
            stop: PersistedStop::default(),
            watch_interval_ms: 500,
        }
    }
}

impl Default for PersistedNamer {
    fn default() -> Self {
        let settings = NamerSettings::default();
        Self {
            base_url: settings.base_url,
            text_model: settings.text_model,
            image_model: settings.image_model,
            connect_timeout_secs: settings.connect_timeout.as_secs(),
            request_timeout_secs: settings.request_timeout.as_secs(),
            max_reply_tokens: settings.max_reply_tokens,
        }
    }
}

impl Default for PersistedRetry {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            backoff_step_ms: policy.backoff_step.as_millis() as u64,
        }
    }
}

impl Default for PersistedStop {
    fn default() -> Self {
        let settings = OrchestratorSettings::default();
        Self {
            poll_interval_ms: settings.stop_poll_interval.as_millis() as u64,
            timeout_ms: settings.stop_timeout.as_millis() as u64,
        }
    }
}

impl PersistedConfig {
    pub(crate) fn namer_settings(&self) -> NamerSettings {
        NamerSettings {
            base_url: self.namer.base_url.clone(),
            text_model: self.namer.text_model.clone(),
            image_model: self.namer.image_model.clone(),
            connect_timeout: Duration::from_secs(self.namer.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.namer.request_timeout_secs),
            max_reply_tokens: self.namer.max_reply_tokens,
        }
    }

    pub(crate) fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            retry: RetryPolicy {
                // Zero attempts would never ask the namer at all.
                max_attempts: self.retry.max_attempts.max(1),
                backoff_step: Duration::from_millis(self.retry.backoff_step_ms),
            },
            stop_poll_interval: Duration::from_millis(self.stop.poll_interval_ms.max(1)),
            stop_timeout: Duration::from_millis(self.stop.timeout_ms),
        }
    }

    pub(crate) fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms.max(1))
    }
}

/// Read the config at `path`. A missing file yields defaults; an unreadable
/// or malformed one is logged and also yields defaults.
pub(crate) fn load_config(path: &Path) -> PersistedConfig {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return PersistedConfig::default();
        }
        Err(err) => {
            renamer_warn!("Failed to read config from {:?}: {}", path, err);
            return PersistedConfig::default();
        }
    };

    match ron::from_str(&content) {
        Ok(config) => {
            renamer_info!("Loaded config from {:?}", path);
            config
        }
        Err(err) => {
            renamer_warn!("Failed to parse config from {:?}: {}", path, err);
            PersistedConfig::default()
        }
    }
}

/// Write `config` to `path` as pretty RON, replacing any existing file.
pub(crate) fn save_config(path: &Path, config: &PersistedConfig) -> anyhow::Result<PathBuf> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("config path {:?} has no file name", path))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let content = ron::ser::to_string_pretty(config, ron::ser::PrettyConfig::new())
        .context("Failed to serialize config")?;
    let written = AtomicFileWriter::new(dir)
        .write(filename, content.as_bytes())
        .with_context(|| format!("Failed to write config to {:?}", path))?;
    renamer_info!("Wrote config to {:?}", written);
    Ok(written)
}
