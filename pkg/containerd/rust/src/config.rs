// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::socket::CONTAINERD_SOCKETS;

const DEFAULT_CONFIG_PATH: &str = "/etc/datadog-agent/containerd.yaml";

/// Namespace used by containerd itself and by Bottlerocket host containers.
pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_LABEL_MAX_LENGTH: usize = 100;

const HOST_ROOT_ENV: &str = "HOST_ROOT";
const TIMEOUT_ENV: &str = "DD_CONTAINERD_TIMEOUT_MS";
const LOG_LEVEL_ENV: &str = "DD_LOG_LEVEL";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prefix prepended to every host path (sockets, procfs, cgroupfs).
    pub host_root: PathBuf,
    /// Candidate control sockets, probed in order.
    pub socket_paths: Vec<String>,
    pub namespace: String,
    pub timeout_ms: u64,
    /// Labels whose value is longer than this are dropped.
    pub label_max_length: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host_root: PathBuf::new(),
            socket_paths: CONTAINERD_SOCKETS.iter().map(|s| s.to_string()).collect(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            label_max_length: DEFAULT_LABEL_MAX_LENGTH,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn proc_root(&self) -> PathBuf {
        host_path(&self.host_root, "/proc")
    }

    pub fn cgroup_root(&self) -> PathBuf {
        host_path(&self.host_root, "/sys/fs/cgroup")
    }

    pub fn log_level(&self) -> log::Level {
        self.log_level.parse().unwrap_or_else(|_| {
            warn!("Invalid log level {:?}, using info", self.log_level);
            log::Level::Info
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host_root) = env::var(HOST_ROOT_ENV) {
            self.host_root = PathBuf::from(host_root);
        }

        if let Ok(timeout) = env::var(TIMEOUT_ENV) {
            match timeout.trim().parse() {
                Ok(ms) => self.timeout_ms = ms,
                Err(e) => warn!("Ignoring {TIMEOUT_ENV}={timeout:?}: {e}"),
            }
        }

        if let Ok(level) = env::var(LOG_LEVEL_ENV) {
            self.log_level = level;
        }
    }
}

/// Prepends `host_root` to an absolute host path.
///
/// This is plain concatenation rather than `Path::join`, which would discard
/// the root when `path` is absolute.
pub fn host_path<P: AsRef<Path>>(host_root: &Path, path: P) -> PathBuf {
    let mut prefixed = OsString::from(host_root.as_os_str());
    prefixed.push(path.as_ref().as_os_str());
    PathBuf::from(prefixed)
}

/// Loads the YAML config file if it exists, then applies environment
/// overrides.
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&contents)
                .with_context(|| format!("parsing {}", path.display()))?
        }
    } else {
        warn!(
            "Config file not found at {}. Using defaults and environment variables.",
            path.display()
        );
        Config::default()
    };

    config.apply_env_overrides();
    Ok(config)
}
