// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

/// cgroup v1 reports "no limit" as a huge page-aligned value.
const UNLIMITED_MEMORY_THRESHOLD: u64 = 1 << 62;

/// Identifies the cgroups to read limits from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CgroupLimitsKey {
    pub container_id: String,
    pub cpu_cgroup: String,
    pub mem_cgroup: String,
    pub cpuset_cgroup: String,
}

/// Resource limits of a container. Zero means unknown or unlimited, except
/// `cpu_quota` which is -1 when explicitly unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CgroupLimits {
    pub memory_limit: i64,
    pub cpu_shares: i64,
    pub cpu_quota: i64,
    pub cpu_period: i64,
    pub cpuset_cpu_count: i32,
}

pub trait LimitsResolver: Send + Sync {
    fn resolve_limits(&self, key: &CgroupLimitsKey) -> CgroupLimits;
}

/// Reads limits from the host cgroup filesystem, v1 or v2.
#[derive(Debug, Clone)]
pub struct HostCgroupLimits {
    cgroup_root: PathBuf,
}

impl HostCgroupLimits {
    pub fn new<P: Into<PathBuf>>(cgroup_root: P) -> Self {
        Self {
            cgroup_root: cgroup_root.into(),
        }
    }

    fn is_unified(&self) -> bool {
        self.cgroup_root.join("cgroup.controllers").exists()
    }

    /// Directory of `cgroup` in the `controller` hierarchy (v1) or in the
    /// unified hierarchy (v2, `controller` is `None`).
    fn cgroup_dir(&self, controller: Option<&str>, cgroup: &str) -> PathBuf {
        let base = match controller {
            Some(controller) => self.cgroup_root.join(controller),
            None => self.cgroup_root.clone(),
        };
        base.join(cgroup.trim_start_matches('/'))
    }

    fn resolve_v1(&self, key: &CgroupLimitsKey) -> CgroupLimits {
        let memory = self.cgroup_dir(Some("memory"), &key.mem_cgroup);
        let cpu = self.cgroup_dir(Some("cpu"), &key.cpu_cgroup);
        let cpuset = self.cgroup_dir(Some("cpuset"), &key.cpuset_cgroup);

        let cpus = read_trimmed(&cpuset.join("cpuset.effective_cpus"))
            .or_else(|| read_trimmed(&cpuset.join("cpuset.cpus")));

        CgroupLimits {
            memory_limit: read_trimmed(&memory.join("memory.limit_in_bytes"))
                .and_then(|v| v.parse::<u64>().ok())
                .map_or(0, memory_limit_from_bytes),
            cpu_shares: read_i64(&cpu.join("cpu.shares")).unwrap_or(0),
            cpu_quota: read_i64(&cpu.join("cpu.cfs_quota_us")).unwrap_or(0),
            cpu_period: read_i64(&cpu.join("cpu.cfs_period_us")).unwrap_or(0),
            cpuset_cpu_count: cpus.as_deref().map_or(0, count_cpus),
        }
    }

    fn resolve_v2(&self, key: &CgroupLimitsKey) -> CgroupLimits {
        let memory = self.cgroup_dir(None, &key.mem_cgroup);
        let cpu = self.cgroup_dir(None, &key.cpu_cgroup);
        let cpuset = self.cgroup_dir(None, &key.cpuset_cgroup);

        let (cpu_quota, cpu_period) = read_trimmed(&cpu.join("cpu.max"))
            .and_then(|v| parse_cpu_max(&v))
            .unwrap_or((0, 0));

        CgroupLimits {
            memory_limit: read_trimmed(&memory.join("memory.max"))
                .and_then(|v| v.parse::<u64>().ok())
                .map_or(0, memory_limit_from_bytes),
            cpu_shares: read_i64(&cpu.join("cpu.weight")).map_or(0, weight_to_shares),
            cpu_quota,
            cpu_period,
            cpuset_cpu_count: read_trimmed(&cpuset.join("cpuset.cpus.effective"))
                .as_deref()
                .map_or(0, count_cpus),
        }
    }
}

impl LimitsResolver for HostCgroupLimits {
    fn resolve_limits(&self, key: &CgroupLimitsKey) -> CgroupLimits {
        let limits = if self.is_unified() {
            self.resolve_v2(key)
        } else {
            self.resolve_v1(key)
        };
        debug!("cgroup limits for {}: {limits:?}", key.container_id);
        limits
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .map(|contents| contents.trim().to_string())
        .ok()
}

fn read_i64(path: &Path) -> Option<i64> {
    read_trimmed(path)?.parse().ok()
}

fn memory_limit_from_bytes(bytes: u64) -> i64 {
    if bytes >= UNLIMITED_MEMORY_THRESHOLD {
        return 0;
    }
    i64::try_from(bytes).unwrap_or(0)
}

/// Converts a cgroup v2 `cpu.weight` (1..=10000) to v1 `cpu.shares`
/// (2..=262144), the inverse of the conversion runc applies.
fn weight_to_shares(weight: i64) -> i64 {
    if weight <= 0 {
        return 0;
    }
    2 + ((weight - 1) * 262142) / 9999
}

/// Parses `cpu.max`: `"<quota> <period>"`, where quota may be `max`.
fn parse_cpu_max(value: &str) -> Option<(i64, i64)> {
    let mut fields = value.split_whitespace();
    let quota = match fields.next()? {
        "max" => -1,
        quota => quota.parse().ok()?,
    };
    let period = fields.next()?.parse().ok()?;
    Some((quota, period))
}

/// Counts the cpus of a cpuset list such as `0-3,8,10-11`.
fn count_cpus(list: &str) -> i32 {
    let mut count: i64 = 0;

    for range in list.split(',').map(str::trim).filter(|r| !r.is_empty()) {
        let parsed = match range.split_once('-') {
            Some((first, last)) => first
                .parse::<i64>()
                .ok()
                .zip(last.parse::<i64>().ok())
                .filter(|(first, last)| last >= first)
                .map(|(first, last)| last - first + 1),
            None => range.parse::<i64>().ok().map(|_| 1),
        };

        match parsed {
            Some(n) => count += n,
            None => {
                debug!("invalid cpuset range {range:?} in {list:?}");
                return 0;
            }
        }
    }

    i32::try_from(count).unwrap_or(0)
}
