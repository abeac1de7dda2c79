// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerType {
    Containerd,
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerType::Containerd => write!(f, "containerd"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupState {
    #[default]
    Pending,
    Successful,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContainerMount {
    pub source: String,
    pub destination: String,
    pub mode: String,
    pub writable: bool,
    pub propagation: String,
}

/// A container resolved from a process cgroup.
///
/// Built fresh for every resolution and handed to the cache once complete;
/// it is never modified after that.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerInfo {
    /// Truncated id as found in the cgroup path.
    pub id: String,
    /// Full id reported by containerd, which contains `id`.
    pub full_id: String,
    #[serde(rename = "type")]
    pub container_type: ContainerType,
    pub name: String,
    pub image: String,
    pub image_repo: String,
    pub image_tag: String,
    pub image_digest: String,
    pub labels: HashMap<String, String>,
    pub mounts: Vec<ContainerMount>,
    pub env: Vec<String>,
    pub memory_limit: i64,
    pub cpu_shares: i64,
    pub cpu_quota: i64,
    pub cpu_period: i64,
    pub cpuset_cpu_count: i32,
    pub lookup_state: LookupState,
}

impl ContainerInfo {
    pub fn new(id: String, container_type: ContainerType) -> Self {
        Self {
            id,
            full_id: String::new(),
            container_type,
            name: String::new(),
            image: String::new(),
            image_repo: String::new(),
            image_tag: String::new(),
            image_digest: String::new(),
            labels: HashMap::new(),
            mounts: Vec::new(),
            env: Vec::new(),
            memory_limit: 0,
            cpu_shares: 0,
            cpu_quota: 0,
            cpu_period: 0,
            cpuset_cpu_count: 0,
            lookup_state: LookupState::Pending,
        }
    }
}

/// Keeps only the labels whose value fits in `max_length` bytes.
pub fn filter_labels<'a, I>(labels: I, max_length: usize) -> HashMap<String, String>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    labels
        .into_iter()
        .filter(|(_, value)| value.len() <= max_length)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_labels_drops_long_values() {
        let labels: HashMap<String, String> = [
            ("short".to_string(), "ok".to_string()),
            ("long".to_string(), "x".repeat(101)),
            ("exact".to_string(), "y".repeat(100)),
        ]
        .into_iter()
        .collect();

        let filtered = filter_labels(&labels, 100);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.get("short").unwrap(), "ok");
        assert!(filtered.contains_key("exact"));
        assert!(!filtered.contains_key("long"));
    }

    #[test]
    fn test_new_record_is_pending() {
        let info = ContainerInfo::new("3ad7b26ded6d".to_string(), ContainerType::Containerd);
        assert_eq!(info.lookup_state, LookupState::Pending);
        assert!(info.full_id.is_empty());
        assert_eq!(info.container_type.to_string(), "containerd");
    }

    #[test]
    fn test_serializes_type_and_state() {
        let mut info = ContainerInfo::new("3ad7b26ded6d".to_string(), ContainerType::Containerd);
        info.lookup_state = LookupState::Successful;
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["type"], "containerd");
        assert_eq!(json["lookup_state"], "successful");
    }
}
