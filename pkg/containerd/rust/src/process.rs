// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fs;
use std::path::Path;

/// Controller name used for the cgroup v2 unified hierarchy (`0::/path`).
const UNIFIED: &str = "";

/// The parts of a process that container resolution looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: i32,
    /// (controller, cgroup path) pairs in `/proc/<pid>/cgroup` order.
    pub cgroups: Vec<(String, String)>,
    /// Set once the process has been associated with a container.
    pub container_id: Option<String>,
}

impl ProcessInfo {
    pub fn new(pid: i32, cgroups: Vec<(String, String)>) -> Self {
        Self {
            pid,
            cgroups,
            container_id: None,
        }
    }

    /// Reads `<proc_root>/<pid>/cgroup`.
    pub fn from_procfs(proc_root: &Path, pid: i32) -> Result<Self, std::io::Error> {
        let path = proc_root.join(pid.to_string()).join("cgroup");
        let contents = fs::read_to_string(path)?;
        Ok(Self::new(pid, parse_cgroup_file(&contents)))
    }

    /// Returns the cgroup path for `controller`, falling back to the unified
    /// hierarchy on cgroup v2 hosts.
    pub fn get_cgroup(&self, controller: &str) -> Option<&str> {
        let lookup = |name: &str| {
            self.cgroups
                .iter()
                .find(|(c, _)| c == name)
                .map(|(_, path)| path.as_str())
        };
        lookup(controller).or_else(|| lookup(UNIFIED))
    }
}

/// Parses the `hierarchy-ID:controller-list:cgroup-path` lines of
/// `/proc/<pid>/cgroup`. A v1 line listing several controllers yields one
/// entry per controller. Named hierarchies (`name=systemd`) are kept as is.
fn parse_cgroup_file(contents: &str) -> Vec<(String, String)> {
    let mut cgroups = Vec::new();

    for line in contents.lines() {
        let mut fields = line.splitn(3, ':');
        let (Some(_hierarchy), Some(controllers), Some(path)) =
            (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };

        if controllers.is_empty() {
            cgroups.push((UNIFIED.to_string(), path.to_string()));
            continue;
        }

        for controller in controllers.split(',') {
            cgroups.push((controller.to_string(), path.to_string()));
        }
    }

    cgroups
}
