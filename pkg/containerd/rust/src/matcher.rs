// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::process::ProcessInfo;

/// Length of a full runc container id.
const CONTAINER_ID_LENGTH: usize = 64;
/// Length of the id reported for a matched container.
const REPORTED_CONTAINER_ID_LENGTH: usize = 12;

/// Where a container id sits in a cgroup path: right after `prefix` and
/// right before `suffix`. An empty suffix means the id ends the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CgroupLayout {
    pub prefix: &'static str,
    pub suffix: &'static str,
}

/// containerd puts containers of the `default` namespace under `/default/<id>`.
pub const CONTAINERD_CGROUP_LAYOUT: &[CgroupLayout] = &[CgroupLayout {
    prefix: "/default/",
    suffix: "",
}];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgroupMatch {
    /// Truncated container id.
    pub container_id: String,
    /// The cgroup path the id was found in.
    pub cgroup: String,
}

pub trait CgroupMatcher: Send + Sync {
    /// Looks for a container id in the cgroups of `process`, trying each
    /// layout in order. Returns `None` when no cgroup matches.
    fn match_cgroups(&self, process: &ProcessInfo, layout: &[CgroupLayout])
    -> Option<CgroupMatch>;
}

/// Matches the cgroup naming used by runc-based runtimes.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuncCgroupMatcher;

impl CgroupMatcher for RuncCgroupMatcher {
    fn match_cgroups(
        &self,
        process: &ProcessInfo,
        layout: &[CgroupLayout],
    ) -> Option<CgroupMatch> {
        process.cgroups.iter().find_map(|(_, cgroup)| {
            layout.iter().find_map(|entry| {
                match_container_id(cgroup, entry).map(|container_id| CgroupMatch {
                    container_id,
                    cgroup: cgroup.clone(),
                })
            })
        })
    }
}

fn match_container_id(cgroup: &str, layout: &CgroupLayout) -> Option<String> {
    let start = cgroup.rfind(layout.prefix)? + layout.prefix.len();
    let end = if layout.suffix.is_empty() {
        cgroup.len()
    } else {
        cgroup.rfind(layout.suffix)?
    };

    let id = cgroup.get(start..end)?;
    if id.len() != CONTAINER_ID_LENGTH || !id.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    id.get(..REPORTED_CONTAINER_ID_LENGTH).map(str::to_string)
}
