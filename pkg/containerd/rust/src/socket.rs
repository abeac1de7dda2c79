// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fs;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use log::debug;

use crate::config::host_path;

/// Candidate containerd sockets, in priority order.
pub const CONTAINERD_SOCKETS: &[&str] = &[
    // Bottlerocket host containers
    "/run/host-containerd/containerd.sock",
    "/run/containerd/runtime2/containerd.sock",
];

fn as_str<S: AsRef<str>>(s: &S) -> &str {
    s.as_ref()
}

fn is_socket(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| m.file_type().is_socket())
}

/// Returns every candidate, prefixed with `host_root`, that currently exists
/// as a unix socket. Empty candidates are skipped.
pub fn live_sockets<'a, S: AsRef<str>>(
    host_root: &'a Path,
    candidates: &'a [S],
) -> impl Iterator<Item = PathBuf> + 'a {
    candidates
        .iter()
        .map(as_str)
        .filter(|candidate| !candidate.is_empty())
        .map(move |candidate| host_path(host_root, candidate))
        .filter(|path| {
            let live = is_socket(path);
            if !live {
                debug!("containerd socket not found at {}", path.display());
            }
            live
        })
}

/// Returns the first live socket among `candidates`.
pub fn find_socket<S: AsRef<str>>(host_root: &Path, candidates: &[S]) -> Option<PathBuf> {
    live_sockets(host_root, candidates).next()
}
