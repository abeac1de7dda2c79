// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use log::debug;
use serde_json::Value;

use crate::container::ContainerMount;

/// Mounts and environment extracted from a runtime spec.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RuntimeSpecInfo {
    pub mounts: Vec<ContainerMount>,
    pub env: Vec<String>,
}

/// Parses the JSON runtime spec attached to a container.
///
/// Only a document that is not valid JSON yields empty mounts and env.
/// Otherwise each field is read on its own: a field with an unexpected type
/// is skipped (or left empty) without affecting the others.
pub fn parse_runtime_spec(raw: &[u8]) -> RuntimeSpecInfo {
    let spec: Value = match serde_json::from_slice(raw) {
        Ok(spec) => spec,
        Err(e) => {
            debug!("could not parse container runtime spec: {e}");
            return RuntimeSpecInfo::default();
        }
    };

    // rootfsPropagation applies to the whole container, not per mount
    let propagation = spec
        .pointer("/linux/rootfsPropagation")
        .and_then(scalar_string)
        .unwrap_or_default();

    let mounts = spec
        .get("mounts")
        .and_then(Value::as_array)
        .map(|mounts| {
            mounts
                .iter()
                .filter(|mount| mount.is_object())
                .map(|mount| parse_mount(mount, &propagation))
                .collect()
        })
        .unwrap_or_default();

    let env = spec
        .pointer("/process/env")
        .map(string_list)
        .unwrap_or_default();

    RuntimeSpecInfo { mounts, env }
}

fn parse_mount(mount: &Value, propagation: &str) -> ContainerMount {
    let field = |name: &str| mount.get(name).and_then(scalar_string).unwrap_or_default();
    let options = mount.get("options").map(string_list).unwrap_or_default();
    let (mode, writable) = parse_mount_options(&options);

    ContainerMount {
        source: field("source"),
        destination: field("destination"),
        mode,
        writable,
        propagation: propagation.to_string(),
    }
}

/// Strings of a JSON array. Numbers and booleans are converted, other items
/// are skipped. Anything but an array gives an empty list.
fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(scalar_string).collect())
        .unwrap_or_default()
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Returns the `mode=` value (empty if absent) and whether the mount is
/// writable, i.e. has no `ro` option.
fn parse_mount_options(options: &[String]) -> (String, bool) {
    let mut mode = String::new();
    let mut writable = true;

    for option in options {
        if option == "ro" {
            writable = false;
        } else if let Some(value) = option.strip_prefix("mode=") {
            mode = value.to_string();
        }
    }

    (mode, writable)
}
