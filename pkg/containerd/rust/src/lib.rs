// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

// Correctness
#![deny(clippy::indexing_slicing)]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

pub mod cache;
mod client;
pub mod config;
mod container;
mod errors;
mod image;
pub mod limits;
pub mod matcher;
mod oci;
pub mod process;
pub mod proto;
mod resolver;
pub mod socket;

// Re-export the public API
pub use cache::{ContainerCache, InMemoryContainerCache};
pub use client::{ContainerLister, RuntimeClient};
pub use config::Config;
pub use container::{ContainerInfo, ContainerMount, ContainerType, LookupState};
pub use errors::Error;
pub use image::ImageRef;
pub use limits::{CgroupLimits, CgroupLimitsKey, HostCgroupLimits, LimitsResolver};
pub use matcher::{CgroupLayout, CgroupMatch, CgroupMatcher, RuncCgroupMatcher};
pub use oci::{RuntimeSpecInfo, parse_runtime_spec};
pub use process::ProcessInfo;
pub use resolver::ContainerdEngine;
