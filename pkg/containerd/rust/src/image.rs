// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

/// An image reference split into its parts, e.g.
/// `docker.io/library/ubuntu:22.04` gives repo `docker.io/library`, image
/// `ubuntu` and tag `22.04`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub repo: String,
    pub image: String,
    pub tag: String,
}

impl ImageRef {
    /// Splits an image reference.
    ///
    /// The tag separator is the last `:` after the last `/`, so a registry
    /// port (`localhost:5000/app`) is never taken for a tag. A trailing
    /// `@<digest>` is dropped. Missing parts are left empty.
    pub fn parse(reference: &str) -> Self {
        let name = reference
            .split_once('@')
            .map_or(reference, |(name, _digest)| name);

        let (repo, last) = name.rsplit_once('/').unwrap_or(("", name));
        let (image, tag) = last.rsplit_once(':').unwrap_or((last, ""));

        ImageRef {
            repo: repo.to_string(),
            image: image.to_string(),
            tag: tag.to_string(),
        }
    }
}
