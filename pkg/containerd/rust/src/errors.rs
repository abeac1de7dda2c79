// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("could not connect to {}: {source}", path.display())]
    ConnectError {
        path: PathBuf,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("containerd returned {}: {}", status.code(), status.message())]
    StatusError { status: Box<tonic::Status> },

    #[error("request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("invalid containerd namespace: {namespace:?}")]
    InvalidNamespace { namespace: String },
}

impl From<tonic::Status> for Error {
    fn from(status: tonic::Status) -> Self {
        Error::StatusError {
            status: Box::new(status),
        }
    }
}
