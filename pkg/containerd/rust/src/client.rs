// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hyper_util::rt::TokioIo;
use log::debug;
use tokio::net::UnixStream;
use tonic::metadata::AsciiMetadataValue;
use tonic::transport::{Endpoint, Uri};
use tower::service_fn;

use crate::errors::Error;
use crate::proto::{Container, ContainersClient, ListContainersRequest};

/// Metadata header selecting the containerd namespace of a request.
const NAMESPACE_HEADER: &str = "containerd-namespace";

/// Source of container descriptors, queried by truncated id.
pub trait ContainerLister: Send + Sync {
    /// Lists the containers whose id contains `truncated_id`.
    fn list_by_filter(
        &self,
        truncated_id: &str,
    ) -> impl Future<Output = Result<Vec<Container>, Error>> + Send;
}

/// Client for the containerd `Containers` service on a local socket.
///
/// The channel is opened once and shared by every call; calls may run
/// concurrently.
#[derive(Debug, Clone)]
pub struct RuntimeClient {
    socket_path: PathBuf,
    client: ContainersClient,
    namespace: AsciiMetadataValue,
    timeout: Duration,
}

impl RuntimeClient {
    /// Connects to the socket and checks that containerd answers an
    /// unfiltered list call within `timeout`.
    pub async fn connect(
        socket_path: &Path,
        namespace: &str,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let namespace =
            AsciiMetadataValue::try_from(namespace).map_err(|_| Error::InvalidNamespace {
                namespace: namespace.to_string(),
            })?;

        // The connector dials the unix socket directly, so the URI is only a
        // placeholder and no HTTP proxy is ever involved.
        let path = socket_path.to_path_buf();
        let channel = Endpoint::from_static("http://[::]:50051")
            .connect_timeout(timeout)
            .timeout(timeout)
            .connect_with_connector(service_fn(move |_: Uri| {
                let path = path.clone();
                async move { Ok::<_, std::io::Error>(TokioIo::new(UnixStream::connect(path).await?)) }
            }))
            .await
            .map_err(|source| Error::ConnectError {
                path: socket_path.to_path_buf(),
                source,
            })?;

        let client = Self {
            socket_path: socket_path.to_path_buf(),
            client: ContainersClient::new(channel),
            namespace,
            timeout,
        };

        let containers = client.list(Vec::new()).await?;
        debug!(
            "containerd ({}): {} container(s) visible",
            client.socket_path.display(),
            containers.len()
        );

        Ok(client)
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    async fn list(&self, filters: Vec<String>) -> Result<Vec<Container>, Error> {
        let mut request = tonic::Request::new(ListContainersRequest { filters });
        request
            .metadata_mut()
            .insert(NAMESPACE_HEADER, self.namespace.clone());
        request.set_timeout(self.timeout);

        let mut client = self.client.clone();
        let response = tokio::time::timeout(self.timeout, client.list(request))
            .await
            .map_err(|_| Error::Timeout {
                timeout: self.timeout,
            })??;

        Ok(response.into_inner().containers)
    }
}

impl ContainerLister for RuntimeClient {
    async fn list_by_filter(&self, truncated_id: &str) -> Result<Vec<Container>, Error> {
        // containerd stores full ids while cgroups only give us a prefix, so
        // this is a substring match rather than an equality filter.
        self.list(vec![id_filter(truncated_id)]).await
    }
}

fn id_filter(truncated_id: &str) -> String {
    format!("id~={truncated_id}")
}
