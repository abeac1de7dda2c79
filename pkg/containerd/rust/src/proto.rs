// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Subset of `containerd.services.containers.v1` used to look up containers.
//!
//! Tracks `api/services/containers/v1/containers.proto` as of containerd
//! v1.7.0 (the first release with `Container.sandbox`); the field numbers
//! used here are unchanged in containerd 2.x.
//!
//! Fields we never read (e.g. `extensions`) are left out; prost skips unknown
//! fields when decoding.

use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Container {
    /// id is the unique identifier for the container within the namespace.
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    /// labels provides an area to include arbitrary data on containers.
    #[prost(map = "string, string", tag = "2")]
    pub labels: ::std::collections::HashMap<::prost::alloc::string::String, ::prost::alloc::string::String>,
    /// image contains the reference of the image used to build the container's snapshots.
    #[prost(string, tag = "3")]
    pub image: ::prost::alloc::string::String,
    /// runtime specifies which runtime to use for executing this container.
    #[prost(message, optional, tag = "4")]
    pub runtime: ::core::option::Option<container::Runtime>,
    /// spec is the OCI runtime specification, stored as JSON in `value`.
    #[prost(message, optional, tag = "5")]
    pub spec: ::core::option::Option<::prost_types::Any>,
    /// snapshotter specifies the snapshotter name used for rootfs.
    #[prost(string, tag = "6")]
    pub snapshotter: ::prost::alloc::string::String,
    /// snapshot_key specifies the snapshot key to use for the container's root filesystem.
    #[prost(string, tag = "7")]
    pub snapshot_key: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "8")]
    pub created_at: ::core::option::Option<::prost_types::Timestamp>,
    #[prost(message, optional, tag = "9")]
    pub updated_at: ::core::option::Option<::prost_types::Timestamp>,
    /// sandbox is the ID of the sandbox the container belongs to, if any.
    #[prost(string, tag = "11")]
    pub sandbox: ::prost::alloc::string::String,
}
/// Nested message and enum types in `Container`.
pub mod container {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Runtime {
        /// name is the name of the runtime.
        #[prost(string, tag = "1")]
        pub name: ::prost::alloc::string::String,
        /// options specify additional runtime initialization options.
        #[prost(message, optional, tag = "2")]
        pub options: ::core::option::Option<::prost_types::Any>,
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListContainersRequest {
    /// filters contains one or more filters using the syntax defined in the
    /// containerd filter package. Filters are OR'd together.
    #[prost(string, repeated, tag = "1")]
    pub filters: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListContainersResponse {
    #[prost(message, repeated, tag = "1")]
    pub containers: ::prost::alloc::vec::Vec<Container>,
}

const SERVICE_NAME: &str = "containerd.services.containers.v1.Containers";
const LIST_PATH: &str = "/containerd.services.containers.v1.Containers/List";

/// Unary client for the `Containers` service.
///
/// Cloning is cheap and clones share the underlying HTTP/2 connection, so
/// concurrent calls each work on their own clone.
#[derive(Debug, Clone)]
pub struct ContainersClient {
    inner: tonic::client::Grpc<Channel>,
}

impl ContainersClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    pub async fn list(
        &mut self,
        request: tonic::Request<ListContainersRequest>,
    ) -> Result<tonic::Response<ListContainersResponse>, tonic::Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| tonic::Status::unknown(format!("Service was not ready: {e}")))?;
        let codec = tonic_prost::ProstCodec::default();
        let path = PathAndQuery::from_static(LIST_PATH);
        let mut req = request;
        req.extensions_mut()
            .insert(tonic::GrpcMethod::new(SERVICE_NAME, "List"));
        self.inner.unary(req, path, codec).await
    }
}
