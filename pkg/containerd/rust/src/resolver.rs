// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::sync::Arc;

use log::{debug, info};

use crate::cache::ContainerCache;
use crate::client::{ContainerLister, RuntimeClient};
use crate::config::Config;
use crate::container::{ContainerInfo, ContainerType, LookupState, filter_labels};
use crate::image::ImageRef;
use crate::limits::{CgroupLimitsKey, HostCgroupLimits, LimitsResolver};
use crate::matcher::{CONTAINERD_CGROUP_LAYOUT, CgroupMatch, CgroupMatcher, RuncCgroupMatcher};
use crate::oci::parse_runtime_spec;
use crate::process::ProcessInfo;
use crate::proto::Container;
use crate::socket;

/// The containerd container backend.
///
/// Built once at startup. Without a usable containerd connection the backend
/// is inactive and every resolution returns `false`.
pub struct ContainerdEngine<L = RuntimeClient> {
    client: Option<L>,
    matcher: Box<dyn CgroupMatcher>,
    limits: Box<dyn LimitsResolver>,
    cache: Arc<dyn ContainerCache>,
    label_max_length: usize,
}

impl ContainerdEngine<RuntimeClient> {
    /// Connects to the first answering containerd socket and wires the host
    /// cgroup matcher and limits reader.
    pub async fn connect(config: &Config, cache: Arc<dyn ContainerCache>) -> Self {
        let client = connect_runtime(config).await;
        Self::new(
            client,
            Box::new(RuncCgroupMatcher),
            Box::new(HostCgroupLimits::new(config.cgroup_root())),
            cache,
            config.label_max_length,
        )
    }
}

async fn connect_runtime(config: &Config) -> Option<RuntimeClient> {
    for path in socket::live_sockets(&config.host_root, &config.socket_paths) {
        match RuntimeClient::connect(&path, &config.namespace, config.timeout()).await {
            Ok(client) => {
                info!("containerd ({}): connected", client.socket_path().display());
                return Some(client);
            }
            Err(e) => info!(
                "containerd ({}): containerd runtime returned an error after trying to list containers: {e}",
                path.display()
            ),
        }
    }

    debug!("containerd: no usable socket, backend disabled");
    None
}

impl<L: ContainerLister> ContainerdEngine<L> {
    pub fn new(
        client: Option<L>,
        matcher: Box<dyn CgroupMatcher>,
        limits: Box<dyn LimitsResolver>,
        cache: Arc<dyn ContainerCache>,
        label_max_length: usize,
    ) -> Self {
        Self {
            client,
            matcher,
            limits,
            cache,
            label_max_length,
        }
    }

    pub fn is_active(&self) -> bool {
        self.client.is_some()
    }

    /// Resolves the containerd container owning `process`.
    ///
    /// Returns `true` and sets `process.container_id` when the process runs in
    /// a containerd container. The record is published to the cache the
    /// first time its id is seen. Every failure returns `false` and leaves
    /// the process untouched.
    ///
    /// Everything needed comes from containerd and the host cgroup tree, so
    /// `_query_os_for_missing_info` has no effect on this backend.
    pub async fn resolve(&self, process: &mut ProcessInfo, _query_os_for_missing_info: bool) -> bool {
        let Some(client) = &self.client else {
            return false;
        };

        let Some(CgroupMatch {
            container_id,
            cgroup,
        }) = self.matcher.match_cgroups(process, CONTAINERD_CGROUP_LAYOUT)
        else {
            return false;
        };
        debug!("containerd ({container_id}): pid {} in cgroup {cgroup}", process.pid);

        let Some(descriptor) = lookup(client, &container_id).await else {
            return false;
        };

        let mut container = self.build_record(container_id, descriptor);

        let key = CgroupLimitsKey {
            container_id: container.id.clone(),
            cpu_cgroup: process.get_cgroup("cpu").unwrap_or_default().to_string(),
            mem_cgroup: process.get_cgroup("memory").unwrap_or_default().to_string(),
            cpuset_cgroup: process.get_cgroup("cpuset").unwrap_or_default().to_string(),
        };
        let limits = self.limits.resolve_limits(&key);
        container.memory_limit = limits.memory_limit;
        container.cpu_shares = limits.cpu_shares;
        container.cpu_quota = limits.cpu_quota;
        container.cpu_period = limits.cpu_period;
        container.cpuset_cpu_count = limits.cpuset_cpu_count;

        process.container_id = Some(container.id.clone());

        // Another resolution may publish between this check and our publish;
        // the cache keeps the first record either way.
        if self
            .cache
            .should_lookup(&container.id, ContainerType::Containerd)
        {
            container.name = container.id.clone();
            container.lookup_state = LookupState::Successful;

            let container = Arc::new(container);
            self.cache.add_container(Arc::clone(&container), process);
            self.cache.notify_new_container(&container, process);
        }

        true
    }

    fn build_record(&self, container_id: String, descriptor: Container) -> ContainerInfo {
        let image = ImageRef::parse(&descriptor.image);

        let mut container = ContainerInfo::new(container_id, ContainerType::Containerd);
        container.full_id = descriptor.id;
        container.image = image.image;
        container.image_repo = image.repo;
        container.image_tag = image.tag;
        container.labels = filter_labels(&descriptor.labels, self.label_max_length);

        if let Some(spec) = descriptor.spec {
            let runtime_spec = parse_runtime_spec(&spec.value);
            container.mounts = runtime_spec.mounts;
            container.env = runtime_spec.env;
        }

        container
    }
}

/// Fetches the single descriptor matching `container_id`.
async fn lookup<L: ContainerLister>(client: &L, container_id: &str) -> Option<Container> {
    let containers = match client.list_by_filter(container_id).await {
        Ok(containers) => containers,
        Err(e) => {
            debug!("containerd ({container_id}): ListContainers failed: {e}");
            return None;
        }
    };

    match <[Container; 1]>::try_from(containers) {
        Ok([container]) => Some(container),
        Err(containers) if containers.is_empty() => {
            debug!("containerd ({container_id}): container id has no match");
            None
        }
        Err(containers) => {
            debug!(
                "containerd ({container_id}): container id has {} matches",
                containers.len()
            );
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::cache::InMemoryContainerCache;
    use crate::errors::Error;
    use crate::limits::CgroupLimits;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const FULL_ID: &str = "3ad7b26ded6d8e7b23da7d48fe889434573036c27ae5a74837233de441c3601e";
    const SHORT_ID: &str = "3ad7b26ded6d";

    /// Answers every list call with the same containers, or with an error
    /// when `containers` is `None`.
    struct FakeLister {
        containers: Option<Vec<Container>>,
        calls: AtomicUsize,
        filters: Mutex<Vec<String>>,
    }

    impl FakeLister {
        fn new(containers: Option<Vec<Container>>) -> Self {
            Self {
                containers,
                calls: AtomicUsize::new(0),
                filters: Mutex::new(Vec::new()),
            }
        }
    }

    impl ContainerLister for FakeLister {
        async fn list_by_filter(&self, truncated_id: &str) -> Result<Vec<Container>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.filters.lock().unwrap().push(truncated_id.to_string());
            // Let concurrent resolutions interleave around the daemon call
            tokio::task::yield_now().await;
            self.containers.clone().ok_or(Error::Timeout {
                timeout: Duration::from_millis(1),
            })
        }
    }

    struct FakeLimits {
        keys: Arc<Mutex<Vec<CgroupLimitsKey>>>,
    }

    impl LimitsResolver for FakeLimits {
        fn resolve_limits(&self, key: &CgroupLimitsKey) -> CgroupLimits {
            self.keys.lock().unwrap().push(key.clone());
            CgroupLimits {
                memory_limit: 536870912,
                cpu_shares: 1024,
                cpu_quota: 50000,
                cpu_period: 100000,
                cpuset_cpu_count: 2,
            }
        }
    }

    struct Fixture {
        engine: ContainerdEngine<FakeLister>,
        cache: Arc<InMemoryContainerCache>,
        notifications: Arc<AtomicUsize>,
        limit_keys: Arc<Mutex<Vec<CgroupLimitsKey>>>,
    }

    fn fixture(client: Option<FakeLister>) -> Fixture {
        let notifications = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&notifications);
        let cache = Arc::new(InMemoryContainerCache::new().with_observer(Box::new(
            move |_: &ContainerInfo, _: &ProcessInfo| {
                seen.fetch_add(1, Ordering::SeqCst);
            },
        )));
        let limit_keys = Arc::new(Mutex::new(Vec::new()));

        let engine = ContainerdEngine::new(
            client,
            Box::new(RuncCgroupMatcher),
            Box::new(FakeLimits {
                keys: Arc::clone(&limit_keys),
            }),
            cache.clone(),
            100,
        );

        Fixture {
            engine,
            cache,
            notifications,
            limit_keys,
        }
    }

    fn descriptor(id: &str) -> Container {
        let spec = br#"{
            "process": {"env": ["PATH=/usr/bin", "HOSTNAME=web"]},
            "mounts": [
                {"source": "/host", "destination": "/mnt", "options": ["ro"]},
                {"source": "tmpfs", "destination": "/dev", "options": ["nosuid", "mode=755"]}
            ],
            "linux": {"rootfsPropagation": "rprivate"}
        }"#;

        Container {
            id: id.to_string(),
            labels: HashMap::from([
                ("io.kubernetes.pod.name".to_string(), "web".to_string()),
                ("oversized".to_string(), "x".repeat(101)),
            ]),
            image: "docker.io/library/ubuntu:22.04".to_string(),
            spec: Some(prost_types::Any {
                type_url: "types.containerd.io/opencontainers/runtime-spec/1/Spec".to_string(),
                value: spec.to_vec(),
            }),
            ..Default::default()
        }
    }

    fn containerd_process() -> ProcessInfo {
        let cgroup = format!("/default/{FULL_ID}");
        ProcessInfo::new(
            4242,
            vec![
                ("cpu".to_string(), cgroup.clone()),
                ("memory".to_string(), cgroup.clone()),
                ("cpuset".to_string(), cgroup),
            ],
        )
    }

    #[tokio::test]
    async fn test_resolves_single_match() {
        let f = fixture(Some(FakeLister::new(Some(vec![descriptor(FULL_ID)]))));
        let mut process = containerd_process();

        assert!(f.engine.resolve(&mut process, false).await);
        assert_eq!(process.container_id.as_deref(), Some(SHORT_ID));

        let container = f.cache.get(SHORT_ID).unwrap();
        assert_eq!(container.id, SHORT_ID);
        assert!(container.full_id.contains(&container.id));
        assert_eq!(container.name, SHORT_ID);
        assert_eq!(container.container_type, ContainerType::Containerd);
        assert_eq!(container.lookup_state, LookupState::Successful);

        assert_eq!(container.image_repo, "docker.io/library");
        assert_eq!(container.image, "ubuntu");
        assert_eq!(container.image_tag, "22.04");
        assert_eq!(container.image_digest, "");

        assert_eq!(container.labels.len(), 1);
        assert_eq!(container.labels["io.kubernetes.pod.name"], "web");

        assert_eq!(container.env, vec!["PATH=/usr/bin", "HOSTNAME=web"]);
        assert_eq!(container.mounts.len(), 2);
        assert_eq!(container.mounts[0].source, "/host");
        assert_eq!(container.mounts[0].destination, "/mnt");
        assert_eq!(container.mounts[0].mode, "");
        assert!(!container.mounts[0].writable);
        assert_eq!(container.mounts[0].propagation, "rprivate");
        assert_eq!(container.mounts[1].mode, "755");
        assert!(container.mounts[1].writable);

        assert_eq!(container.memory_limit, 536870912);
        assert_eq!(container.cpu_shares, 1024);
        assert_eq!(container.cpu_quota, 50000);
        assert_eq!(container.cpu_period, 100000);
        assert_eq!(container.cpuset_cpu_count, 2);

        assert_eq!(f.notifications.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_queries_by_truncated_id_and_process_cgroups() {
        let lister = FakeLister::new(Some(vec![descriptor(FULL_ID)]));
        let f = fixture(Some(lister));
        let mut process = containerd_process();

        assert!(f.engine.resolve(&mut process, true).await);

        let client = f.engine.client.as_ref().unwrap();
        assert_eq!(*client.filters.lock().unwrap(), vec![SHORT_ID.to_string()]);

        let keys = f.limit_keys.lock().unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].container_id, SHORT_ID);
        assert_eq!(keys[0].cpu_cgroup, format!("/default/{FULL_ID}"));
        assert_eq!(keys[0].mem_cgroup, format!("/default/{FULL_ID}"));
        assert_eq!(keys[0].cpuset_cgroup, format!("/default/{FULL_ID}"));
    }

    #[tokio::test]
    async fn test_not_a_containerd_process() {
        let f = fixture(Some(FakeLister::new(Some(vec![descriptor(FULL_ID)]))));
        let mut process = ProcessInfo::new(
            1,
            vec![(String::new(), "/system.slice/sshd.service".to_string())],
        );

        assert!(!f.engine.resolve(&mut process, false).await);
        assert_eq!(process.container_id, None);
        assert!(f.cache.is_empty());
        assert_eq!(f.notifications.load(Ordering::SeqCst), 0);
        // No daemon round trip for processes outside the layout
        let client = f.engine.client.as_ref().unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_match() {
        let f = fixture(Some(FakeLister::new(Some(Vec::new()))));
        let mut process = containerd_process();

        assert!(!f.engine.resolve(&mut process, false).await);
        assert_eq!(process.container_id, None);
        assert!(f.cache.is_empty());
        assert!(f.limit_keys.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_multiple_matches() {
        let other = format!("{SHORT_ID}{}", "0".repeat(52));
        let f = fixture(Some(FakeLister::new(Some(vec![
            descriptor(FULL_ID),
            descriptor(&other),
        ]))));
        let mut process = containerd_process();

        assert!(!f.engine.resolve(&mut process, false).await);
        assert_eq!(process.container_id, None);
        assert!(f.cache.is_empty());
        assert_eq!(f.notifications.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rpc_error() {
        let f = fixture(Some(FakeLister::new(None)));
        let mut process = containerd_process();

        assert!(!f.engine.resolve(&mut process, false).await);
        assert_eq!(process.container_id, None);
        assert!(f.cache.is_empty());
    }

    #[tokio::test]
    async fn test_inactive_backend() {
        let f = fixture(None);
        let mut process = containerd_process();

        assert!(!f.engine.is_active());
        assert!(!f.engine.resolve(&mut process, false).await);
        assert_eq!(process.container_id, None);
        assert!(f.cache.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let f = fixture(Some(FakeLister::new(Some(vec![descriptor(FULL_ID)]))));

        let mut first = containerd_process();
        let mut second = containerd_process();
        second.pid = 4343;

        assert!(f.engine.resolve(&mut first, false).await);
        assert!(f.engine.resolve(&mut second, false).await);

        assert_eq!(f.cache.len(), 1);
        assert_eq!(f.notifications.load(Ordering::SeqCst), 1);
        assert_eq!(second.container_id.as_deref(), Some(SHORT_ID));
    }

    #[tokio::test]
    async fn test_concurrent_resolutions_publish_once() {
        let f = fixture(Some(FakeLister::new(Some(vec![descriptor(FULL_ID)]))));

        let mut first = containerd_process();
        let mut second = containerd_process();
        let (a, b) = tokio::join!(
            f.engine.resolve(&mut first, false),
            f.engine.resolve(&mut second, false)
        );

        assert!(a && b);
        assert_eq!(f.cache.len(), 1);
        assert_eq!(f.notifications.load(Ordering::SeqCst), 1);
    }

    /// Answers `should_lookup` as if no resolution had completed yet, like a
    /// resolver that checked just before another one published.
    struct StaleCache {
        inner: InMemoryContainerCache,
        checks: AtomicUsize,
    }

    impl ContainerCache for StaleCache {
        fn should_lookup(&self, _id: &str, _container_type: ContainerType) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn add_container(&self, container: Arc<ContainerInfo>, process: &ProcessInfo) {
            self.inner.add_container(container, process);
        }

        fn notify_new_container(&self, container: &ContainerInfo, process: &ProcessInfo) {
            self.inner.notify_new_container(container, process);
        }
    }

    #[tokio::test]
    async fn test_racing_publications_are_deduplicated_by_cache() {
        let notifications = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&notifications);
        let cache = Arc::new(StaleCache {
            inner: InMemoryContainerCache::new().with_observer(Box::new(
                move |_: &ContainerInfo, _: &ProcessInfo| {
                    seen.fetch_add(1, Ordering::SeqCst);
                },
            )),
            checks: AtomicUsize::new(0),
        });
        let engine = ContainerdEngine::new(
            Some(FakeLister::new(Some(vec![descriptor(FULL_ID)]))),
            Box::new(RuncCgroupMatcher),
            Box::new(FakeLimits {
                keys: Arc::new(Mutex::new(Vec::new())),
            }),
            cache.clone(),
            100,
        );

        let mut first = containerd_process();
        let mut second = containerd_process();
        second.pid = 4343;
        let (a, b) = tokio::join!(
            engine.resolve(&mut first, false),
            engine.resolve(&mut second, false)
        );

        assert!(a && b);
        // Both resolutions attempted to publish
        assert_eq!(cache.checks.load(Ordering::SeqCst), 2);
        assert_eq!(cache.inner.len(), 1);
        assert_eq!(notifications.load(Ordering::SeqCst), 1);
        assert_eq!(first.container_id.as_deref(), Some(SHORT_ID));
        assert_eq!(second.container_id.as_deref(), Some(SHORT_ID));
    }

    #[tokio::test]
    async fn test_image_without_tag_and_bad_spec() {
        let mut container = descriptor(FULL_ID);
        container.image = "nginx".to_string();
        container.spec = Some(prost_types::Any {
            type_url: String::new(),
            value: b"{not json".to_vec(),
        });
        let f = fixture(Some(FakeLister::new(Some(vec![container]))));
        let mut process = containerd_process();

        assert!(f.engine.resolve(&mut process, false).await);

        let container = f.cache.get(SHORT_ID).unwrap();
        assert_eq!(container.image_repo, "");
        assert_eq!(container.image, "nginx");
        assert_eq!(container.image_tag, "");
        assert!(container.mounts.is_empty());
        assert!(container.env.is_empty());
    }

    #[tokio::test]
    async fn test_missing_spec() {
        let mut container = descriptor(FULL_ID);
        container.spec = None;
        let f = fixture(Some(FakeLister::new(Some(vec![container]))));
        let mut process = containerd_process();

        assert!(f.engine.resolve(&mut process, false).await);
        let container = f.cache.get(SHORT_ID).unwrap();
        assert!(container.mounts.is_empty());
        assert_eq!(container.image, "ubuntu");
    }
}
