// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::container::{ContainerInfo, ContainerType, LookupState};
use crate::process::ProcessInfo;

/// Shared store of resolved containers.
///
/// Implementations own deduplication: several resolvers may race between
/// `should_lookup` and `add_container` for the same id, and the cache must
/// keep a single record and notify at most once.
pub trait ContainerCache: Send + Sync {
    /// Whether `id` still needs to be resolved.
    fn should_lookup(&self, id: &str, container_type: ContainerType) -> bool;

    fn add_container(&self, container: Arc<ContainerInfo>, process: &ProcessInfo);

    fn notify_new_container(&self, container: &ContainerInfo, process: &ProcessInfo);
}

pub type Observer = Box<dyn Fn(&ContainerInfo, &ProcessInfo) + Send + Sync>;

#[derive(Default)]
struct State {
    containers: HashMap<String, Arc<ContainerInfo>>,
    notified: HashSet<String>,
}

/// A process-local `ContainerCache`.
#[derive(Default)]
pub struct InMemoryContainerCache {
    state: Mutex<State>,
    observers: Vec<Observer>,
}

impl InMemoryContainerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback run once for every newly published container.
    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<ContainerInfo>> {
        self.lock().containers.get(id).cloned()
    }

    pub fn containers(&self) -> Vec<Arc<ContainerInfo>> {
        let mut containers: Vec<_> = self.lock().containers.values().cloned().collect();
        containers.sort_by(|a, b| a.id.cmp(&b.id));
        containers
    }

    pub fn len(&self) -> usize {
        self.lock().containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Every update is a single insert, so a poisoned lock still guards
        // consistent state.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ContainerCache for InMemoryContainerCache {
    fn should_lookup(&self, id: &str, _container_type: ContainerType) -> bool {
        self.lock()
            .containers
            .get(id)
            .is_none_or(|c| c.lookup_state != LookupState::Successful)
    }

    fn add_container(&self, container: Arc<ContainerInfo>, process: &ProcessInfo) {
        let mut state = self.lock();
        let stored = state
            .containers
            .get(&container.id)
            .is_some_and(|c| c.lookup_state == LookupState::Successful);
        if stored {
            debug!(
                "container {} already stored, ignoring record from pid {}",
                container.id, process.pid
            );
            return;
        }
        state.containers.insert(container.id.clone(), container);
    }

    fn notify_new_container(&self, container: &ContainerInfo, process: &ProcessInfo) {
        // Observers run outside the lock
        if !self.lock().notified.insert(container.id.clone()) {
            return;
        }
        for observer in &self.observers {
            observer(container, process);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(id: &str, image: &str) -> Arc<ContainerInfo> {
        let mut info = ContainerInfo::new(id.to_string(), ContainerType::Containerd);
        info.image = image.to_string();
        info.lookup_state = LookupState::Successful;
        Arc::new(info)
    }

    #[test]
    fn test_should_lookup_until_stored() {
        let cache = InMemoryContainerCache::new();
        let process = ProcessInfo::new(1, Vec::new());
        assert!(cache.should_lookup("abc", ContainerType::Containerd));

        cache.add_container(record("abc", "nginx"), &process);
        assert!(!cache.should_lookup("abc", ContainerType::Containerd));
        assert!(cache.should_lookup("def", ContainerType::Containerd));
    }

    #[test]
    fn test_first_record_wins() {
        let cache = InMemoryContainerCache::new();
        let process = ProcessInfo::new(1, Vec::new());

        cache.add_container(record("abc", "first"), &process);
        cache.add_container(record("abc", "second"), &process);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("abc").unwrap().image, "first");
    }

    #[test]
    fn test_notifies_once_per_id() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let cache = InMemoryContainerCache::new().with_observer(Box::new(move |_: &ContainerInfo, _: &ProcessInfo| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        let process = ProcessInfo::new(1, Vec::new());

        let abc = record("abc", "nginx");
        cache.notify_new_container(&abc, &process);
        cache.notify_new_container(&abc, &process);
        cache.notify_new_container(&record("def", "redis"), &process);

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_containers_sorted_by_id() {
        let cache = InMemoryContainerCache::new();
        let process = ProcessInfo::new(1, Vec::new());
        cache.add_container(record("bbb", "b"), &process);
        cache.add_container(record("aaa", "a"), &process);

        let ids: Vec<String> = cache.containers().iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec!["aaa", "bbb"]);
        assert!(!cache.is_empty());
    }
}
