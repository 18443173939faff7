#![allow(dead_code)]

use async_trait::async_trait;
use edgeflow_core::{QueueConfig, ResourceConfig, ResourceDescriptor, ResourceId, ResourceKind, Scope};
use edgeflow_engine::{
    AdoptionCheck, CancelFlag, MemoryStateBackend, ProviderAdapter, ProviderContext, ProviderError,
    ProviderRegistry, ProviderResult, Reconciler, RemoteResource, RetryConfig, StateBackend,
    StaticSecretResolver,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub const ALL_KINDS: [ResourceKind; 7] = [
    ResourceKind::Queue,
    ResourceKind::VectorIndex,
    ResourceKind::Worker,
    ResourceKind::Ai,
    ResourceKind::Domain,
    ResourceKind::EventSource,
    ResourceKind::Comment,
];

#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, operation: &str, identity: &str) {
        self.0
            .lock()
            .unwrap()
            .push(format!("{} {}", operation, identity));
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

struct Failure {
    operation: String,
    identity: String,
    error: ProviderError,
    remaining: u32,
}

pub struct MemoryProvider {
    kind: ResourceKind,
    log: CallLog,
    existing: Mutex<BTreeMap<String, RemoteResource>>,
    failures: Mutex<Vec<Failure>>,
    conflicts: Mutex<BTreeMap<String, String>>,
    cancel_on_create: Mutex<Option<(String, CancelFlag)>>,
    counter: AtomicU32,
}

impl MemoryProvider {
    pub fn new(kind: ResourceKind, log: CallLog) -> Self {
        Self {
            kind,
            log,
            existing: Mutex::new(BTreeMap::new()),
            failures: Mutex::new(Vec::new()),
            conflicts: Mutex::new(BTreeMap::new()),
            cancel_on_create: Mutex::new(None),
            counter: AtomicU32::new(0),
        }
    }

    pub fn add_existing(&self, identity: &str, remote: RemoteResource) {
        self.existing
            .lock()
            .unwrap()
            .insert(identity.to_string(), remote);
    }

    pub fn fail_times(&self, operation: &str, identity: &str, error: ProviderError, times: u32) {
        self.failures.lock().unwrap().push(Failure {
            operation: operation.to_string(),
            identity: identity.to_string(),
            error,
            remaining: times,
        });
    }

    pub fn always_fail(&self, operation: &str, identity: &str, error: ProviderError) {
        self.fail_times(operation, identity, error, u32::MAX);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn conflict_on(&self, identity: &str, reason: &str) {
        self.conflicts
            .lock()
            .unwrap()
            .insert(identity.to_string(), reason.to_string());
    }

    pub fn cancel_during_create(&self, identity: &str, flag: CancelFlag) {
        *self.cancel_on_create.lock().unwrap() = Some((identity.to_string(), flag));
    }

    fn identity_of(&self, config: &ResourceConfig) -> String {
        config
            .identity()
            .unwrap_or_else(|| self.kind.as_str().to_string())
    }

    fn next_ref(&self, identity: &str) -> String {
        let serial = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}/{}-{}", self.kind, identity, serial)
    }

    fn scripted_failure(&self, operation: &str, identity: &str) -> Option<ProviderError> {
        let mut failures = self.failures.lock().unwrap();
        for failure in failures.iter_mut() {
            if failure.operation == operation && failure.identity == identity && failure.remaining > 0
            {
                failure.remaining -= 1;
                return Some(failure.error.clone());
            }
        }
        None
    }

    fn outputs_for(
        &self,
        ctx: &ProviderContext,
        config: &ResourceConfig,
        provider_ref: &str,
    ) -> ProviderResult<BTreeMap<String, serde_json::Value>> {
        let mut outputs = BTreeMap::new();
        outputs.insert("id".to_string(), json!(provider_ref));
        match config {
            ResourceConfig::Queue(queue) => {
                outputs.insert("name".to_string(), json!(queue.name));
            }
            ResourceConfig::VectorIndex(index) => {
                outputs.insert("name".to_string(), json!(index.name));
                outputs.insert("dimensions".to_string(), json!(index.dimensions));
            }
            ResourceConfig::Worker(worker) => {
                outputs.insert("name".to_string(), json!(worker.name));
                if worker.url {
                    outputs.insert(
                        "url".to_string(),
                        json!(format!("https://{}.example-edge.dev", worker.name)),
                    );
                }
            }
            ResourceConfig::Ai(_) => {}
            ResourceConfig::Domain(domain) => {
                outputs.insert("hostname".to_string(), json!(domain.domain_name));
            }
            ResourceConfig::EventSource(_) => {}
            ResourceConfig::Comment(comment) => {
                outputs.insert("body".to_string(), json!(ctx.render(&comment.body)?));
                outputs.insert("issue".to_string(), json!(comment.issue));
            }
        }
        Ok(outputs)
    }
}

#[async_trait]
impl ProviderAdapter for MemoryProvider {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn find(
        &self,
        _ctx: &ProviderContext,
        identity: &str,
    ) -> ProviderResult<Option<RemoteResource>> {
        self.log.record("find", identity);
        if let Some(error) = self.scripted_failure("find", identity) {
            return Err(error);
        }
        Ok(self.existing.lock().unwrap().get(identity).cloned())
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        config: &ResourceConfig,
    ) -> ProviderResult<RemoteResource> {
        let identity = self.identity_of(config);
        self.log.record("create", &identity);
        if let Some((target, flag)) = self.cancel_on_create.lock().unwrap().as_ref()
            && target == &identity
        {
            flag.cancel();
        }
        if let Some(error) = self.scripted_failure("create", &identity) {
            return Err(error);
        }
        let provider_ref = self.next_ref(&identity);
        let outputs = self.outputs_for(ctx, config, &provider_ref)?;
        let remote = RemoteResource {
            provider_ref,
            outputs,
        };
        self.existing
            .lock()
            .unwrap()
            .insert(identity, remote.clone());
        Ok(remote)
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        provider_ref: &str,
        config: &ResourceConfig,
    ) -> ProviderResult<RemoteResource> {
        let identity = self.identity_of(config);
        self.log.record("update", &identity);
        if let Some(error) = self.scripted_failure("update", &identity) {
            return Err(error);
        }
        let outputs = self.outputs_for(ctx, config, provider_ref)?;
        let remote = RemoteResource {
            provider_ref: provider_ref.to_string(),
            outputs,
        };
        self.existing
            .lock()
            .unwrap()
            .insert(identity, remote.clone());
        Ok(remote)
    }

    async fn delete(&self, _ctx: &ProviderContext, provider_ref: &str) -> ProviderResult<()> {
        // provider_ref から identity を逆引きして、ログと失敗判定の粒度を揃える
        let identity = {
            let existing = self.existing.lock().unwrap();
            existing
                .iter()
                .find(|(_, remote)| remote.provider_ref == provider_ref)
                .map(|(identity, _)| identity.clone())
                .unwrap_or_else(|| provider_ref.to_string())
        };
        self.log.record("delete", &identity);
        if let Some(error) = self.scripted_failure("delete", &identity) {
            return Err(error);
        }
        self.existing
            .lock()
            .unwrap()
            .retain(|_, remote| remote.provider_ref != provider_ref);
        Ok(())
    }

    fn check_adoption(&self, config: &ResourceConfig, _remote: &RemoteResource) -> AdoptionCheck {
        let identity = self.identity_of(config);
        match self.conflicts.lock().unwrap().get(&identity) {
            Some(reason) => AdoptionCheck::conflict(reason.clone()),
            None => AdoptionCheck::Compatible,
        }
    }
}

pub struct Harness {
    pub scope: Scope,
    pub backend: Arc<MemoryStateBackend>,
    pub log: CallLog,
    providers: BTreeMap<ResourceKind, Arc<MemoryProvider>>,
}

impl Harness {
    pub fn new(app: &str, stage: &str) -> Self {
        let log = CallLog::new();
        let mut providers = BTreeMap::new();
        for kind in ALL_KINDS {
            providers.insert(kind, Arc::new(MemoryProvider::new(kind, log.clone())));
        }
        Self {
            scope: Scope::new(app, stage),
            backend: Arc::new(MemoryStateBackend::new()),
            log,
            providers,
        }
    }

    pub fn provider(&self, kind: ResourceKind) -> Arc<MemoryProvider> {
        Arc::clone(&self.providers[&kind])
    }

    pub fn registry(&self) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        for adapter in self.providers.values() {
            registry.register(Arc::clone(adapter) as Arc<dyn ProviderAdapter>);
        }
        registry
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.scope.clone(),
            Arc::clone(&self.backend) as Arc<dyn StateBackend>,
            self.registry(),
        )
        .with_retry(RetryConfig::none())
        .with_resolver(Arc::new(StaticSecretResolver::new()))
    }
}

pub fn rid(value: &str) -> ResourceId {
    ResourceId::new(value).unwrap()
}

pub fn queue(id: &str, name: &str) -> ResourceDescriptor {
    ResourceDescriptor::named(id, ResourceConfig::Queue(QueueConfig::new(name))).unwrap()
}
