use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;

use super::adapter::ObjectStorageFileSystem;
use super::gateway::{BlockingGateway, Timeouts};
use super::BackendFactory;
use crate::config::{DriverConfig, RoutingMode};
use crate::credential;
use crate::error::Result;
use crate::utils::with_trailing_slash;

/// Identity of an adapter configuration / 连接指纹
///
/// Built from the fields that change how paths map to objects or which
/// account is used. `max_days` and `allowed_origins` are container policy
/// applied at first construction, so they are not part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionFingerprint {
    connection_string: String,
    root_url: Option<String>,
    container_name: String,
    route_alias: Option<String>,
    use_private_container: bool,
    routing_mode: RoutingMode,
}

impl ConnectionFingerprint {
    pub fn from_config(config: &DriverConfig) -> Self {
        Self {
            connection_string: config.connection_string.clone(),
            root_url: config.host_root().map(with_trailing_slash),
            // kept verbatim: backend calls use the container name as given
            container_name: config.container_name.clone(),
            route_alias: config.alias().map(str::to_string),
            use_private_container: config.use_private_container,
            routing_mode: config.routing_mode,
        }
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    pub fn routing_mode(&self) -> RoutingMode {
        self.routing_mode
    }

    /// Short digest, safe to log / 摘要（可记录日志）
    ///
    /// Derived from `DefaultHasher`, so it may differ across Rust releases.
    pub fn digest(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

// The connection string carries the password: only the digest is printed.
impl fmt::Display for ConnectionFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}, {}, {:016x}]",
            self.container_name,
            self.routing_mode.as_str(),
            if self.use_private_container { "private" } else { "public" },
            self.digest()
        )
    }
}

/// Adapter registry (one adapter per fingerprint) / 适配器注册表
///
/// A single lock is held across lookup and construction, so at most one
/// adapter is ever built for a fingerprint and concurrent callers for other
/// fingerprints wait too. Failed constructions leave nothing behind.
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: Arc<Mutex<HashMap<ConnectionFingerprint, Arc<ObjectStorageFileSystem>>>>,
    factory: Arc<dyn BackendFactory>,
    gateway: Arc<BlockingGateway>,
}

impl AdapterRegistry {
    pub fn new(factory: Arc<dyn BackendFactory>, gateway: Arc<BlockingGateway>) -> Self {
        Self {
            adapters: Arc::new(Mutex::new(HashMap::new())),
            factory,
            gateway,
        }
    }

    /// Registry with its own gateway / 使用独立网关创建
    pub fn with_timeouts(factory: Arc<dyn BackendFactory>, timeouts: Timeouts) -> Result<Self> {
        Ok(Self::new(factory, Arc::new(BlockingGateway::new(timeouts)?)))
    }

    pub fn backend_type(&self) -> &'static str {
        self.factory.backend_type()
    }

    pub fn gateway(&self) -> &Arc<BlockingGateway> {
        &self.gateway
    }

    /// Cached adapter for `config`, building it on first use / 获取或创建适配器
    pub fn get_or_create(&self, config: &DriverConfig) -> Result<Arc<ObjectStorageFileSystem>> {
        let fingerprint = ConnectionFingerprint::from_config(config);
        let mut adapters = self.adapters.lock();

        if let Some(adapter) = adapters.get(&fingerprint) {
            tracing::debug!("Reusing object storage adapter: {}", fingerprint);
            return Ok(adapter.clone());
        }

        match self.build(config) {
            Ok(adapter) => {
                let adapter = Arc::new(adapter);
                adapters.insert(fingerprint.clone(), adapter.clone());
                tracing::info!(
                    "Object storage adapter registered: {} (total: {})",
                    fingerprint,
                    adapters.len()
                );
                Ok(adapter)
            }
            Err(e) => {
                tracing::error!("Object storage adapter creation failed: {} - {}", fingerprint, e);
                Err(e)
            }
        }
    }

    fn build(&self, config: &DriverConfig) -> Result<ObjectStorageFileSystem> {
        config.validate()?;
        let credential = credential::decode(&config.connection_string)?;
        let backend = self.factory.create_backend(&credential)?;
        ObjectStorageFileSystem::connect(config.clone(), backend, self.gateway.clone())
    }

    /// Cached adapter without constructing one / 仅查询缓存
    pub fn get(&self, config: &DriverConfig) -> Option<Arc<ObjectStorageFileSystem>> {
        let fingerprint = ConnectionFingerprint::from_config(config);
        self.adapters.lock().get(&fingerprint).cloned()
    }

    pub fn len(&self) -> usize {
        self.adapters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.lock().is_empty()
    }

    pub fn fingerprints(&self) -> Vec<ConnectionFingerprint> {
        self.adapters.lock().keys().cloned().collect()
    }

    /// Drop every cached adapter, running the factory's release hook / 清空注册表
    pub fn clear(&self) {
        let drained: Vec<_> = self.adapters.lock().drain().collect();
        for (fingerprint, adapter) in &drained {
            self.factory.release(adapter);
            tracing::info!("Object storage adapter released: {}", fingerprint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::Credential;
    use crate::drivers::memory::MemoryBackend;
    use crate::error::DriverError;
    use crate::storage::{
        BackendBox, ContainerItem, ContainerMetadata, FilterSpec, ObjectMetadata, ObjectReader,
        ObjectStorageBackend,
    };
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    const BASE_URL: &str = "https://storage.example/v1/AUTH_proj";

    /// Memory backend that counts and optionally slows or fails URL resolution
    struct ProbeBackend {
        inner: MemoryBackend,
        url_calls: Arc<AtomicUsize>,
        url_delay: Duration,
        failures_left: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ObjectStorageBackend for ProbeBackend {
        fn name(&self) -> &str {
            "probe"
        }

        async fn container_url(&self, container: &str) -> anyhow::Result<String> {
            self.url_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.url_delay).await;
            let should_fail = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if should_fail {
                anyhow::bail!("identity service unavailable");
            }
            self.inner.container_url(container).await
        }

        async fn list_container(&self, container: &str, filter: &FilterSpec) -> anyhow::Result<Vec<ContainerItem>> {
            self.inner.list_container(container, filter).await
        }

        async fn object_exists(&self, container: &str, key: &str) -> anyhow::Result<bool> {
            self.inner.object_exists(container, key).await
        }

        async fn read_object(&self, container: &str, key: &str) -> anyhow::Result<ObjectReader> {
            self.inner.read_object(container, key).await
        }

        async fn write_object(&self, container: &str, key: &str, data: Bytes) -> anyhow::Result<()> {
            self.inner.write_object(container, key, data).await
        }

        async fn delete_object(&self, container: &str, key: &str) -> anyhow::Result<()> {
            self.inner.delete_object(container, key).await
        }

        async fn delete_objects(&self, container: &str, keys: Vec<String>) -> anyhow::Result<()> {
            self.inner.delete_objects(container, keys).await
        }

        async fn read_object_metadata(&self, container: &str, key: &str) -> anyhow::Result<ObjectMetadata> {
            self.inner.read_object_metadata(container, key).await
        }

        async fn read_container_metadata(&self, container: &str) -> anyhow::Result<ContainerMetadata> {
            self.inner.read_container_metadata(container).await
        }

        async fn save_container_metadata(&self, container: &str, metadata: &ContainerMetadata) -> anyhow::Result<()> {
            self.inner.save_container_metadata(container, metadata).await
        }
    }

    #[derive(Default)]
    struct ProbeFactory {
        created: AtomicUsize,
        released: AtomicUsize,
        url_calls: Arc<AtomicUsize>,
        url_delay: Duration,
        failures_left: Arc<AtomicUsize>,
    }

    impl BackendFactory for ProbeFactory {
        fn backend_type(&self) -> &'static str {
            "probe"
        }

        fn create_backend(&self, credential: &Credential) -> Result<BackendBox> {
            assert_eq!(credential.username.as_deref(), Some("u"));
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(ProbeBackend {
                inner: MemoryBackend::new(BASE_URL),
                url_calls: self.url_calls.clone(),
                url_delay: self.url_delay,
                failures_left: self.failures_left.clone(),
            }))
        }

        fn release(&self, _adapter: &ObjectStorageFileSystem) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn registry(factory: Arc<ProbeFactory>, control_plane: Duration) -> AdapterRegistry {
        AdapterRegistry::with_timeouts(
            factory,
            Timeouts {
                control_plane,
                data_plane: Duration::from_secs(5),
            },
        )
        .unwrap()
    }

    fn config() -> DriverConfig {
        DriverConfig::new("media", "urlBase=https://keystone.example/v3;username=u;password=p")
    }

    #[test]
    fn test_same_config_same_instance() {
        let factory = Arc::new(ProbeFactory::default());
        let registry = registry(factory.clone(), Duration::from_secs(5));

        let a = registry.get_or_create(&config()).unwrap();
        let b = registry.get_or_create(&config()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        // container policy is not part of the identity
        let c = registry.get_or_create(&config().with_max_days(7)).unwrap();
        assert!(Arc::ptr_eq(&a, &c));
        assert_eq!(c.config().max_days, DriverConfig::default().max_days);

        assert_eq!(registry.len(), 1);
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_distinct_identity_distinct_instance() {
        let factory = Arc::new(ProbeFactory::default());
        let registry = registry(factory, Duration::from_secs(5));

        let a = registry.get_or_create(&config()).unwrap();
        let b = registry.get_or_create(&config().with_route_alias(Some("assets"))).unwrap();
        let c = registry.get_or_create(&config().with_private_container(false)).unwrap();
        let d = registry
            .get_or_create(&config().with_routing_mode(RoutingMode::EmbeddedContainer))
            .unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(!Arc::ptr_eq(&a, &d));
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_equivalent_spellings_share_instance() {
        let factory = Arc::new(ProbeFactory::default());
        let registry = registry(factory, Duration::from_secs(5));

        let a = registry
            .get_or_create(&config().with_root_url("https://cdn.example").with_route_alias(Some("media")))
            .unwrap();
        let b = registry
            .get_or_create(&config().with_root_url("https://cdn.example/").with_route_alias(Some("/media/")))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_container_name_whitespace_is_identity() {
        let factory = Arc::new(ProbeFactory::default());
        let registry = registry(factory, Duration::from_secs(5));
        let connection = "urlBase=https://keystone.example/v3;username=u;password=p";

        let padded = registry.get_or_create(&DriverConfig::new("media ", connection)).unwrap();
        let plain = registry.get_or_create(&DriverConfig::new("media", connection)).unwrap();

        assert!(!Arc::ptr_eq(&padded, &plain));
        assert_eq!(plain.container_name(), "media");
        assert_eq!(padded.container_name(), "media ");
        assert_eq!(padded.fingerprint().container_name(), padded.container_name());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_concurrent_first_use_constructs_once() {
        let factory = Arc::new(ProbeFactory {
            url_delay: Duration::from_millis(50),
            ..Default::default()
        });
        let registry = registry(factory.clone(), Duration::from_secs(5));
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    registry.get_or_create(&config()).unwrap()
                })
            })
            .collect();

        let adapters: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(adapters.iter().all(|a| Arc::ptr_eq(a, &adapters[0])));
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(factory.url_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_not_cached() {
        let factory = Arc::new(ProbeFactory {
            failures_left: Arc::new(AtomicUsize::new(1)),
            ..Default::default()
        });
        let registry = registry(factory.clone(), Duration::from_secs(5));

        let err = registry.get_or_create(&config()).unwrap_err();
        assert!(matches!(err, DriverError::Backend(_)));
        assert!(registry.is_empty());

        registry.get_or_create(&config()).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(factory.url_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_construction_timeout_not_cached() {
        let factory = Arc::new(ProbeFactory {
            url_delay: Duration::from_millis(300),
            ..Default::default()
        });
        let registry = registry(factory, Duration::from_millis(50));

        let err = registry.get_or_create(&config()).unwrap_err();
        assert!(err.is_timeout());
        assert!(registry.get(&config()).is_none());
    }

    #[test]
    fn test_invalid_config_never_reaches_backend() {
        let factory = Arc::new(ProbeFactory::default());
        let registry = registry(factory.clone(), Duration::from_secs(5));

        let err = registry.get_or_create(&DriverConfig::new("  ", "username=u")).unwrap_err();
        assert!(matches!(err, DriverError::InvalidConfiguration(_)));

        let err = registry.get_or_create(&DriverConfig::new("media", "username")).unwrap_err();
        assert!(matches!(err, DriverError::InvalidConfiguration(_)));

        assert_eq!(factory.created.load(Ordering::SeqCst), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clear_releases_adapters() {
        let factory = Arc::new(ProbeFactory::default());
        let registry = registry(factory.clone(), Duration::from_secs(5));

        let first = registry.get_or_create(&config()).unwrap();
        registry.get_or_create(&config().with_route_alias(None)).unwrap();
        registry.clear();

        assert_eq!(factory.released.load(Ordering::SeqCst), 2);
        assert!(registry.is_empty());

        let rebuilt = registry.get_or_create(&config()).unwrap();
        assert!(!Arc::ptr_eq(&first, &rebuilt));
    }

    #[test]
    fn test_fingerprint_display_hides_secrets() {
        let fingerprint = ConnectionFingerprint::from_config(&config());
        let shown = fingerprint.to_string();
        assert!(shown.starts_with("media[alias_route, private, "));
        assert!(!shown.contains("password"));
        assert!(!shown.contains("keystone"));
    }
}
