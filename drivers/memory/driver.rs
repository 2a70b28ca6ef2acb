use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::credential::Credential;
use crate::storage::{
    BackendBox, BackendFactory, ContainerItem, ContainerMetadata, FilterSpec, ObjectMetadata,
    ObjectReader, ObjectStorageBackend,
};
use crate::utils::DELIMITER;

const DEFAULT_BASE_URL: &str = "memory://local/v1/AUTH_memory";

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    created: DateTime<Utc>,
    last_modified: DateTime<Utc>,
}

/// container -> key -> object, keys kept sorted like a Swift listing
type ObjectTable = HashMap<String, BTreeMap<String, StoredObject>>;

/// In-memory backend / 内存后端
pub struct MemoryBackend {
    base_url: String,
    objects: RwLock<ObjectTable>,
    containers: RwLock<HashMap<String, ContainerMetadata>>,
}

impl MemoryBackend {
    /// `base_url` plays the role of the project root, e.g. `https://host/v1/AUTH_x`
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches(DELIMITER).to_string(),
            objects: RwLock::new(HashMap::new()),
            containers: RwLock::new(HashMap::new()),
        }
    }

    /// Whether `container` holds `key` / 是否存在对象
    pub fn contains(&self, container: &str, key: &str) -> bool {
        self.objects
            .read()
            .get(container)
            .map_or(false, |objects| objects.contains_key(key))
    }

    pub fn object_count(&self, container: &str) -> usize {
        self.objects.read().get(container).map_or(0, BTreeMap::len)
    }

    pub fn container_metadata(&self, container: &str) -> Option<ContainerMetadata> {
        self.containers.read().get(container).cloned()
    }

    pub fn set_container_metadata(&self, container: &str, metadata: ContainerMetadata) {
        self.containers.write().insert(container.to_string(), metadata);
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Parent pseudo-directory of a key, `""` at the container root
fn parent_of(key: &str) -> &str {
    key.rsplit_once(DELIMITER).map_or("", |(parent, _)| parent)
}

/// Apply a listing filter to sorted keys / 按条件筛选
fn list_keys<'a>(
    objects: impl Iterator<Item = (&'a String, &'a StoredObject)>,
    filter: &FilterSpec,
) -> Vec<ContainerItem> {
    let prefix = filter.path_prefix.as_deref().unwrap_or("");
    let mut items: Vec<ContainerItem> = Vec::new();

    for (key, object) in objects {
        if !key.starts_with(prefix) {
            continue;
        }
        if let Some(path) = filter.exact_path.as_deref() {
            if key.ends_with(DELIMITER) || parent_of(key) != path {
                continue;
            }
        }

        let rest = &key[prefix.len()..];
        let item = match rest.find(DELIMITER) {
            Some(pos) if filter.require_delimiter_boundary => ContainerItem::Directory {
                name: format!("{}{}", prefix, &rest[..=pos]),
            },
            _ => ContainerItem::Object {
                name: key.clone(),
                size: object.data.len() as u64,
            },
        };

        // sorted input: a rolled-up directory repeats only consecutively
        if items.last() == Some(&item) {
            continue;
        }
        items.push(item);

        if filter.take_limit.map_or(false, |limit| items.len() >= limit) {
            break;
        }
    }

    items
}

#[async_trait]
impl ObjectStorageBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn container_url(&self, container: &str) -> Result<String> {
        Ok(format!("{}/{}", self.base_url, container))
    }

    async fn list_container(&self, container: &str, filter: &FilterSpec) -> Result<Vec<ContainerItem>> {
        let objects = self.objects.read();
        Ok(match objects.get(container) {
            Some(table) => list_keys(table.iter(), filter),
            None => Vec::new(),
        })
    }

    async fn object_exists(&self, container: &str, key: &str) -> Result<bool> {
        Ok(self.contains(container, key))
    }

    async fn read_object(&self, container: &str, key: &str) -> Result<ObjectReader> {
        let data = self
            .objects
            .read()
            .get(container)
            .and_then(|objects| objects.get(key))
            .map(|object| object.data.clone())
            .ok_or_else(|| anyhow!("Object not found: {}/{}", container, key))?;
        Ok(Box::new(std::io::Cursor::new(data)))
    }

    async fn write_object(&self, container: &str, key: &str, data: Bytes) -> Result<()> {
        let now = Utc::now();
        let mut objects = self.objects.write();
        let table = objects.entry(container.to_string()).or_default();
        let created = table.get(key).map_or(now, |existing| existing.created);
        table.insert(
            key.to_string(),
            StoredObject {
                data,
                created,
                last_modified: now,
            },
        );
        Ok(())
    }

    async fn delete_object(&self, container: &str, key: &str) -> Result<()> {
        if let Some(table) = self.objects.write().get_mut(container) {
            table.remove(key);
        }
        Ok(())
    }

    async fn delete_objects(&self, container: &str, keys: Vec<String>) -> Result<()> {
        if let Some(table) = self.objects.write().get_mut(container) {
            for key in &keys {
                table.remove(key);
            }
        }
        Ok(())
    }

    async fn read_object_metadata(&self, container: &str, key: &str) -> Result<ObjectMetadata> {
        Ok(self
            .objects
            .read()
            .get(container)
            .and_then(|objects| objects.get(key))
            .map(|object| ObjectMetadata {
                created: Some(object.created),
                last_modified: Some(object.last_modified),
            })
            .unwrap_or_default())
    }

    async fn read_container_metadata(&self, container: &str) -> Result<ContainerMetadata> {
        Ok(self.container_metadata(container).unwrap_or_default())
    }

    async fn save_container_metadata(&self, container: &str, metadata: &ContainerMetadata) -> Result<()> {
        self.set_container_metadata(container, metadata.clone());
        Ok(())
    }
}

/// Factory handing out one fresh memory backend per credential / 内存后端工厂
///
/// The project root is derived from the credential's project id, so adapters
/// built from the same connection string address the same URL space.
#[derive(Default)]
pub struct MemoryBackendFactory;

impl BackendFactory for MemoryBackendFactory {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    fn create_backend(&self, credential: &Credential) -> crate::error::Result<BackendBox> {
        let project = credential.project_id.as_deref().unwrap_or("memory");
        let base_url = format!("memory://local/v1/AUTH_{}", project);
        Ok(Arc::new(MemoryBackend::new(&base_url)))
    }
}
