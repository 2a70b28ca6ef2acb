//! Object storage file system adapter / 对象存储文件系统适配器
//!
//! Every operation maps the incoming path to a `StorageRef`, then makes one or
//! two backend calls through the blocking gateway. Listings, existence checks,
//! metadata and deletes use the control-plane budget; full object transfers
//! use the data-plane budget.

use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::AsyncReadExt;

use super::filter::{FilterSpec, NameFilter};
use super::gateway::BlockingGateway;
use super::manager::ConnectionFingerprint;
use super::path::{PathTranslator, StorageRef};
use super::{BackendBox, ContainerItem, ContainerMetadata, ObjectMetadata, PUBLIC_READ_ACL};
use crate::config::DriverConfig;
use crate::error::{DriverError, Result};
use crate::utils::{file_name, path_without_delimiter, DELIMITER};

/// One adapter per distinct configuration / 每个配置一个适配器实例
pub struct ObjectStorageFileSystem {
    config: DriverConfig,
    fingerprint: ConnectionFingerprint,
    translator: PathTranslator,
    backend: BackendBox,
    gateway: Arc<BlockingGateway>,
}

impl ObjectStorageFileSystem {
    /// Resolve the container URL and initialize container metadata / 连接并初始化容器
    ///
    /// Two control-plane calls plus one metadata read. Callers normally go
    /// through [`super::AdapterRegistry::get_or_create`] instead.
    pub fn connect(config: DriverConfig, backend: BackendBox, gateway: Arc<BlockingGateway>) -> Result<Self> {
        config.validate()?;

        let container_url = {
            let backend = backend.clone();
            let container = config.container_name.clone();
            gateway.control(async move { backend.container_url(&container).await })?
        };

        let translator = PathTranslator::new(&config, &container_url);
        let fingerprint = ConnectionFingerprint::from_config(&config);

        let fs = Self {
            config,
            fingerprint,
            translator,
            backend,
            gateway,
        };
        fs.initialize_container()?;

        tracing::info!(
            "Object storage adapter ready: {} (backend: {}, root: {})",
            fs.fingerprint,
            fs.backend.name(),
            fs.translator.container_root()
        );
        Ok(fs)
    }

    /// Write cache lifetime, CORS origins and read ACL onto the container / 初始化容器元数据
    fn initialize_container(&self) -> Result<()> {
        let container = self.config.container_name.clone();

        let current = {
            let backend = self.backend.clone();
            let container = container.clone();
            self.gateway
                .control(async move { backend.read_container_metadata(&container).await })?
        };

        let mut origins = current.allowed_origins;
        for origin in &self.config.allowed_origins {
            if !origins.contains(origin) {
                origins.push(origin.clone());
            }
        }

        let metadata = ContainerMetadata {
            max_age_seconds: Some(self.config.max_age_seconds()),
            allowed_origins: origins,
            read_acl: if self.config.use_private_container {
                None
            } else {
                Some(PUBLIC_READ_ACL.to_string())
            },
        };

        tracing::debug!("Initializing container {}: {:?}", container, metadata);

        let backend = self.backend.clone();
        self.gateway
            .control(async move { backend.save_container_metadata(&container, &metadata).await })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn fingerprint(&self) -> &ConnectionFingerprint {
        &self.fingerprint
    }

    pub fn translator(&self) -> &PathTranslator {
        &self.translator
    }

    pub fn container_name(&self) -> &str {
        &self.config.container_name
    }

    /// Backend address for any path form / 路径对应的对象地址
    pub fn storage_ref(&self, path: &str) -> StorageRef {
        self.translator.parse_path(path)
    }

    /// Path form that parses back to `(container, key)`
    fn path_for(&self, container: &str, key: &str) -> String {
        if container == self.config.container_name {
            key.to_string()
        } else {
            format!("{}{}{}{}", DELIMITER, container, DELIMITER, key)
        }
    }

    fn list(&self, container: String, filter: FilterSpec) -> Result<Vec<ContainerItem>> {
        let backend = self.backend.clone();
        tracing::debug!("Listing {} with {:?}", container, filter);
        self.gateway
            .control(async move { backend.list_container(&container, &filter).await })
    }

    /// Immediate sub-directories, as keys without trailing `/` / 获取子目录
    pub fn get_directories(&self, path: &str) -> Result<Vec<String>> {
        let target = self.storage_ref(path);
        let items = self.list(target.container, FilterSpec::directories(&target.key))?;

        Ok(items
            .into_iter()
            .filter_map(|item| match item {
                ContainerItem::Directory { name } => Some(path_without_delimiter(&name)),
                ContainerItem::Object { .. } => None,
            })
            .collect())
    }

    /// Delete a directory / 删除目录
    ///
    /// Directories are key prefixes, so a non-recursive delete can only
    /// succeed on an empty (that is, absent) directory.
    pub fn delete_directory(&self, path: &str, recursive: bool) -> Result<()> {
        if !recursive {
            if self.directory_exists(path)? {
                tracing::warn!("Refusing non-recursive delete of non-empty directory: {}", path);
                return Err(DriverError::Conflict(format!(
                    "the directory at path '{}' is not empty",
                    path
                )));
            }
            return Ok(());
        }

        let target = self.storage_ref(path);
        let keys: Vec<String> = self
            .list(target.container.clone(), FilterSpec::recursive(&target.key))?
            .into_iter()
            .filter(ContainerItem::is_object)
            .map(|item| item.name().to_string())
            .collect();

        if keys.is_empty() {
            return Ok(());
        }

        tracing::debug!("Deleting {} objects under {}", keys.len(), target);
        let backend = self.backend.clone();
        let container = target.container;
        self.gateway
            .control(async move { backend.delete_objects(&container, keys).await })
    }

    pub fn directory_exists(&self, path: &str) -> Result<bool> {
        let target = self.storage_ref(path);
        let items = self.list(target.container, FilterSpec::existence_probe(&target.key))?;
        Ok(!items.is_empty())
    }

    /// Store a file / 添加文件
    pub fn add_file(&self, path: &str, data: impl Into<Bytes>, overwrite: bool) -> Result<()> {
        if !overwrite && self.file_exists(path)? {
            tracing::warn!("File already exists, not overwriting: {}", path);
            return Err(DriverError::Conflict(format!(
                "a file at path '{}' already exists",
                path
            )));
        }

        let StorageRef { container, key } = self.storage_ref(path);
        let data = data.into();
        tracing::debug!("Writing {}/{} ({} bytes)", container, key, data.len());

        let backend = self.backend.clone();
        self.gateway
            .data(async move { backend.write_object(&container, &key, data).await })
    }

    /// Files directly inside `path` matching `filter`, in public form / 获取文件列表
    pub fn get_files(&self, path: &str, filter: &str) -> Result<Vec<String>> {
        let target = self.storage_ref(path);
        let names = NameFilter::from_pattern(filter);
        let items = self.list(target.container.clone(), FilterSpec::files(&target.key))?;

        Ok(items
            .into_iter()
            .filter(|item| item.is_object() && names.matches(file_name(item.name())))
            .filter_map(|item| {
                self.translator
                    .get_relative_path(&self.path_for(&target.container, item.name()))
            })
            .collect())
    }

    /// All files in `path` / 获取全部文件
    pub fn get_all_files(&self, path: &str) -> Result<Vec<String>> {
        self.get_files(path, "*.*")
    }

    /// Read a whole object / 读取文件
    pub fn open_file(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let StorageRef { container, key } = self.storage_ref(path);
        let backend = self.backend.clone();

        let data = self.gateway.data(async move {
            let mut reader = backend.read_object(&container, &key).await?;
            let mut buffer = Vec::new();
            reader.read_to_end(&mut buffer).await?;
            Ok::<_, anyhow::Error>(Bytes::from(buffer))
        })?;

        Ok(Box::new(std::io::Cursor::new(data)))
    }

    pub fn delete_file(&self, path: &str) -> Result<()> {
        let StorageRef { container, key } = self.storage_ref(path);
        let backend = self.backend.clone();
        self.gateway
            .control(async move { backend.delete_object(&container, &key).await })
    }

    pub fn file_exists(&self, path: &str) -> Result<bool> {
        let StorageRef { container, key } = self.storage_ref(path);
        let backend = self.backend.clone();
        self.gateway
            .control(async move { backend.object_exists(&container, &key).await })
    }

    fn object_metadata(&self, path: &str) -> Result<ObjectMetadata> {
        let StorageRef { container, key } = self.storage_ref(path);
        let backend = self.backend.clone();
        self.gateway
            .control(async move { backend.read_object_metadata(&container, &key).await })
    }

    /// Last modification time, the Unix epoch when unknown / 最后修改时间
    pub fn get_last_modified(&self, path: &str) -> Result<DateTime<Utc>> {
        Ok(self.object_metadata(path)?.last_modified.unwrap_or_default())
    }

    /// Creation time, the Unix epoch when unknown / 创建时间
    pub fn get_created(&self, path: &str) -> Result<DateTime<Utc>> {
        Ok(self.object_metadata(path)?.created.unwrap_or_default())
    }

    pub fn get_relative_path(&self, full_path_or_url: &str) -> Option<String> {
        self.translator.get_relative_path(full_path_or_url)
    }

    pub fn get_full_path(&self, path: &str) -> Option<String> {
        self.translator.get_full_path(path)
    }

    pub fn get_url(&self, path: &str) -> Option<String> {
        self.translator.get_url(path)
    }
}

impl std::fmt::Debug for ObjectStorageFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorageFileSystem")
            .field("fingerprint", &self.fingerprint)
            .field("backend", &self.backend.name())
            .field("container_root", &self.translator.container_root())
            .finish()
    }
}
