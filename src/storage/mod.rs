use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::credential::Credential;

pub mod adapter;
pub mod filter;
pub mod gateway;
pub mod manager;
pub mod path;

pub use adapter::ObjectStorageFileSystem;
pub use filter::{FilterSpec, NameFilter};
pub use gateway::{BlockingGateway, TimeoutClass, Timeouts};
pub use manager::{AdapterRegistry, ConnectionFingerprint};
pub use path::{PathTranslator, StorageRef};

/// Object reader returned by the backend / 对象读取流
pub type ObjectReader = Box<dyn AsyncRead + Unpin + Send>;

/// Listing item / 列表条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerItem {
    /// Stored object, full key / 对象（完整键）
    Object { name: String, size: u64 },
    /// Pseudo-directory produced by delimiter listing, ends with `/` / 伪目录
    Directory { name: String },
}

impl ContainerItem {
    pub fn name(&self) -> &str {
        match self {
            ContainerItem::Object { name, .. } | ContainerItem::Directory { name } => name,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, ContainerItem::Object { .. })
    }
}

/// Object timestamps / 对象时间信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub created: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Container-level policy metadata / 容器元数据
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerMetadata {
    /// Browser cache / CORS max age in seconds / 缓存时长（秒）
    pub max_age_seconds: Option<u64>,
    /// CORS allowed origins / 允许的跨域来源
    pub allowed_origins: Vec<String>,
    /// Read ACL, `None` keeps the container private / 读权限
    pub read_acl: Option<String>,
}

/// Read ACL applied to public containers
pub const PUBLIC_READ_ACL: &str = ".r:*,.rlistings";

/// Object storage backend capability interface / 对象存储后端接口
///
/// Every call is independent; the adapter adds no ordering between calls.
#[async_trait]
pub trait ObjectStorageBackend: Send + Sync {
    /// Backend name / 后端名称
    fn name(&self) -> &str;

    /// Absolute URL of the container / 容器根地址
    async fn container_url(&self, container: &str) -> Result<String>;

    /// List container contents under the filter / 列出容器内容
    async fn list_container(&self, container: &str, filter: &FilterSpec) -> Result<Vec<ContainerItem>>;

    async fn object_exists(&self, container: &str, key: &str) -> Result<bool>;

    /// Open object for reading / 读取对象
    async fn read_object(&self, container: &str, key: &str) -> Result<ObjectReader>;

    /// Create or replace an object unconditionally / 写入对象（覆盖）
    async fn write_object(&self, container: &str, key: &str, data: Bytes) -> Result<()>;

    async fn delete_object(&self, container: &str, key: &str) -> Result<()>;

    /// Batch delete; atomic only if the backend makes it so / 批量删除
    async fn delete_objects(&self, container: &str, keys: Vec<String>) -> Result<()>;

    /// Timestamps, empty when the object is missing / 对象元数据
    async fn read_object_metadata(&self, container: &str, key: &str) -> Result<ObjectMetadata>;

    async fn read_container_metadata(&self, container: &str) -> Result<ContainerMetadata>;

    async fn save_container_metadata(&self, container: &str, metadata: &ContainerMetadata) -> Result<()>;
}

pub type BackendBox = Arc<dyn ObjectStorageBackend>;

/// Backend factory, the registry's construction/teardown hooks / 后端工厂
pub trait BackendFactory: Send + Sync {
    /// Backend type name / 后端类型名称
    fn backend_type(&self) -> &'static str;

    /// Build a client for the decoded credential / 创建后端实例
    fn create_backend(&self, credential: &Credential) -> crate::error::Result<BackendBox>;

    /// Called once per cached adapter when the registry is cleared / 释放钩子
    fn release(&self, adapter: &ObjectStorageFileSystem) {
        let _ = adapter;
    }
}
