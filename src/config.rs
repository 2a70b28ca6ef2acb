//! Adapter configuration module / 适配器配置模块
//!
//! `DriverConfig` is supplied once per adapter and never changes afterwards.
//! It can be deserialized from JSON (driver config value) or read from the
//! host's flat `ObjectStorageBlobFileSystem.*` settings.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DriverError, Result};

/// Default alias segment for public media paths / 默认媒体路由
pub const DEFAULT_MEDIA_ROUTE: &str = "media";

/// Default browser cache lifetime in days / 默认浏览器缓存天数
pub const DEFAULT_MAX_DAYS: i64 = 365;

/// Control-plane wait budget (existence, metadata, listing, delete) / 控制面超时
pub const CONTROL_PLANE_TIMEOUT: Duration = Duration::from_secs(20);

/// Data-plane wait budget (full object transfers) / 数据面超时
pub const DATA_PLANE_TIMEOUT: Duration = Duration::from_secs(24 * 3600);

/// Host setting keys / 宿主配置键
pub mod keys {
    pub const CONTAINER_NAME: &str = "ObjectStorageBlobFileSystem.ContainerName";
    pub const ROOT_URL: &str = "ObjectStorageBlobFileSystem.RootUrl";
    pub const CONNECTION_STRING: &str = "ObjectStorageBlobFileSystem.ConnectionString";
    pub const MAX_DAYS: &str = "ObjectStorageBlobFileSystem.MaxDays";
    pub const USE_DEFAULT_ROUTE: &str = "ObjectStorageBlobFileSystem.UseDefaultRoute";
    pub const VIRTUAL_PATH_ROUTE: &str = "ObjectStorageBlobFileSystem.VirtualPathRoute";
    pub const USE_PRIVATE_CONTAINER: &str = "ObjectStorageBlobFileSystem.UsePrivateContainer";
    pub const ROUTING_MODE: &str = "ObjectStorageBlobFileSystem.RoutingMode";
    pub const ALLOWED_ORIGINS: &str = "ObjectStorageBlobFileSystem.AllowedOrigins";
}

/// How public paths carry the container / 路由模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// Single container, optional alias segment (`/media/...`).
    #[default]
    AliasRoute,
    /// Legacy multi-tenant layout: the container is the first path segment.
    EmbeddedContainer,
}

impl RoutingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingMode::AliasRoute => "alias_route",
            RoutingMode::EmbeddedContainer => "embedded_container",
        }
    }
}

impl std::str::FromStr for RoutingMode {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "alias_route" | "aliasroute" | "alias" => Ok(RoutingMode::AliasRoute),
            "embedded_container" | "embeddedcontainer" | "embedded" => {
                Ok(RoutingMode::EmbeddedContainer)
            }
            other => Err(DriverError::InvalidConfiguration(format!(
                "unknown routing mode: {}",
                other
            ))),
        }
    }
}

/// Object storage adapter configuration / 对象存储适配器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Container name / 容器名称
    pub container_name: String,
    /// Public host root (CDN or site), optional / 公共访问根地址
    #[serde(default)]
    pub root_url: Option<String>,
    /// Encoded credential attribute string / 连接字符串
    pub connection_string: String,
    /// Cache lifetime in days, negative means default / 缓存天数
    #[serde(default = "default_max_days")]
    pub max_days: i64,
    #[serde(default)]
    pub routing_mode: RoutingMode,
    /// Alias segment; `None` or empty disables alias routing / 路由别名
    #[serde(default = "default_route_alias")]
    pub route_alias: Option<String>,
    #[serde(default = "default_use_private_container")]
    pub use_private_container: bool,
    /// Extra CORS origins merged into the container metadata / 额外跨域来源
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_max_days() -> i64 {
    DEFAULT_MAX_DAYS
}

fn default_route_alias() -> Option<String> {
    Some(DEFAULT_MEDIA_ROUTE.to_string())
}

fn default_use_private_container() -> bool {
    true
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            container_name: String::new(),
            root_url: None,
            connection_string: String::new(),
            max_days: default_max_days(),
            routing_mode: RoutingMode::default(),
            route_alias: default_route_alias(),
            use_private_container: default_use_private_container(),
            allowed_origins: Vec::new(),
        }
    }
}

impl DriverConfig {
    pub fn new(container_name: impl Into<String>, connection_string: impl Into<String>) -> Self {
        Self {
            container_name: container_name.into(),
            connection_string: connection_string.into(),
            ..Default::default()
        }
    }

    pub fn with_root_url(mut self, root_url: impl Into<String>) -> Self {
        self.root_url = Some(root_url.into());
        self
    }

    pub fn with_routing_mode(mut self, mode: RoutingMode) -> Self {
        self.routing_mode = mode;
        self
    }

    pub fn with_route_alias(mut self, alias: Option<&str>) -> Self {
        self.route_alias = alias.map(str::to_string);
        self
    }

    pub fn with_max_days(mut self, max_days: i64) -> Self {
        self.max_days = max_days;
        self
    }

    pub fn with_private_container(mut self, private: bool) -> Self {
        self.use_private_container = private;
        self
    }

    /// Parse a JSON driver config value / 解析 JSON 配置
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| DriverError::InvalidConfiguration(format!("config parse failed: {}", e)))
    }

    /// Read from flat host settings / 从宿主配置读取
    ///
    /// `UseDefaultRoute=false` disables alias routing unless `VirtualPathRoute`
    /// names an explicit alias.
    pub fn from_settings(settings: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| settings.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let mut config = DriverConfig::new(
            get(keys::CONTAINER_NAME).unwrap_or_default(),
            get(keys::CONNECTION_STRING).unwrap_or_default(),
        );
        config.root_url = get(keys::ROOT_URL).map(str::to_string);

        if let Some(raw) = get(keys::MAX_DAYS) {
            config.max_days = raw.parse().map_err(|_| {
                DriverError::InvalidConfiguration(format!("MaxDays is not a number: {}", raw))
            })?;
        }

        let use_default_route = get(keys::USE_DEFAULT_ROUTE).map(parse_bool).unwrap_or(true);
        config.route_alias = match get(keys::VIRTUAL_PATH_ROUTE) {
            Some(alias) => Some(alias.trim_matches('/').to_string()),
            None if use_default_route => default_route_alias(),
            None => None,
        };

        if let Some(raw) = get(keys::USE_PRIVATE_CONTAINER) {
            config.use_private_container = parse_bool(raw);
        }
        if let Some(raw) = get(keys::ROUTING_MODE) {
            config.routing_mode = raw.parse()?;
        }
        if let Some(raw) = get(keys::ALLOWED_ORIGINS) {
            config.allowed_origins = raw
                .split([',', ' '])
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(config)
    }

    /// Fail fast on blank required fields, before any network call / 校验必填项
    pub fn validate(&self) -> Result<()> {
        if self.container_name.trim().is_empty() {
            return Err(DriverError::InvalidConfiguration(
                "container name must not be blank".to_string(),
            ));
        }
        if self.connection_string.trim().is_empty() {
            return Err(DriverError::InvalidConfiguration(
                "connection string must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    /// Alias segment when alias routing is enabled / 启用时的路由别名
    pub fn alias(&self) -> Option<&str> {
        self.route_alias
            .as_deref()
            .map(|a| a.trim_matches('/'))
            .filter(|a| !a.is_empty())
    }

    /// `max_days` with the negative-means-default rule applied
    pub fn effective_max_days(&self) -> u64 {
        if self.max_days < 0 {
            DEFAULT_MAX_DAYS as u64
        } else {
            self.max_days as u64
        }
    }

    /// Cache lifetime in seconds, saturating for huge `max_days` / 缓存秒数
    pub fn max_age_seconds(&self) -> u64 {
        self.effective_max_days().saturating_mul(24 * 3600)
    }

    /// Configured host root, `None` when blank
    pub fn host_root(&self) -> Option<&str> {
        self.root_url.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_json() {
        let config = DriverConfig::from_value(serde_json::json!({
            "container_name": "media",
            "connection_string": "urlBase=https://auth.example/v3",
        }))
        .unwrap();
        assert_eq!(config.max_days, 365);
        assert_eq!(config.alias(), Some("media"));
        assert!(config.use_private_container);
        assert_eq!(config.routing_mode, RoutingMode::AliasRoute);
        assert!(config.root_url.is_none());
    }

    #[test]
    fn test_from_settings() {
        let settings: HashMap<String, String> = [
            (keys::CONTAINER_NAME, "assets"),
            (keys::CONNECTION_STRING, "username=u;password=p"),
            (keys::ROOT_URL, "https://cdn.example.com"),
            (keys::MAX_DAYS, "-1"),
            (keys::USE_DEFAULT_ROUTE, "False"),
            (keys::USE_PRIVATE_CONTAINER, "false"),
            (keys::ROUTING_MODE, "EmbeddedContainer"),
            (keys::ALLOWED_ORIGINS, "https://a.example, https://b.example"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = DriverConfig::from_settings(&settings).unwrap();
        assert_eq!(config.container_name, "assets");
        assert_eq!(config.host_root(), Some("https://cdn.example.com"));
        assert_eq!(config.effective_max_days(), 365);
        assert_eq!(config.alias(), None);
        assert!(!config.use_private_container);
        assert_eq!(config.routing_mode, RoutingMode::EmbeddedContainer);
        assert_eq!(config.allowed_origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        assert!(matches!(
            DriverConfig::new("  ", "x=y").validate(),
            Err(DriverError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            DriverConfig::new("media", "").validate(),
            Err(DriverError::InvalidConfiguration(_))
        ));
        assert!(DriverConfig::new("media", "x=y").validate().is_ok());
    }

    #[test]
    fn test_empty_alias_disables_routing() {
        let config = DriverConfig::new("media", "x=y").with_route_alias(Some("/"));
        assert_eq!(config.alias(), None);
        let config = DriverConfig::new("media", "x=y").with_route_alias(Some("/files/"));
        assert_eq!(config.alias(), Some("files"));
    }
}
