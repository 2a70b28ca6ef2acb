//! Path translation between public paths, absolute URLs and object keys
//! 路径转换：公共路径 / 绝对地址 / 对象键
//!
//! Three roots are known once the container URL is resolved, all ending in `/`:
//!
//! - host root: the configured `root_url` (CDN or site), optional
//! - container root: `https://swift.example/v1/AUTH_p/media/`
//! - project root: `https://swift.example/v1/AUTH_p/`

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{DriverConfig, RoutingMode};
use crate::utils::{is_absolute_uri, normalize_separators, with_trailing_slash, DELIMITER};

/// Minimum leading digits of the first key component in embedded-container paths
pub const DATE_BUCKET_MIN_DIGITS: usize = 4;

/// Backend address of one object / 对象地址
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageRef {
    pub container: String,
    pub key: String,
}

impl fmt::Display for StorageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.key)
    }
}

/// Bidirectional path mapper for one adapter / 路径转换器
#[derive(Debug, Clone)]
pub struct PathTranslator {
    mode: RoutingMode,
    container: String,
    alias: Option<String>,
    host_root: Option<String>,
    container_root: String,
    project_root: String,
}

impl PathTranslator {
    /// Build from the adapter config and the resolved container URL
    pub fn new(config: &DriverConfig, container_url: &str) -> Self {
        let container_root = with_trailing_slash(container_url);
        let project_root = project_root_of(&container_root, &config.container_name);

        Self {
            mode: config.routing_mode,
            container: config.container_name.clone(),
            alias: config.alias().map(str::to_string),
            host_root: config.host_root().map(with_trailing_slash),
            container_root,
            project_root,
        }
    }

    pub fn routing_mode(&self) -> RoutingMode {
        self.mode
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn host_root(&self) -> Option<&str> {
        self.host_root.as_deref()
    }

    pub fn container_root(&self) -> &str {
        &self.container_root
    }

    pub fn project_root(&self) -> &str {
        &self.project_root
    }

    /// Root used for absolute URLs of the own container / 对外根地址
    fn public_root(&self) -> &str {
        self.host_root.as_deref().unwrap_or(&self.container_root)
    }

    /// Map any path form to its backend address / 解析为对象地址
    pub fn parse_path(&self, raw: &str) -> StorageRef {
        match self.mode {
            RoutingMode::AliasRoute => StorageRef {
                container: self.container.clone(),
                key: self.parse_alias_route(raw),
            },
            RoutingMode::EmbeddedContainer => self.parse_embedded(raw),
        }
    }

    /// Object key only / 仅返回对象键
    pub fn relative_key(&self, raw: &str) -> String {
        self.parse_path(raw).key
    }

    fn parse_alias_route(&self, raw: &str) -> String {
        let path = normalize_separators(raw);

        let rest = if let Some(rest) = self.host_root.as_deref().and_then(|h| path.strip_prefix(h)) {
            rest
        } else if let Some(rest) = path.strip_prefix(self.container_root.as_str()) {
            rest
        } else if let Some(alias) = self.alias.as_deref() {
            strip_alias_folder(&path, alias).unwrap_or(path.as_str())
        } else {
            path.as_str()
        };

        rest.trim_start_matches(DELIMITER).to_string()
    }

    fn parse_embedded(&self, raw: &str) -> StorageRef {
        let path = normalize_separators(raw);

        // The boundary `/` stays with the remainder: "https://h/x" -> "/x".
        let rest = if let Some(rest) = self.host_root.as_deref().and_then(|h| strip_root(&path, h)) {
            rest
        } else if let Some(rest) = strip_root(&path, &self.container_root) {
            // own container URL: the remainder is the key as-is
            return StorageRef {
                container: self.container.clone(),
                key: rest.trim_start_matches(DELIMITER).to_string(),
            };
        } else if let Some(rest) = strip_root(&path, &self.project_root) {
            rest
        } else {
            path.as_str()
        };

        match split_container_segment(rest) {
            Some((segment, key)) => {
                let container = if self.alias.as_deref() == Some(segment) {
                    self.container.clone()
                } else {
                    segment.to_string()
                };
                StorageRef {
                    container,
                    key: key.to_string(),
                }
            }
            None => StorageRef {
                container: self.container.clone(),
                key: rest.trim_start_matches(DELIMITER).to_string(),
            },
        }
    }

    /// Resolve a path to an absolute URL or to its public form / 生成地址
    ///
    /// Returns `None` when `path` is an absolute URI outside every known root:
    /// the object does not belong to this adapter.
    pub fn resolve_url(&self, path: &str, absolute: bool) -> Option<String> {
        let target = self.parse_path(path);

        if absolute {
            if target.key.is_empty() {
                return Some(self.public_root().to_string());
            }
            if is_absolute_uri(&target.key) {
                return None;
            }
            if target.container == self.container {
                Some(format!("{}{}", self.public_root(), target.key))
            } else {
                Some(format!(
                    "{}{}{}{}",
                    self.project_root, target.container, DELIMITER, target.key
                ))
            }
        } else {
            match self.mode {
                RoutingMode::AliasRoute => match self.alias.as_deref() {
                    None => Some(target.key),
                    Some(alias) => Some(public_path(alias, &target.key)),
                },
                RoutingMode::EmbeddedContainer => {
                    let head = if target.container == self.container {
                        self.alias.as_deref().unwrap_or(&self.container)
                    } else {
                        target.container.as_str()
                    };
                    Some(public_path(head, &target.key))
                }
            }
        }
    }

    /// Public (virtual) form / 公共路径
    pub fn get_relative_path(&self, full_path_or_url: &str) -> Option<String> {
        self.resolve_url(full_path_or_url, false)
    }

    /// Absolute URL form / 绝对地址
    pub fn get_full_path(&self, path: &str) -> Option<String> {
        self.resolve_url(path, true)
    }

    /// URL handed to clients: the public path when alias routing is on
    pub fn get_url(&self, path: &str) -> Option<String> {
        self.resolve_url(path, self.alias.is_none())
    }
}

fn public_path(head: &str, key: &str) -> String {
    if key.is_empty() {
        format!("{}{}", DELIMITER, head)
    } else {
        format!("{}{}{}{}", DELIMITER, head, DELIMITER, key)
    }
}

/// "/media/a.jpg" -> "a.jpg", "/media" -> ""
fn strip_alias_folder<'a>(path: &'a str, alias: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(DELIMITER)?.strip_prefix(alias)?;
    if rest.is_empty() || rest.starts_with(DELIMITER) {
        Some(rest)
    } else {
        None
    }
}

/// Strip a `/`-terminated root, leaving the boundary `/` on the remainder
fn strip_root<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    let bare = root.strip_suffix(DELIMITER).unwrap_or(root);
    let rest = path.strip_prefix(bare)?;
    if rest.is_empty() || rest.starts_with(DELIMITER) {
        Some(rest)
    } else {
        None
    }
}

fn project_root_of(container_root: &str, container: &str) -> String {
    let suffix = format!("{}{}", container, DELIMITER);
    if let Some(root) = container_root.strip_suffix(suffix.as_str()) {
        return root.to_string();
    }
    // encoded container names: drop the last segment instead
    let trimmed = container_root.trim_end_matches(DELIMITER);
    match trimmed.rsplit_once(DELIMITER) {
        Some((root, _)) => with_trailing_slash(root),
        None => container_root.to_string(),
    }
}

fn is_container_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

/// Split `/<container>/<digits...>/...` into `(container, key)` / 解析容器段
///
/// The key's first component must start with at least
/// [`DATE_BUCKET_MIN_DIGITS`] digits; this is what tells managed content
/// (`/media/1001/a.jpg`) apart from an unrelated first segment (`/css/site.css`).
pub fn split_container_segment(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.strip_prefix(DELIMITER).unwrap_or(path);
    let (segment, key) = trimmed.split_once(DELIMITER)?;

    if segment.is_empty() || !segment.chars().all(is_container_char) {
        return None;
    }

    let digits = key.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits < DATE_BUCKET_MIN_DIGITS {
        return None;
    }

    Some((segment, key))
}
