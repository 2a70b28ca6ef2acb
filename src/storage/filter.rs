//! Listing filters / 列表过滤
//!
//! `FilterSpec` is what the backend understands (prefix, delimiter, limit,
//! exact pseudo-directory). `NameFilter` is the client-side half: a file name
//! pattern where `*` is the only wildcard.

use serde::{Deserialize, Serialize};

use crate::utils::{path_with_delimiter, path_without_delimiter};

/// Backend-native listing constraints / 后端列表条件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Only keys starting with this prefix / 前缀
    pub path_prefix: Option<String>,
    /// Roll keys up at the next `/` after the prefix / 按分隔符聚合
    pub require_delimiter_boundary: bool,
    /// Maximum number of items / 数量上限
    pub take_limit: Option<usize>,
    /// Only objects directly inside this pseudo-directory / 精确目录
    pub exact_path: Option<String>,
}

impl FilterSpec {
    /// Immediate sub-directories of `key` / 子目录列表
    pub fn directories(key: &str) -> Self {
        Self {
            path_prefix: Some(path_with_delimiter(key)),
            require_delimiter_boundary: true,
            ..Default::default()
        }
    }

    /// Anything under `key/`, first item only / 目录存在探测
    pub fn existence_probe(key: &str) -> Self {
        Self {
            path_prefix: Some(path_with_delimiter(key)),
            take_limit: Some(1),
            ..Default::default()
        }
    }

    /// Every object under `key/`, recursively / 递归枚举
    pub fn recursive(key: &str) -> Self {
        Self {
            path_prefix: Some(path_with_delimiter(key)),
            ..Default::default()
        }
    }

    /// Objects directly inside `key` / 目录内文件
    pub fn files(key: &str) -> Self {
        Self {
            exact_path: Some(path_without_delimiter(key)),
            ..Default::default()
        }
    }
}

/// File name filter / 文件名过滤
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFilter {
    pub prefix: String,
    pub suffix: String,
}

impl NameFilter {
    /// Translate a wildcard pattern / 解析通配模式
    ///
    /// Only the first interior `*` is a wildcard; later ones are literal
    /// characters of the suffix.
    pub fn from_pattern(pattern: &str) -> Self {
        if pattern.is_empty() || pattern == "*" || pattern == "*.*" {
            return Self::default();
        }

        if pattern.starts_with('*') {
            return Self {
                prefix: String::new(),
                suffix: pattern.trim_start_matches('*').to_string(),
            };
        }

        if pattern.ends_with('*') {
            return Self {
                prefix: pattern.trim_end_matches('*').to_string(),
                suffix: String::new(),
            };
        }

        match pattern.find('*') {
            Some(pos) => Self {
                prefix: pattern[..pos].to_string(),
                suffix: pattern[pos..].trim_start_matches('*').to_string(),
            },
            None => Self {
                prefix: pattern.to_string(),
                suffix: String::new(),
            },
        }
    }

    /// No filename filtering at all
    pub fn is_unrestricted(&self) -> bool {
        self.prefix.is_empty() && self.suffix.is_empty()
    }

    pub fn matches(&self, name: &str) -> bool {
        (self.prefix.is_empty() || name.starts_with(&self.prefix))
            && (self.suffix.is_empty() || name.ends_with(&self.suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(prefix: &str, suffix: &str) -> NameFilter {
        NameFilter {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        }
    }

    #[test]
    fn test_translation_table() {
        assert!(NameFilter::from_pattern("").is_unrestricted());
        assert!(NameFilter::from_pattern("*").is_unrestricted());
        assert!(NameFilter::from_pattern("*.*").is_unrestricted());
        assert_eq!(NameFilter::from_pattern("*.jpg"), filter("", ".jpg"));
        assert_eq!(NameFilter::from_pattern("logo*"), filter("logo", ""));
        assert_eq!(NameFilter::from_pattern("thumb*.png"), filter("thumb", ".png"));
        assert_eq!(NameFilter::from_pattern("banner"), filter("banner", ""));
    }

    #[test]
    fn test_first_interior_wildcard_only() {
        let f = NameFilter::from_pattern("a*b*c");
        assert_eq!(f, filter("a", "b*c"));
        assert!(f.matches("a-b*c"));
        assert!(!f.matches("axbyc"));
    }

    #[test]
    fn test_leading_wildcard_wins_over_trailing() {
        assert_eq!(NameFilter::from_pattern("*logo*"), filter("", "logo*"));
        assert_eq!(NameFilter::from_pattern("**.gif"), filter("", ".gif"));
    }

    #[test]
    fn test_matching() {
        let f = NameFilter::from_pattern("*.jpg");
        assert!(f.matches("photo.jpg"));
        assert!(!f.matches("photo.png"));

        // no `*` means prefix semantics, not exact name
        let f = NameFilter::from_pattern("logo");
        assert!(f.matches("logo.png"));
        assert!(f.matches("logo"));
        assert!(!f.matches("mylogo"));

        assert!(NameFilter::from_pattern("*.*").matches("README"));
    }

    #[test]
    fn test_filter_specs() {
        let spec = FilterSpec::directories("1001");
        assert_eq!(spec.path_prefix.as_deref(), Some("1001/"));
        assert!(spec.require_delimiter_boundary);

        let spec = FilterSpec::directories("");
        assert_eq!(spec.path_prefix.as_deref(), Some(""));

        let spec = FilterSpec::existence_probe("1001/");
        assert_eq!(spec.path_prefix.as_deref(), Some("1001/"));
        assert_eq!(spec.take_limit, Some(1));

        let spec = FilterSpec::files("1001/");
        assert_eq!(spec.exact_path.as_deref(), Some("1001"));
        assert!(spec.path_prefix.is_none());
    }
}
