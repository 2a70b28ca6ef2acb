//! Swift / Keystone wire types and header helpers / 协议类型与头部解析

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use serde::Deserialize;

use crate::storage::{ContainerItem, ContainerMetadata, FilterSpec, ObjectMetadata};

pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
pub const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";
pub const LAST_MODIFIED_HEADER: &str = "Last-Modified";
pub const MAX_AGE_HEADER: &str = "X-Container-Meta-Access-Control-Max-Age";
pub const ALLOW_ORIGIN_HEADER: &str = "X-Container-Meta-Access-Control-Allow-Origin";
pub const CONTAINER_READ_HEADER: &str = "X-Container-Read";
pub const REMOVE_CONTAINER_READ_HEADER: &str = "X-Remove-Container-Read";

/// Catalog service type of Swift
pub const OBJECT_STORE_SERVICE: &str = "object-store";

/// Swift's per-request listing cap / 单次列表上限
pub const LISTING_PAGE_SIZE: usize = 10_000;

/// Keystone v3 token response / Token响应
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub token: TokenBody,
}

#[derive(Debug, Deserialize)]
pub struct TokenBody {
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogEndpoint {
    pub interface: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub region_id: Option<String>,
    pub url: String,
}

/// Public object-store endpoint for `region`; any region when it is empty / 选择存储端点
pub fn select_storage_endpoint(catalog: &[CatalogEntry], region: &str) -> Option<String> {
    catalog
        .iter()
        .filter(|entry| entry.service_type == OBJECT_STORE_SERVICE)
        .flat_map(|entry| entry.endpoints.iter())
        .filter(|endpoint| endpoint.interface == "public")
        .find(|endpoint| {
            region.is_empty()
                || endpoint.region.as_deref() == Some(region)
                || endpoint.region_id.as_deref() == Some(region)
        })
        .map(|endpoint| endpoint.url.trim_end_matches('/').to_string())
}

/// One entry of a JSON container listing / 列表条目
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListingEntry {
    Subdir {
        subdir: String,
    },
    Object {
        name: String,
        #[serde(default)]
        bytes: u64,
    },
}

impl ListingEntry {
    /// Marker for the next page
    pub fn marker(&self) -> &str {
        match self {
            ListingEntry::Subdir { subdir } => subdir,
            ListingEntry::Object { name, .. } => name,
        }
    }
}

impl From<ListingEntry> for ContainerItem {
    fn from(entry: ListingEntry) -> Self {
        match entry {
            ListingEntry::Subdir { subdir } => ContainerItem::Directory { name: subdir },
            ListingEntry::Object { name, bytes } => ContainerItem::Object { name, size: bytes },
        }
    }
}

/// Bulk delete response (`?bulk-delete`) / 批量删除响应
#[derive(Debug, Deserialize)]
pub struct BulkDeleteResponse {
    #[serde(rename = "Response Status", default)]
    pub response_status: String,
    #[serde(rename = "Number Deleted", default)]
    pub number_deleted: u64,
    #[serde(rename = "Number Not Found", default)]
    pub number_not_found: u64,
    #[serde(rename = "Errors", default)]
    pub errors: Vec<Vec<String>>,
}

/// Query parameters for one listing page / 列表查询参数
pub fn listing_query(filter: &FilterSpec, limit: usize, marker: Option<&str>) -> Vec<(&'static str, String)> {
    let mut query = vec![("format", "json".to_string()), ("limit", limit.to_string())];

    if let Some(path) = filter.exact_path.as_deref() {
        query.push(("path", path.to_string()));
    }
    if let Some(prefix) = filter.path_prefix.as_deref().filter(|p| !p.is_empty()) {
        query.push(("prefix", prefix.to_string()));
    }
    if filter.require_delimiter_boundary {
        query.push(("delimiter", "/".to_string()));
    }
    if let Some(marker) = marker {
        query.push(("marker", marker.to_string()));
    }
    query
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// `X-Timestamp` is fractional Unix seconds: "1441234567.12345"
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let (secs, fraction) = raw.trim().split_once('.').unwrap_or((raw.trim(), ""));
    let secs: i64 = secs.parse().ok()?;
    let nanos = if fraction.is_empty() {
        0
    } else {
        let digits: String = fraction.chars().take(9).collect();
        let scale = 10u32.pow(9 - digits.len() as u32);
        digits.parse::<u32>().ok()? * scale
    };
    Utc.timestamp_opt(secs, nanos).single()
}

/// HTTP date as sent in `Last-Modified`
pub fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

pub fn object_metadata_from_headers(headers: &HeaderMap) -> ObjectMetadata {
    ObjectMetadata {
        created: header_str(headers, TIMESTAMP_HEADER).and_then(parse_timestamp),
        last_modified: header_str(headers, LAST_MODIFIED_HEADER).and_then(parse_http_date),
    }
}

pub fn container_metadata_from_headers(headers: &HeaderMap) -> ContainerMetadata {
    ContainerMetadata {
        max_age_seconds: header_str(headers, MAX_AGE_HEADER).and_then(|v| v.trim().parse().ok()),
        allowed_origins: header_str(headers, ALLOW_ORIGIN_HEADER)
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
        read_acl: header_str(headers, CONTAINER_READ_HEADER)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string),
    }
}

/// Headers that write `metadata` onto a container / 容器元数据请求头
pub fn container_metadata_headers(metadata: &ContainerMetadata) -> Vec<(&'static str, String)> {
    let mut headers = Vec::new();
    if let Some(max_age) = metadata.max_age_seconds {
        headers.push((MAX_AGE_HEADER, max_age.to_string()));
    }
    headers.push((ALLOW_ORIGIN_HEADER, metadata.allowed_origins.join(" ")));
    match metadata.read_acl.as_deref() {
        Some(acl) => headers.push((CONTAINER_READ_HEADER, acl.to_string())),
        None => headers.push((REMOVE_CONTAINER_READ_HEADER, "x".to_string())),
    }
    headers
}

/// Percent-encode each key segment, keeping `/` / 编码对象路径
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, HeaderValue};

    fn name(raw: &str) -> HeaderName {
        HeaderName::from_bytes(raw.as_bytes()).unwrap()
    }

    #[test]
    fn test_select_endpoint_by_region() {
        let body: TokenResponse = serde_json::from_value(serde_json::json!({
            "token": {
                "expires_at": "2030-01-01T00:00:00.000000Z",
                "catalog": [
                    {"type": "identity", "endpoints": [
                        {"interface": "public", "region": "GRA", "url": "https://auth.example/v3"}
                    ]},
                    {"type": "object-store", "endpoints": [
                        {"interface": "internal", "region": "GRA", "url": "http://10.0.0.1/v1/AUTH_p"},
                        {"interface": "public", "region": "GRA", "url": "https://storage.gra.example/v1/AUTH_p"},
                        {"interface": "public", "region": "SBG", "url": "https://storage.sbg.example/v1/AUTH_p/"}
                    ]}
                ]
            }
        }))
        .unwrap();

        let catalog = &body.token.catalog;
        assert_eq!(
            select_storage_endpoint(catalog, "SBG").as_deref(),
            Some("https://storage.sbg.example/v1/AUTH_p")
        );
        assert_eq!(
            select_storage_endpoint(catalog, "").as_deref(),
            Some("https://storage.gra.example/v1/AUTH_p")
        );
        assert!(select_storage_endpoint(catalog, "BHS").is_none());
        assert!(body.token.expires_at.is_some());
    }

    #[test]
    fn test_listing_entries() {
        let entries: Vec<ListingEntry> = serde_json::from_str(
            r#"[{"subdir": "1001/"}, {"name": "1001.jpg", "bytes": 12, "hash": "x", "last_modified": "2020-01-01T00:00:00.000000"}]"#,
        )
        .unwrap();
        let items: Vec<ContainerItem> = entries.into_iter().map(Into::into).collect();
        assert_eq!(
            items,
            vec![
                ContainerItem::Directory { name: "1001/".to_string() },
                ContainerItem::Object { name: "1001.jpg".to_string(), size: 12 },
            ]
        );
    }

    #[test]
    fn test_listing_query() {
        let query = listing_query(&FilterSpec::directories("1001"), 100, Some("1001/a.jpg"));
        assert!(query.contains(&("prefix", "1001/".to_string())));
        assert!(query.contains(&("delimiter", "/".to_string())));
        assert!(query.contains(&("marker", "1001/a.jpg".to_string())));

        let query = listing_query(&FilterSpec::files("1001/"), 10, None);
        assert!(query.contains(&("path", "1001".to_string())));
        assert!(!query.iter().any(|(k, _)| *k == "prefix"));
    }

    #[test]
    fn test_timestamps() {
        let created = parse_timestamp("1441234567.5").unwrap();
        assert_eq!(created.timestamp(), 1441234567);
        assert_eq!(created.timestamp_subsec_millis(), 500);
        assert_eq!(parse_timestamp("1441234567").unwrap().timestamp(), 1441234567);
        assert!(parse_timestamp("soon").is_none());

        let modified = parse_http_date("Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        assert_eq!(modified.to_rfc3339(), "2015-10-21T07:28:00+00:00");
    }

    #[test]
    fn test_container_metadata_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(name(MAX_AGE_HEADER), HeaderValue::from_static("86400"));
        headers.insert(name(ALLOW_ORIGIN_HEADER), HeaderValue::from_static("https://a.example https://b.example"));
        let metadata = container_metadata_from_headers(&headers);
        assert_eq!(metadata.max_age_seconds, Some(86400));
        assert_eq!(metadata.allowed_origins.len(), 2);
        assert_eq!(metadata.read_acl, None);

        let written = container_metadata_headers(&metadata);
        assert!(written.contains(&(REMOVE_CONTAINER_READ_HEADER, "x".to_string())));
        assert!(written.contains(&(ALLOW_ORIGIN_HEADER, "https://a.example https://b.example".to_string())));
    }

    #[test]
    fn test_encode_key() {
        assert_eq!(encode_key("1001/my photo.jpg"), "1001/my%20photo.jpg");
        assert_eq!(encode_key("a/b#c"), "a/b%23c");
    }
}
