/// Path processing utility functions / 路径处理工具函数

/// Object key separator / 对象键分隔符
pub const DELIMITER: char = '/';

/// Replace backslashes with forward slashes / 将反斜杠替换为正斜杠
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Key without trailing delimiter / 去掉末尾分隔符
/// "a/b/" -> "a/b"
pub fn path_without_delimiter(path: &str) -> String {
    normalize_separators(path).trim_end_matches(DELIMITER).to_string()
}

/// Key with exactly one trailing delimiter, empty stays empty / 确保以分隔符结尾
/// "a/b" -> "a/b/", "" -> ""
pub fn path_with_delimiter(path: &str) -> String {
    let trimmed = path_without_delimiter(path);
    if trimmed.is_empty() {
        trimmed
    } else {
        format!("{}{}", trimmed, DELIMITER)
    }
}

/// Last path component including extension / 文件名（含扩展名）
pub fn file_name(path: &str) -> &str {
    path.rsplit(DELIMITER).next().unwrap_or(path)
}

/// Ensure exactly one trailing `/` / 确保根地址以 / 结尾
pub fn with_trailing_slash(url: &str) -> String {
    if url.ends_with(DELIMITER) {
        url.to_string()
    } else {
        format!("{}{}", url, DELIMITER)
    }
}

/// Whether the string is a well-formed absolute URI with a host / 是否为绝对地址
pub fn is_absolute_uri(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(parsed) => parsed.has_host(),
        Err(_) => false,
    }
}
