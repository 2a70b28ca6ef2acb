//! Connection string codec / 连接字符串编解码
//!
//! The connection string is a `key=value;key=value` attribute string. Keys are
//! case-insensitive; values holding reserved characters are quoted, with the
//! quote character doubled inside.

use serde::{Deserialize, Serialize};

use crate::error::{DriverError, Result};

pub const URL_BASE_KEY: &str = "urlBase";
pub const PROJECT_ID_KEY: &str = "projectId";
pub const REGION_KEY: &str = "region";
pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_KEY: &str = "password";

/// Decoded backend credential / 后端凭证
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Identity endpoint base URL / 认证服务地址
    pub url_base: Option<String>,
    /// Project (tenant) id / 项目ID
    pub project_id: Option<String>,
    /// Service region, empty when unspecified / 区域
    pub region: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("url_base", &self.url_base)
            .field("project_id", &self.project_id)
            .field("region", &self.region)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Serialize a credential into an attribute string / 编码
pub fn encode(credential: &Credential) -> String {
    let pairs = [
        (URL_BASE_KEY, credential.url_base.as_deref()),
        (PROJECT_ID_KEY, credential.project_id.as_deref()),
        (REGION_KEY, Some(credential.region.as_str())),
        (USERNAME_KEY, credential.username.as_deref()),
        (PASSWORD_KEY, credential.password.as_deref()),
    ];

    pairs
        .iter()
        .filter_map(|(key, value)| value.map(|v| format!("{}={}", key, quote_value(v))))
        .collect::<Vec<_>>()
        .join(";")
}

/// Parse an attribute string into a credential / 解码
///
/// Unknown keys are ignored; a missing region decodes as `""`, every other
/// missing key as `None`.
pub fn decode(connection_string: &str) -> Result<Credential> {
    let pairs = parse_pairs(connection_string)?;
    let lookup = |key: &str| {
        pairs
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.clone())
    };

    Ok(Credential {
        url_base: lookup(URL_BASE_KEY),
        project_id: lookup(PROJECT_ID_KEY),
        region: lookup(REGION_KEY).unwrap_or_default(),
        username: lookup(USERNAME_KEY),
        password: lookup(PASSWORD_KEY),
    })
}

fn needs_quoting(value: &str) -> bool {
    value != value.trim() || value.contains([';', '=', '"', '\''])
}

fn quote_value(value: &str) -> String {
    if !needs_quoting(value) {
        return value.to_string();
    }
    if value.contains('"') && !value.contains('\'') {
        format!("'{}'", value)
    } else {
        format!("\"{}\"", value.replace('"', "\"\""))
    }
}

fn malformed(reason: &str, position: usize) -> DriverError {
    DriverError::InvalidConfiguration(format!(
        "malformed connection string: {} at offset {}",
        reason, position
    ))
}

/// Split into `(key, value)` pairs in input order
fn parse_pairs(input: &str) -> Result<Vec<(String, String)>> {
    let chars: Vec<char> = input.chars().collect();
    let mut pairs = Vec::new();
    let mut pos = 0;

    loop {
        while pos < chars.len() && (chars[pos] == ';' || chars[pos].is_whitespace()) {
            pos += 1;
        }
        if pos >= chars.len() {
            break;
        }

        // key: `==` is a literal `=`
        let mut key = String::new();
        loop {
            match chars.get(pos) {
                None | Some(';') => return Err(malformed("missing '='", pos)),
                Some('=') if chars.get(pos + 1) == Some(&'=') => {
                    key.push('=');
                    pos += 2;
                }
                Some('=') => {
                    pos += 1;
                    break;
                }
                Some(c) => {
                    key.push(*c);
                    pos += 1;
                }
            }
        }
        let key = key.trim().to_string();
        if key.is_empty() {
            return Err(malformed("empty key", pos));
        }

        while pos < chars.len() && chars[pos].is_whitespace() && chars[pos] != ';' {
            pos += 1;
        }

        let value = match chars.get(pos) {
            Some(&quote @ ('"' | '\'')) => {
                pos += 1;
                let mut value = String::new();
                loop {
                    match chars.get(pos) {
                        None => return Err(malformed("unterminated quote", pos)),
                        Some(&c) if c == quote => {
                            if chars.get(pos + 1) == Some(&quote) {
                                value.push(quote);
                                pos += 2;
                            } else {
                                pos += 1;
                                break;
                            }
                        }
                        Some(&c) => {
                            value.push(c);
                            pos += 1;
                        }
                    }
                }
                while pos < chars.len() && chars[pos].is_whitespace() {
                    pos += 1;
                }
                if pos < chars.len() && chars[pos] != ';' {
                    return Err(malformed("unexpected text after quoted value", pos));
                }
                value
            }
            _ => {
                let start = pos;
                while pos < chars.len() && chars[pos] != ';' {
                    pos += 1;
                }
                chars[start..pos].iter().collect::<String>().trim().to_string()
            }
        };

        pairs.push((key, value));
    }

    Ok(pairs)
}
