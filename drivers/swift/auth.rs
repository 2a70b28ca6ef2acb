//! Keystone v3 password login / Keystone v3 密码登录

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use super::types::{select_storage_endpoint, TokenResponse, SUBJECT_TOKEN_HEADER};
use crate::credential::Credential;

/// Tokens this close to expiry are renewed before use
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Authenticated session / 认证会话
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    /// Project root, e.g. `https://storage.example/v1/AUTH_x` / 存储地址
    pub storage_url: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map_or(true, |expires| expires - Duration::seconds(EXPIRY_MARGIN_SECS) > now)
    }
}

/// Keystone token source with a cached session / Keystone 认证
pub struct KeystoneAuth {
    client: Client,
    credential: Credential,
    session: Mutex<Option<AuthSession>>,
}

impl KeystoneAuth {
    pub fn new(client: Client, credential: Credential) -> Self {
        Self {
            client,
            credential,
            session: Mutex::new(None),
        }
    }

    /// Cached session, logging in when missing or about to expire / 获取会话
    pub async fn session(&self) -> Result<AuthSession> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref().filter(|s| s.is_fresh(Utc::now())) {
            return Ok(session.clone());
        }

        let session = self.login().await?;
        *guard = Some(session.clone());
        Ok(session)
    }

    /// Forget the cached session after the server rejected its token
    pub async fn invalidate(&self) {
        *self.session.lock().await = None;
    }

    async fn login(&self) -> Result<AuthSession> {
        let url_base = self
            .credential
            .url_base
            .as_deref()
            .ok_or_else(|| anyhow!("Connection string has no urlBase"))?;
        let url = tokens_url(url_base);

        tracing::debug!("Keystone login: {} (user: {:?})", url, self.credential.username);

        let response = self
            .client
            .post(&url)
            .json(&password_auth_body(&self.credential))
            .send()
            .await
            .with_context(|| format!("Keystone request failed: {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Keystone login failed: HTTP {} - {}", status, text));
        }

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Keystone response has no {} header", SUBJECT_TOKEN_HEADER))?;

        let body: TokenResponse = response.json().await.context("Invalid Keystone token response")?;
        let storage_url = select_storage_endpoint(&body.token.catalog, &self.credential.region)
            .ok_or_else(|| {
                anyhow!(
                    "No public object-store endpoint in catalog for region '{}'",
                    self.credential.region
                )
            })?;

        tracing::info!("Keystone login succeeded, storage endpoint: {}", storage_url);

        Ok(AuthSession {
            token,
            storage_url,
            expires_at: body.token.expires_at,
        })
    }
}

/// `<urlBase>/v3/auth/tokens`, without doubling a trailing `/v3`
pub fn tokens_url(url_base: &str) -> String {
    let base = url_base.trim().trim_end_matches('/');
    if base.ends_with("/v3") {
        format!("{}/auth/tokens", base)
    } else {
        format!("{}/v3/auth/tokens", base)
    }
}

/// Password-method auth request, project scoped when a project id is set
pub fn password_auth_body(credential: &Credential) -> Value {
    let mut body = json!({
        "auth": {
            "identity": {
                "methods": ["password"],
                "password": {
                    "user": {
                        "name": credential.username.as_deref().unwrap_or_default(),
                        "domain": { "id": "default" },
                        "password": credential.password.as_deref().unwrap_or_default(),
                    }
                }
            }
        }
    });

    if let Some(project_id) = credential.project_id.as_deref() {
        body["auth"]["scope"] = json!({ "project": { "id": project_id } });
    }
    body
}
