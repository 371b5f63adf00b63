//! Credential Holder: one bearer token per process.
//!
//! The token is resolved once at startup, in this order:
//!   1. a still-valid credential from the [`TokenCache`]
//!   2. a cached credential refreshed through its refresh token
//!   3. an authorization code exchanged through the [`CodeExchanger`]
//!
//! A cache file that does not parse counts as empty, so a fresh code can replace it.
//! Whatever is obtained through (2) or (3) is written back to the cache. If none
//! of these apply, [`AuthError::AuthUnavailable`] carries the URL an operator must
//! visit to obtain a code. The loop never refreshes; the credential is read-only
//! once acquired.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use mockall::automock;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::AuthError;

/// An OAuth bearer token as persisted in the cache file.
///
/// Accepts both snake_case keys and the capitalised keys older OAuth tooling wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(alias = "AccessToken")]
    pub access_token: String,
    #[serde(default, alias = "TokenType")]
    pub token_type: Option<String>,
    #[serde(default, alias = "RefreshToken")]
    pub refresh_token: Option<String>,
    #[serde(default, alias = "Expiry")]
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: Some("Bearer".to_string()),
            refresh_token: None,
            expiry: None,
        }
    }

    /// A missing expiry, or the zero timestamp, means the token does not expire.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expiry {
            None => true,
            Some(expiry) if expiry.year() <= 1 => true,
            Some(expiry) => expiry > now,
        }
    }

    pub fn authorization_header(&self) -> String {
        let scheme = match self.token_type.as_deref() {
            Some(t) if !t.is_empty() && !t.eq_ignore_ascii_case("bearer") => t,
            _ => "Bearer",
        };
        format!("{} {}", scheme, self.access_token)
    }
}

/// Persistence for credentials between process runs.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait TokenCache: Send + Sync {
    /// `Ok(None)` when nothing has been cached yet.
    fn load(&self) -> Result<Option<Credential>, AuthError>;

    fn store(&self, credential: &Credential) -> Result<(), AuthError>;

    /// Human-readable location, for log lines.
    fn location(&self) -> String;
}

/// Obtains credentials from the authorization server.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CodeExchanger: Send + Sync {
    /// URL an operator visits to obtain an authorization code.
    fn authorization_url(&self) -> String;

    async fn exchange_code(&self, code: &str) -> Result<Credential, AuthError>;

    async fn refresh(&self, refresh_token: &str) -> Result<Credential, AuthError>;
}

/// JSON file cache.
#[derive(Debug, Clone)]
pub struct FileTokenCache {
    path: PathBuf,
}

impl FileTokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenCache for FileTokenCache {
    fn load(&self) -> Result<Option<Credential>, AuthError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(AuthError::Cache {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| AuthError::MalformedCache {
                path: self.path.clone(),
                source,
            })
    }

    fn store(&self, credential: &Credential) -> Result<(), AuthError> {
        let json =
            serde_json::to_string_pretty(credential).map_err(|source| AuthError::MalformedCache {
                path: self.path.clone(),
                source,
            })?;
        std::fs::write(&self.path, json).map_err(|source| AuthError::Cache {
            path: self.path.clone(),
            source,
        })
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Holds the process-wide credential. Cheap to clone; all clones share one token.
#[derive(Debug, Clone)]
pub struct CredentialHolder {
    credential: Arc<Credential>,
}

impl CredentialHolder {
    pub fn from_credential(credential: Credential) -> Self {
        Self {
            credential: Arc::new(credential),
        }
    }

    /// Resolves the startup credential. See the module docs for the order.
    pub async fn acquire<C, E>(
        cache: &C,
        exchanger: &E,
        code: Option<&str>,
    ) -> Result<Self, AuthError>
    where
        C: TokenCache + ?Sized,
        E: CodeExchanger + ?Sized,
    {
        let cached = match cache.load() {
            Ok(cached) => cached,
            Err(AuthError::MalformedCache { path, source }) => {
                warn!(cache = %path.display(), error = %source, "[AUTH] Ignoring unreadable token cache");
                None
            }
            Err(e) => return Err(e),
        };

        if let Some(credential) = &cached {
            if credential.is_valid_at(Utc::now()) {
                info!(cache = %cache.location(), "[AUTH] Using cached credential");
                return Ok(Self::from_credential(credential.clone()));
            }
            if let Some(refresh_token) = credential.refresh_token.as_deref() {
                info!(cache = %cache.location(), "[AUTH] Cached credential expired, refreshing");
                match exchanger.refresh(refresh_token).await {
                    Ok(mut refreshed) => {
                        if refreshed.refresh_token.is_none() {
                            refreshed.refresh_token = Some(refresh_token.to_string());
                        }
                        cache.store(&refreshed)?;
                        info!(cache = %cache.location(), "[AUTH] Refreshed credential cached");
                        return Ok(Self::from_credential(refreshed));
                    }
                    Err(e) => {
                        warn!(error = %e, "[AUTH] Refresh failed, falling back to authorization code");
                    }
                }
            }
        }

        match code.filter(|c| !c.is_empty()) {
            Some(code) => {
                let credential = exchanger.exchange_code(code).await.map_err(|e| {
                    error!(error = %e, "[AUTH] Authorization code exchange failed");
                    e
                })?;
                cache.store(&credential)?;
                info!(cache = %cache.location(), "[AUTH] Token is cached");
                Ok(Self::from_credential(credential))
            }
            None => Err(AuthError::AuthUnavailable {
                auth_url: exchanger.authorization_url(),
            }),
        }
    }

    pub fn current_token(&self) -> Arc<Credential> {
        Arc::clone(&self.credential)
    }

    pub fn authorization_header(&self) -> String {
        self.credential.authorization_header()
    }
}

/// Builds the consent URL for the authorization-code flow.
pub fn build_authorization_url(
    auth_url: &str,
    client_id: &str,
    redirect_url: &str,
    scope: &str,
) -> Result<String, AuthError> {
    let url = url::Url::parse_with_params(
        auth_url,
        &[
            ("response_type", "code"),
            ("client_id", client_id),
            ("redirect_uri", redirect_url),
            ("scope", scope),
            ("access_type", "offline"),
        ],
    )
    .map_err(|e| AuthError::Exchange(format!("invalid authorization endpoint {auth_url}: {e}")))?;
    Ok(url.to_string())
}
