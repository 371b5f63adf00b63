//! OAuth2 authorization-code and refresh-token exchange over `reqwest`.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use gs_backup_core::credential::{build_authorization_url, CodeExchanger, Credential};
use gs_backup_core::error::AuthError;
use reqwest::Client;
use serde::Deserialize;

pub const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.google.com/o/oauth2/token";
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.full_control";
pub const DEFAULT_REDIRECT_URL: &str = "urn:ietf:wg:oauth:2.0:oob";

/// OAuth client settings, as loaded from config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    pub scope: String,
    pub redirect_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl From<TokenResponse> for Credential {
    fn from(t: TokenResponse) -> Self {
        Credential {
            access_token: t.access_token,
            token_type: t.token_type,
            refresh_token: t.refresh_token,
            expiry: t.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }
}

pub struct OAuthExchanger {
    http: Client,
    settings: OAuthSettings,
}

impl OAuthExchanger {
    pub fn new(settings: OAuthSettings) -> Self {
        Self {
            http: Client::new(),
            settings,
        }
    }

    async fn request_token(&self, grant: &[(&str, &str)]) -> Result<Credential, AuthError> {
        let mut form: Vec<(&str, &str)> = grant.to_vec();
        form.push(("client_id", self.settings.client_id.as_str()));
        if let Some(secret) = self.settings.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let response = self
            .http
            .post(&self.settings.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::Exchange(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "[AUTH] Token endpoint rejected request");
            return Err(AuthError::Exchange(format!("status {}: {}", status.as_u16(), body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Exchange(format!("malformed token response: {e}")))?;
        Ok(token.into())
    }
}

#[async_trait]
impl CodeExchanger for OAuthExchanger {
    fn authorization_url(&self) -> String {
        match build_authorization_url(
            &self.settings.auth_url,
            &self.settings.client_id,
            &self.settings.redirect_url,
            &self.settings.scope,
        ) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, "[AUTH] Could not build authorization URL");
                self.settings.auth_url.clone()
            }
        }
    }

    async fn exchange_code(&self, code: &str) -> Result<Credential, AuthError> {
        tracing::info!("[AUTH] Exchanging authorization code");
        self.request_token(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.settings.redirect_url.as_str()),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Credential, AuthError> {
        tracing::info!("[AUTH] Refreshing access token");
        self.request_token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }
}
