//! Session bootstrap against the portal's security endpoints.
//!
//! The token endpoint speaks the OAuth password grant with portal extensions:
//! claims arrive JSON-encoded inside a string field, and list fields may be
//! either arrays or comma-joined strings depending on the backend version.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;

use crate::http::ApiClient;
use crate::session::User;

const TOKEN_PATH: &str = "token";
const LOGOUT_PATH: &str = "api/account/logout";
const CHANGE_PASSWORD_PATH: &str = "api/Account/changePassword";
const USER_INFO_PATH: &str = "account/userinfo";

/// Fallback when the token endpoint omits the display name.
const UNKNOWN_USER: &str = "unknown user";

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// List that the backend sends either as a JSON array or a comma-joined
/// string.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum StringList {
    Many(Vec<String>),
    Joined(String),
}

impl Default for StringList {
    fn default() -> Self {
        StringList::Many(Vec::new())
    }
}

impl StringList {
    /// Normalizes to a vector, splitting comma-joined values.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            StringList::Many(items) => items,
            StringList::Joined(s) if s.is_empty() => Vec::new(),
            StringList::Joined(s) => s.split(',').map(|item| item.trim().to_string()).collect(),
        }
    }
}

/// Raw token endpoint response.
#[derive(Deserialize, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    /// JSON-encoded array; the backend serializes claims twice.
    #[serde(rename = "userClaims")]
    pub user_claims: Option<String>,
    #[serde(rename = "userRoles", default)]
    pub user_roles: StringList,
    #[serde(rename = "userAccessRights", default)]
    pub user_access_rights: StringList,
}

impl TokenResponse {
    fn into_user(self) -> Result<User> {
        let claims = match self.user_claims {
            Some(raw) if !raw.is_empty() => serde_json::from_str(&raw)
                .context("Failed to parse user claims from token response")?,
            _ => Vec::new(),
        };
        Ok(User {
            token: self.access_token,
            user_name: self.user_name.unwrap_or_else(|| UNKNOWN_USER.to_string()),
            claims,
            roles: self.user_roles.into_vec(),
            access_rights: self.user_access_rights.into_vec(),
        })
    }
}

#[async_trait]
pub trait Authenticate: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<User>;
    async fn logout(&self) -> Result<()>;
    async fn change_password(&self, old_password: &str, new_password: &str) -> Result<()>;
    async fn user_info(&self) -> Result<serde_json::Value>;
}

/// Security endpoints of the portal, bound to an [`ApiClient`].
pub struct SecurityService {
    client: ApiClient,
}

impl SecurityService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Authenticate for SecurityService {
    /// Signs in with the password grant and remembers the resulting user in
    /// the session store.
    #[tracing::instrument(skip(self, credentials))]
    async fn login(&self, credentials: &Credentials) -> Result<User> {
        let _busy = self.client.busy().start();
        let url = self.client.config().security_url(TOKEN_PATH);
        debug!("POST {}", url);

        let params = [
            ("grant_type", "password"),
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ];
        // Credentials go out unauthorized; there is no token yet.
        let request = self.client.inner().post(&url).form(&params);
        let response = self.client.execute(request).await?;

        let token: TokenResponse = self.client.read_json(response).await?;
        let user = token.into_user()?;
        self.client.session().set(user.clone());
        Ok(user)
    }

    /// Tells the server to end the session, then forgets it locally. The
    /// local session is cleared even when the server call fails.
    #[tracing::instrument(skip(self))]
    async fn logout(&self) -> Result<()> {
        let _busy = self.client.busy().start();
        let url = self.client.config().security_url(LOGOUT_PATH);
        debug!("POST {}", url);

        let request = self.client.authorize(self.client.inner().post(&url));
        let result = self.client.execute(request).await;
        self.client.session().clear();
        result.map(|_| ())
    }

    #[tracing::instrument(skip(self, old_password, new_password))]
    async fn change_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        let _busy = self.client.busy().start();
        let url = self.client.config().security_url(CHANGE_PASSWORD_PATH);
        debug!("POST {}", url);

        let params = [
            ("oldPassword", old_password),
            ("newPassword", new_password),
        ];
        let request = self
            .client
            .authorize(self.client.inner().post(&url).form(&params));
        self.client.execute(request).await?;
        Ok(())
    }

    /// Fetches the current account details, bypassing intermediary caches.
    #[tracing::instrument(skip(self))]
    async fn user_info(&self) -> Result<serde_json::Value> {
        let _busy = self.client.busy().start();
        let url = self.client.config().request_url(USER_INFO_PATH, None);
        debug!("GET {}", url);

        let request = self.client.authorize(
            self.client
                .inner()
                .get(&url)
                .header(CACHE_CONTROL, "no-cache"),
        );
        let response = self.client.execute(request).await?;
        self.client.read_json(response).await
    }
}
