use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use super::auth::Authenticator;
use super::types::{
    IdStream, ItemRef, QuickAddResponse, RawItem, RawSubscription, StreamContentsResponse,
    StreamIdsResponse, SubscriptionListResponse,
};

/// Per-request timeout. The reader API answers id listings in well under a
/// second; anything beyond this is a stalled connection.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("tidings/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Error Types
// ============================================================================

/// Failures of a single remote request.
///
/// Transport and server failures are handled identically by every
/// synchronizer: log, skip the chunk, let the next pass re-drive. `Auth` is
/// separate because it additionally invalidates the cached edit token.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Connection-level failure (DNS, TLS, timeout) or undecodable body.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// HTTP status outside the 200..400 success window.
    #[error("server returned status {0}")]
    Server(u16),
    /// 403 on a mutating endpoint; the edit token has been invalidated.
    #[error("edit authorization rejected")]
    Auth,
    #[error("invalid api url: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Client
// ============================================================================

/// Authenticated request capability against a reader API endpoint.
///
/// All endpoint knowledge (paths, parameter names, the `output=json`
/// convention, success-status window) lives here; the synchronizers deal in
/// typed requests and responses only.
pub struct Remote {
    http: reqwest::Client,
    base: Url,
    auth: Authenticator,
}

impl Remote {
    pub fn new(base: Url, auth: Authenticator) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, base, auth })
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.auth
    }

    /// Joins an endpoint path onto the API base and appends `output=json`
    /// plus any endpoint-specific query pairs.
    fn api_url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, RemoteError> {
        let mut url = self.base.join(path)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("output", "json");
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, RemoteError> {
        let url = self.api_url(path, query)?;
        tracing::debug!(%url, "GET");
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth.auth_header())
            .send()
            .await?;
        ensure_success(response.status())?;
        Ok(response.json().await?)
    }

    /// POST with a form body to a non-mutating endpoint, decoding JSON.
    async fn post_form_json<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, RemoteError> {
        let url = self.api_url(path, &[])?;
        tracing::debug!(%url, fields = form.len(), "POST");
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth.auth_header())
            .form(form)
            .send()
            .await?;
        ensure_success(response.status())?;
        Ok(response.json().await?)
    }

    /// POST with a form body to a mutating endpoint. 403 invalidates the
    /// cached edit token and surfaces as [`RemoteError::Auth`].
    async fn post_form_mutating(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<reqwest::Response, RemoteError> {
        let url = self.api_url(path, &[])?;
        tracing::debug!(%url, fields = form.len(), "POST (mutating)");
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth.auth_header())
            .form(form)
            .send()
            .await?;
        if response.status() == StatusCode::FORBIDDEN {
            self.auth.invalidate_edit_token();
            return Err(RemoteError::Auth);
        }
        ensure_success(response.status())?;
        Ok(response)
    }

    // ========================================================================
    // Endpoints
    // ========================================================================

    /// Fetches one of the three canonical id listings, capped at `limit`
    /// entries server-side.
    pub async fn stream_item_ids(
        &self,
        stream: IdStream,
        limit: u32,
    ) -> Result<Vec<ItemRef>, RemoteError> {
        let cap = limit.to_string();
        let mut query: Vec<(&str, &str)> = stream.query().to_vec();
        query.push(("n", &cap));
        let response: StreamIdsResponse = self.get_json("stream/items/ids", &query).await?;
        tracing::debug!(stream = stream.name(), count = response.item_refs.len(), "id listing fetched");
        Ok(response.item_refs)
    }

    /// Fetches full content and metadata for up to one chunk of item ids.
    pub async fn stream_contents(&self, ids: &[i64]) -> Result<Vec<RawItem>, RemoteError> {
        let form: Vec<(&str, String)> = ids.iter().map(|id| ("i", id.to_string())).collect();
        let response: StreamContentsResponse =
            self.post_form_json("stream/items/contents", &form).await?;
        Ok(response.items)
    }

    /// Obtains an edit token, reusing the cached one while it is valid.
    pub async fn edit_token(&self) -> Result<String, RemoteError> {
        let now = chrono::Utc::now().timestamp_micros();
        if let Some(token) = self.auth.cached_edit_token(now) {
            return Ok(token);
        }
        let url = self.api_url("token", &[])?;
        tracing::debug!(%url, "fetching edit token");
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth.auth_header())
            .send()
            .await?;
        ensure_success(response.status())?;
        let token = response.text().await?.trim().to_string();
        self.auth.store_edit_token(token.clone(), now);
        Ok(token)
    }

    /// Adds or removes a state tag on a chunk of items.
    pub async fn edit_tag(
        &self,
        tag: &str,
        remove: bool,
        ids: &[i64],
        token: &str,
    ) -> Result<(), RemoteError> {
        let mut form: Vec<(&str, String)> = ids.iter().map(|id| ("i", id.to_string())).collect();
        form.push((if remove { "r" } else { "a" }, tag.to_string()));
        form.push(("T", token.to_string()));
        self.post_form_mutating("edit-tag", &form).await?;
        Ok(())
    }

    /// Fetches the full subscription list.
    pub async fn subscription_list(&self) -> Result<Vec<RawSubscription>, RemoteError> {
        let response: SubscriptionListResponse = self.get_json("subscription/list", &[]).await?;
        Ok(response.subscriptions)
    }

    /// Subscribes to a feed url. Returns whether the server actually created
    /// a stream for it.
    pub async fn quickadd(&self, feed_url: &str, token: &str) -> Result<bool, RemoteError> {
        let form = [
            ("quickadd", feed_url.to_string()),
            ("T", token.to_string()),
        ];
        let response = self.post_form_mutating("subscription/quickadd", &form).await?;
        let parsed: QuickAddResponse = response.json().await?;
        Ok(parsed.stream_id.is_some())
    }

    /// Adds or removes a label on a subscription.
    pub async fn subscription_edit(
        &self,
        subscription_id: &str,
        label_id: &str,
        add: bool,
        token: &str,
    ) -> Result<(), RemoteError> {
        let form = [
            ("ac", "edit".to_string()),
            ("s", subscription_id.to_string()),
            (
                if add { "a" } else { "r" },
                format!("user/-/{label_id}"),
            ),
            ("T", token.to_string()),
        ];
        self.post_form_mutating("subscription/edit", &form).await?;
        Ok(())
    }
}

/// The reader API signals success anywhere in 200..400; redirects that
/// reqwest did not follow count as success-with-nothing-to-do.
fn ensure_success(status: StatusCode) -> Result<(), RemoteError> {
    let code = status.as_u16();
    if (200..400).contains(&code) {
        Ok(())
    } else {
        Err(RemoteError::Server(code))
    }
}
