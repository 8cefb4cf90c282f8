//! Authenticated API client: bearer decoration, busy tracking and
//! centralized failure dispatch.

use std::sync::Arc;

use anyhow::Result;
use log::{debug, error, warn};
use reqwest::{Client, RequestBuilder, Response, multipart::Form};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::{ApiError, classify, classify_status};
use crate::busy::BusyTracker;
use crate::config::ApiConfig;
use crate::session::SessionStore;

/// HTTP client for the portal API.
///
/// Every request is decorated with the remembered bearer token, holds a busy
/// guard for its full duration and routes failures through the dispatcher,
/// which clears the session on 401. The typed [`ApiError`] stays on the error
/// chain for callers that match on it.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: ApiConfig,
    session: Arc<dyn SessionStore>,
    busy: BusyTracker,
}

impl ApiClient {
    pub fn new(
        config: ApiConfig,
        session: Arc<dyn SessionStore>,
        busy: BusyTracker,
    ) -> Result<Self> {
        let client = config.build_client()?;
        Ok(Self {
            client,
            config,
            session,
            busy,
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    pub fn busy(&self) -> &BusyTracker {
        &self.busy
    }

    pub(crate) fn inner(&self) -> &Client {
        &self.client
    }

    /// Applies the remembered bearer token, if a session exists.
    pub(crate) fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.current() {
            Some(user) => request.bearer_auth(&user.token),
            None => request,
        }
    }

    /// Sends a prepared request, checks the status and runs failure dispatch.
    pub(crate) async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Err(self.dispatch_failure(classify(e)).into()),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(self.dispatch_failure(classify_status(status)).into());
        }

        Ok(response)
    }

    /// Consumes a JSON body. The request deadline keeps running while the
    /// body streams, so read failures go through the dispatcher like send
    /// failures; malformed JSON stays a plain parse error.
    pub(crate) async fn read_json<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        match response.json::<T>().await {
            Ok(value) => Ok(value),
            Err(e) if e.is_decode() && !e.is_timeout() => {
                Err(anyhow::Error::from(e).context("Failed to parse JSON response"))
            }
            Err(e) => Err(self.dispatch_failure(classify(e)).into()),
        }
    }

    /// Runs the centralized handlers for a failed request and hands the
    /// classified error back to the caller.
    pub(crate) fn dispatch_failure(&self, err: ApiError) -> ApiError {
        match err {
            ApiError::SessionExpired => {
                warn!("{}", err);
                self.session.clear();
            }
            ApiError::AccessDenied => warn!("{}", err),
            _ => error!("{}", err),
        }
        err
    }

    /// Performs a GET request and deserializes the JSON response.
    #[tracing::instrument(skip(self))]
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        host: Option<&str>,
    ) -> Result<T> {
        let _busy = self.busy.start();
        let url = self.config.request_url(path, host);
        debug!("GET {}", url);

        let response = self.execute(self.authorize(self.client.get(&url))).await?;
        self.read_json(response).await
    }

    /// Performs a GET request with query parameters and deserializes the JSON
    /// response.
    #[tracing::instrument(skip(self, query))]
    pub async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        host: Option<&str>,
    ) -> Result<T> {
        let _busy = self.busy.start();
        let url = self.config.request_url(path, host);
        debug!("GET {} with query {:?}", url, query);

        let request = self.authorize(self.client.get(&url).query(query));
        let response = self.execute(request).await?;
        self.read_json(response).await
    }

    /// POSTs a JSON body and deserializes the JSON response.
    #[tracing::instrument(skip(self, body))]
    pub async fn post_json<B, T>(&self, path: &str, body: &B, host: Option<&str>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let _busy = self.busy.start();
        let url = self.config.request_url(path, host);
        debug!("POST {}", url);

        let request = self.authorize(self.client.post(&url).json(body));
        let response = self.execute(request).await?;
        self.read_json(response).await
    }

    /// PUTs a JSON body and deserializes the JSON response.
    #[tracing::instrument(skip(self, body))]
    pub async fn put_json<B, T>(&self, path: &str, body: &B, host: Option<&str>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let _busy = self.busy.start();
        let url = self.config.request_url(path, host);
        debug!("PUT {}", url);

        let request = self.authorize(self.client.put(&url).json(body));
        let response = self.execute(request).await?;
        self.read_json(response).await
    }

    /// DELETEs with a JSON body (the portal API expects one) and deserializes
    /// the JSON response.
    #[tracing::instrument(skip(self, body))]
    pub async fn delete_json<B, T>(&self, path: &str, body: &B, host: Option<&str>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let _busy = self.busy.start();
        let url = self.config.request_url(path, host);
        debug!("DELETE {}", url);

        let request = self.authorize(self.client.delete(&url).json(body));
        let response = self.execute(request).await?;
        self.read_json(response).await
    }

    /// POSTs a multipart form. The content type (with boundary) is set by the
    /// form itself; authorization is still applied.
    #[tracing::instrument(skip(self, form))]
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
        host: Option<&str>,
    ) -> Result<T> {
        let _busy = self.busy.start();
        let url = self.config.request_url(path, host);
        debug!("POST multipart {}", url);

        let request = self.authorize(self.client.post(&url).multipart(form));
        let response = self.execute(request).await?;
        self.read_json(response).await
    }
}
