use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::config::ClientConfig;
use crate::dispatcher::RequestDispatcher;
use crate::envelope::{self, Page};
use crate::error::{AppError, AppResult};
use crate::session::SessionStore;
use crate::transport::{HttpMethod, HttpRequest, HttpTransport, MultipartForm, ValidatedUrl};

/// Builds requests against the configured API root and runs the authorised
/// ones through the dispatcher.
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    dispatcher: RequestDispatcher,
    base: Url,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        dispatcher: RequestDispatcher,
        config: ClientConfig,
    ) -> AppResult<Self> {
        config.validate()?;
        let base = config.base_url()?;
        Ok(Self {
            transport,
            dispatcher,
            base,
            config,
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        self.dispatcher.session()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> AppResult<ValidatedUrl> {
        join_endpoint(&self.base, segments, query)
    }

    pub fn request(
        &self,
        method: HttpMethod,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> AppResult<HttpRequest> {
        let url = self.endpoint(segments, query)?;
        Ok(HttpRequest::new(method, url).with_timeout_ms(self.config.request_timeout_ms)?)
    }

    /// Sends without a bearer token. Used for login and registration.
    pub async fn send_public(&self, request: HttpRequest) -> AppResult<Value> {
        execute_json(self.transport.as_ref(), request).await
    }

    #[instrument(
        skip(self, request),
        fields(method = %request.method(), path = request.url().path())
    )]
    pub async fn send_authorized(&self, request: HttpRequest) -> AppResult<Value> {
        self.send_authorized_with(|| Ok(request.clone())).await
    }

    /// Like [`send_authorized`](Self::send_authorized) but rebuilds the
    /// request for every attempt, so a body that depends on session state
    /// sees the state after a refresh.
    pub async fn send_authorized_with<B>(&self, build: B) -> AppResult<Value>
    where
        B: Fn() -> AppResult<HttpRequest>,
    {
        self.dispatcher
            .request_with_auto_refresh(|token| {
                let request = build();
                async move {
                    let request = request?;
                    let request = match token {
                        Some(token) => request.with_bearer(token.expose())?,
                        None => request,
                    };
                    execute_json(self.transport.as_ref(), request).await
                }
            })
            .await
    }

    pub async fn get_page<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
        named_key: &str,
    ) -> AppResult<Page<T>> {
        let request = self.request(HttpMethod::Get, segments, query)?;
        let payload = self.send_authorized(request).await?;
        envelope::decode_page(payload, Some(named_key))
    }

    pub async fn get_list<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
        named_key: &str,
    ) -> AppResult<Vec<T>> {
        self.get_page(segments, query, named_key)
            .await
            .map(|page| page.items)
    }

    pub async fn get_item<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        named_key: Option<&str>,
    ) -> AppResult<T> {
        let request = self.request(HttpMethod::Get, segments, &[])?;
        let payload = self.send_authorized(request).await?;
        envelope::decode_item(payload, named_key)
    }

    pub async fn send_json<B, T>(
        &self,
        method: HttpMethod,
        segments: &[&str],
        body: &B,
        named_key: Option<&str>,
    ) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(method, segments, &[])?.with_json(body)?;
        let payload = self.send_authorized(request).await?;
        envelope::decode_item(payload, named_key)
    }

    /// For endpoints whose response body carries nothing the caller needs.
    pub async fn send_unit(
        &self,
        method: HttpMethod,
        segments: &[&str],
        body: Option<&Value>,
    ) -> AppResult<()> {
        let mut request = self.request(method, segments, &[])?;
        if let Some(body) = body {
            request = request.with_json(body)?;
        }
        self.send_authorized(request).await.map(|_| ())
    }

    pub async fn upload<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        segments: &[&str],
        form: MultipartForm,
        named_key: Option<&str>,
    ) -> AppResult<T> {
        let request = self
            .request(method, segments, &[])?
            .with_timeout_ms(self.config.upload_timeout_ms)?
            .with_multipart(form)?;
        let payload = self.send_authorized(request).await?;
        envelope::decode_item(payload, named_key)
    }
}

/// Joins path segments onto `base`, percent-encoding each one and keeping
/// the trailing slash the API expects.
pub(crate) fn join_endpoint(
    base: &Url,
    segments: &[&str],
    query: &[(&str, String)],
) -> AppResult<ValidatedUrl> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| AppError::config(format!("base URL '{base}' cannot take a path")))?;
        path.pop_if_empty();
        path.extend(segments);
        path.push("");
    }
    if !query.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
    }
    Ok(ValidatedUrl::from_url(url)?)
}

/// Runs one exchange and maps the outcome: non-2xx becomes a domain error,
/// an empty 2xx body becomes `Value::Null`.
pub(crate) async fn execute_json(
    transport: &dyn HttpTransport,
    request: HttpRequest,
) -> AppResult<Value> {
    let method = request.method();
    let path = request.url().path().to_string();
    let response = transport.execute(request).await?;
    debug!(
        %method,
        path,
        status = response.status(),
        duration_ms = response.duration_ms(),
        "response received"
    );

    if !response.is_success() {
        return Err(AppError::from_http_status(response.status(), response.body())
            .with_internal(format!("{method} {path}"))
            .with_context("request_id", response.request_id()));
    }

    if !response.has_body() {
        return Ok(Value::Null);
    }
    Ok(response.json::<Value>()?)
}
