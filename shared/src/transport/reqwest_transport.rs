use std::time::{Duration, Instant};

use tracing::{debug, instrument};

use super::http::{
    HttpError, HttpHeaders, HttpMethod, HttpRequest, HttpResponse, RequestBody,
    MAX_RESPONSE_BODY_SIZE,
};
use super::{HttpResult, HttpTransport};
use crate::config::ClientConfig;

pub struct ReqwestTransport {
    client: reqwest::Client,
    max_response_bytes: usize,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| HttpError::InvalidRequest {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self::with_client(client, config.max_response_bytes))
    }

    pub fn with_client(client: reqwest::Client, max_response_bytes: usize) -> Self {
        Self {
            client,
            max_response_bytes: max_response_bytes.min(MAX_RESPONSE_BODY_SIZE),
        }
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }

    fn classify(err: &reqwest::Error, host: &str, timeout_ms: u64, request_id: &str) -> HttpError {
        if err.is_timeout() {
            HttpError::Timeout {
                timeout_ms,
                request_id: request_id.to_string(),
            }
        } else if err.is_builder() {
            HttpError::InvalidRequest {
                reason: err.to_string(),
            }
        } else {
            HttpError::ConnectionError {
                host: host.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Accumulates a response body and fails as soon as it grows past `max`.
struct BodyLimit {
    bytes: Vec<u8>,
    max: usize,
}

impl BodyLimit {
    fn new(max: usize) -> Self {
        Self {
            bytes: Vec::new(),
            max,
        }
    }

    fn push(&mut self, chunk: &[u8]) -> Result<(), HttpError> {
        let size = self.bytes.len().saturating_add(chunk.len());
        if size > self.max {
            return Err(HttpError::ResponseTooLarge {
                size,
                max: self.max,
            });
        }
        self.bytes.extend_from_slice(chunk);
        Ok(())
    }

    fn into_inner(self) -> Vec<u8> {
        self.bytes
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(
        skip(self, request),
        fields(method = %request.method(), path = request.url().path(), request_id = request.request_id())
    )]
    async fn execute(&self, request: HttpRequest) -> HttpResult {
        let start = Instant::now();
        let host = request.url().host().to_string();
        let timeout_ms = request.timeout_ms();
        let request_id = request.request_id().to_string();

        let mut builder = self
            .client
            .request(Self::method(request.method()), request.url().as_str())
            .timeout(Duration::from_millis(timeout_ms));
        for (name, value) in request.headers().iter() {
            builder = builder.header(name, value);
        }

        builder = match request.into_body() {
            RequestBody::Empty => builder,
            RequestBody::Json(bytes) => builder.body(bytes),
            RequestBody::Multipart(form) => {
                let (fields, files) = form.into_parts();
                let mut multipart = reqwest::multipart::Form::new();
                for (name, value) in fields {
                    multipart = multipart.text(name, value);
                }
                for file in files {
                    let part = reqwest::multipart::Part::bytes(file.bytes)
                        .file_name(file.file_name)
                        .mime_str(&file.content_type)
                        .map_err(|e| HttpError::InvalidRequest {
                            reason: format!("invalid content type '{}': {e}", file.content_type),
                        })?;
                    multipart = multipart.part(file.field_name, part);
                }
                builder.multipart(multipart)
            }
        };

        let mut response = builder
            .send()
            .await
            .map_err(|e| Self::classify(&e, &host, timeout_ms, &request_id))?;

        let status = response.status().as_u16();
        if let Some(declared) = response.content_length() {
            let declared = usize::try_from(declared).unwrap_or(usize::MAX);
            if declared > self.max_response_bytes {
                return Err(HttpError::ResponseTooLarge {
                    size: declared,
                    max: self.max_response_bytes,
                });
            }
        }

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        // Content-Length may be absent (chunked), so the cap is enforced
        // while reading as well.
        let mut body = BodyLimit::new(self.max_response_bytes);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Self::classify(&e, &host, timeout_ms, &request_id))?
        {
            body.push(&chunk)?;
        }

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(status, duration_ms, "http exchange finished");

        Ok(HttpResponse::new(
            status,
            HttpHeaders::from(headers),
            body.into_inner(),
            request_id,
            duration_ms,
        ))
    }
}
