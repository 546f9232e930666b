#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use shared::models::{UserId, UserProfile};
use shared::transport::{
    HttpError, HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpResult, HttpTransport,
    RequestBody,
};
use shared::{AccessToken, ClientConfig, RefreshToken, TravelClient};

pub const BASE_URL: &str = "https://api.test/api/";

#[derive(Debug, Clone)]
pub enum Reply {
    Json(u16, Value),
    Empty(u16),
    Fail(HttpError),
    /// Answers with the given payload only when the request carries
    /// `Bearer <token>`, otherwise 401.
    RequireBearer {
        token: String,
        status: u16,
        body: Value,
    },
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: HttpMethod,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub json: Option<Value>,
    pub multipart_fields: Vec<(String, String)>,
    pub multipart_files: Vec<String>,
}

/// Scripted transport. Each route holds a queue of replies; the last one
/// repeats. Unknown routes answer 404.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<(HttpMethod, String), VecDeque<Reply>>>,
    recorded: Mutex<Vec<Recorded>>,
    latency: Mutex<Option<Duration>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `path` is relative to the API root, e.g. `groups/g1/`.
    pub fn on(&self, method: HttpMethod, path: &str, reply: Reply) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, full_path(path)))
            .or_default()
            .push_back(reply);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }

    pub fn count(&self, method: HttpMethod, path: &str) -> usize {
        let path = full_path(path);
        self.recorded
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn last(&self, method: HttpMethod, path: &str) -> Option<Recorded> {
        let path = full_path(path);
        self.recorded
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.method == method && r.path == path)
            .cloned()
    }

    fn next_reply(&self, method: HttpMethod, path: &str) -> Option<Reply> {
        let mut routes = self.routes.lock().unwrap();
        let queue = routes.get_mut(&(method, path.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait::async_trait]
impl HttpTransport for FakeTransport {
    async fn execute(&self, request: HttpRequest) -> HttpResult {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let url = url::Url::parse(request.url().as_str()).unwrap();
        let method = request.method();
        let path = url.path().to_string();
        let authorization = request.headers().get("authorization").map(str::to_string);
        let request_id = request.request_id().to_string();

        let (json, multipart_fields, multipart_files) = match request.body() {
            RequestBody::Empty => (None, Vec::new(), Vec::new()),
            RequestBody::Json(bytes) => (serde_json::from_slice(bytes).ok(), Vec::new(), Vec::new()),
            RequestBody::Multipart(form) => (
                None,
                form.fields().to_vec(),
                form.files()
                    .iter()
                    .map(|f| format!("{}={}", f.field_name, f.file_name))
                    .collect(),
            ),
        };

        self.recorded.lock().unwrap().push(Recorded {
            method,
            path: path.clone(),
            query: url.query().map(str::to_string),
            authorization: authorization.clone(),
            json,
            multipart_fields,
            multipart_files,
        });

        let reply = self
            .next_reply(method, &path)
            .unwrap_or_else(|| Reply::Json(404, json!({"detail": "Not found."})));

        let (status, body) = match reply {
            Reply::Fail(e) => return Err(e),
            Reply::Json(status, body) => (status, serde_json::to_vec(&body).unwrap()),
            Reply::Empty(status) => (status, Vec::new()),
            Reply::RequireBearer {
                token,
                status,
                body,
            } => {
                if authorization.as_deref() == Some(format!("Bearer {token}").as_str()) {
                    (status, serde_json::to_vec(&body).unwrap())
                } else {
                    (
                        401,
                        serde_json::to_vec(&json!({"detail": "Token is expired"})).unwrap(),
                    )
                }
            }
        };

        Ok(HttpResponse::new(
            status,
            HttpHeaders::new(),
            body,
            request_id,
            1,
        ))
    }
}

fn full_path(path: &str) -> String {
    format!("/api/{}", path.trim_start_matches('/'))
}

pub fn config() -> ClientConfig {
    ClientConfig {
        base_url: BASE_URL.to_string(),
        ..ClientConfig::default()
    }
}

pub fn client(transport: &Arc<FakeTransport>) -> TravelClient {
    TravelClient::with_transport(config(), transport.clone()).unwrap()
}

pub fn user(id: &str) -> UserProfile {
    UserProfile {
        id: UserId::new(id),
        username: format!("user{id}"),
        display_name: None,
        email: None,
        avatar_url: None,
        bio: None,
    }
}

pub fn user_json(id: &str) -> Value {
    json!({"id": id, "username": format!("user{id}")})
}

/// A client already signed in with `access`/`refresh`.
pub fn signed_in(transport: &Arc<FakeTransport>, access: &str, refresh: &str) -> TravelClient {
    let client = client(transport);
    client.session().set_credential(
        AccessToken::new(access),
        RefreshToken::new(refresh),
        user("1"),
    );
    client
}

pub fn timeout() -> HttpError {
    HttpError::Timeout {
        timeout_ms: 30_000,
        request_id: "fake".into(),
    }
}
