//! In-process axum server for client tests.
//!
//! Answers with canned JSON responses chosen by method and path, and
//! records every request it receives with its decoded form fields.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Query, Request, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::{Form, Router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Canned response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl MockResponse {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    /// Holds the response back for `delay` before writing it.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// One part of a `multipart/form-data` body.
#[derive(Debug, Clone)]
pub struct MultipartPart {
    pub name: String,
    pub file_name: Option<String>,
    pub data: Vec<u8>,
}

/// A request as received by the server.
#[derive(Debug, Clone, Default)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// Raw query string, without the leading `?`.
    pub query: String,
    /// Header names are lowercased.
    pub headers: Vec<(String, String)>,
    /// Raw body for anything that is not a form.
    pub body: Vec<u8>,
    query_pairs: Vec<(String, String)>,
    form: Vec<(String, String)>,
    parts: Vec<MultipartPart>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Decoded value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<String> {
        lookup(&self.query_pairs, name)
    }

    /// Text value of a form field, from a multipart or urlencoded body.
    pub fn form_field(&self, name: &str) -> Option<String> {
        lookup(&self.form, name).or_else(|| {
            self.multipart_part(name)
                .map(|p| String::from_utf8_lossy(&p.data).into_owned())
        })
    }

    pub fn multipart_part(&self, name: &str) -> Option<MultipartPart> {
        self.parts.iter().find(|p| p.name == name).cloned()
    }

    pub fn multipart_parts(&self) -> Vec<MultipartPart> {
        self.parts.clone()
    }
}

fn lookup(pairs: &[(String, String)], name: &str) -> Option<String> {
    pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
}

struct Route {
    method: String,
    path: String,
    once: VecDeque<MockResponse>,
    fallback: Option<MockResponse>,
}

#[derive(Default)]
struct Routes {
    routes: Vec<Route>,
    requests: Vec<RecordedRequest>,
}

impl Routes {
    fn route_mut(&mut self, method: &str, path: &str) -> &mut Route {
        let pos = match self
            .routes
            .iter()
            .position(|r| r.method == method && r.path == path)
        {
            Some(pos) => pos,
            None => {
                self.routes.push(Route {
                    method: method.to_string(),
                    path: path.to_string(),
                    once: VecDeque::new(),
                    fallback: None,
                });
                self.routes.len() - 1
            }
        };
        &mut self.routes[pos]
    }

    fn respond(&mut self, method: &str, path: &str) -> MockResponse {
        self.routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path)
            .and_then(|route| route.once.pop_front().or_else(|| route.fallback.clone()))
            .unwrap_or_else(|| {
                MockResponse::json(
                    404,
                    format!(r#"{{"code":404,"message":"no mock route for {method} {path}"}}"#),
                )
            })
    }
}

type Shared = Arc<Mutex<Routes>>;

fn lock(state: &Shared) -> std::sync::MutexGuard<'_, Routes> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Mock HTTP server bound to an ephemeral localhost port. Stops on drop.
pub struct MockServer {
    url: String,
    state: Shared,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        let state = Shared::default();

        let app = Router::new()
            .fallback(answer)
            .layer(DefaultBodyLimit::disable())
            .with_state(Arc::clone(&state));
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            url: format!("http://{addr}"),
            state,
            handle,
        }
    }

    /// Base URL, without a trailing slash.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Answers every `method path` request with `response`.
    pub fn route(&self, method: &str, path: &str, response: MockResponse) {
        lock(&self.state).route_mut(method, path).fallback = Some(response);
    }

    /// Answers the next `method path` request with `response`, ahead of
    /// the standing route.
    pub fn route_once(&self, method: &str, path: &str, response: MockResponse) {
        lock(&self.state)
            .route_mut(method, path)
            .once
            .push_back(response);
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    /// Requests received for `path`.
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        lock(&self.state)
            .requests
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn answer(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query_pairs): Query<Vec<(String, String)>>,
    request: Request,
) -> Response {
    let mut recorded = RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().unwrap_or_default().to_string(),
        headers: headers
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect(),
        query_pairs,
        ..Default::default()
    };

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if content_type.starts_with("multipart/form-data") {
        let mut multipart = match Multipart::from_request(request, &()).await {
            Ok(multipart) => multipart,
            Err(rejection) => return rejection.into_response(),
        };
        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
            };
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let data = match field.bytes().await {
                Ok(data) => data.to_vec(),
                Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
            };
            recorded.parts.push(MultipartPart {
                name,
                file_name,
                data,
            });
        }
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        match Form::<Vec<(String, String)>>::from_request(request, &()).await {
            Ok(Form(form)) => recorded.form = form,
            Err(rejection) => return rejection.into_response(),
        }
    } else {
        match Bytes::from_request(request, &()).await {
            Ok(body) => recorded.body = body.to_vec(),
            Err(rejection) => return rejection.into_response(),
        }
    }

    let response = {
        let mut routes = lock(&state);
        let response = routes.respond(&recorded.method, &recorded.path);
        routes.requests.push(recorded);
        response
    };
    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        response.body,
    )
        .into_response()
}
