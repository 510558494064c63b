#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{http::Method, Router};

use flow_gateway::auth::TokenAuthority;
use flow_gateway::middleware::{MetricsSink, OriginMode, OriginPolicy};
use flow_gateway::pipeline::{Pipeline, PipelineServices};
use flow_gateway::services::{PermissionAnswer, PermissionChecker, PermissionError, PermissionQuery};

pub const SECRET: &[u8] = b"test-secret";

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Serve `router` in-process on a free port.
pub async fn spawn(router: Router) -> Result<TestServer> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .context("failed to bind test listener")?;

    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    Ok(TestServer { port, base_url: format!("http://127.0.0.1:{}", port) })
}

/// Send `GET target` byte-for-byte, bypassing client-side URL normalization,
/// and return the raw response text.
pub async fn raw_get(server: &TestServer, target: &str) -> Result<String> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", server.port)).await?;
    let request = format!("GET {} HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n\r\n", target);
    stream.write_all(request.as_bytes()).await?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;
    Ok(String::from_utf8_lossy(&response).into_owned())
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricEvent {
    Duration { method: String, path: String },
    Hit { method: String, path: String, status: u16 },
    Error { method: String, path: String, description: String },
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MetricEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: MetricEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl MetricsSink for RecordingSink {
    fn observe_duration(&self, method: &str, path: &str, _elapsed: Duration) {
        self.push(MetricEvent::Duration { method: method.into(), path: path.into() });
    }

    fn increment_hits(&self, method: &str, path: &str, status: u16) {
        self.push(MetricEvent::Hit { method: method.into(), path: path.into(), status });
    }

    fn increment_errors(&self, method: &str, path: &str, description: &str) {
        self.push(MetricEvent::Error {
            method: method.into(),
            path: path.into(),
            description: description.into(),
        });
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Verdict {
    Allow,
    Deny,
    Fail,
    Hang,
}

/// Permission service double that answers with a fixed verdict.
pub struct StubChecker {
    verdict: Verdict,
    queries: Mutex<Vec<PermissionQuery>>,
    in_flight: AtomicUsize,
}

impl StubChecker {
    pub fn new(verdict: Verdict) -> Arc<Self> {
        Arc::new(Self { verdict, queries: Mutex::new(Vec::new()), in_flight: AtomicUsize::new(0) })
    }

    pub fn queries(&self) -> Vec<PermissionQuery> {
        self.queries.lock().unwrap().clone()
    }

    /// Checks started but neither finished nor dropped.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight count however the check ends, including being dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PermissionChecker for StubChecker {
    async fn check_access(&self, query: &PermissionQuery) -> Result<PermissionAnswer, PermissionError> {
        self.queries.lock().unwrap().push(query.clone());
        let _guard = InFlight::enter(&self.in_flight);
        match self.verdict {
            Verdict::Allow => Ok(PermissionAnswer { has_access: true }),
            Verdict::Deny => Ok(PermissionAnswer { has_access: false }),
            Verdict::Fail => Err(PermissionError::Rejected(503)),
            Verdict::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(PermissionAnswer { has_access: true })
            }
        }
    }
}

pub struct Fixture {
    pub pipeline: Pipeline,
    pub authority: Arc<TokenAuthority>,
    pub sink: Arc<RecordingSink>,
    pub checker: Arc<StubChecker>,
}

pub fn fixture(origins: &[&str], mode: OriginMode, verdict: Verdict) -> Fixture {
    fixture_with_timeout(origins, mode, verdict, Duration::from_millis(200))
}

pub fn fixture_with_timeout(
    origins: &[&str],
    mode: OriginMode,
    verdict: Verdict,
    permission_timeout: Duration,
) -> Fixture {
    let authority = Arc::new(TokenAuthority::new(SECRET, chrono::Duration::hours(1)).unwrap());
    let sink = Arc::new(RecordingSink::default());
    let checker = StubChecker::new(verdict);

    let services = PipelineServices {
        authority: authority.clone(),
        origin_policy: Arc::new(OriginPolicy::new(
            origins.iter().map(|o| o.to_string()).collect(),
            mode,
        )),
        metrics: sink.clone(),
        permissions: checker.clone(),
        protected_prefix: "/static/img/".into(),
        permission_timeout,
    };

    Fixture { pipeline: Pipeline::new(services), authority, sink, checker }
}

/// Permissive fixture whose permission service always allows.
pub fn default_fixture() -> Fixture {
    fixture(&[], OriginMode::Permissive, Verdict::Allow)
}

pub fn all_methods() -> Vec<Method> {
    vec![
        Method::GET,
        Method::HEAD,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ]
}

/// Counts how often the terminal handler actually ran.
#[derive(Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
