use futures::future::BoxFuture;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tower::{Layer, Service};

use super::trace::ProbeTrace;
use super::types::TransportErrorKind;

pub const USER_AGENT: &str = concat!("pill/", env!("CARGO_PKG_VERSION"));

/// Why a GET produced no response
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} error: {detail}")]
pub struct TransportFailure {
    pub kind: TransportErrorKind,
    pub detail: String,
}

impl TransportFailure {
    pub fn new(kind: TransportErrorKind, detail: impl Into<String>) -> Self {
        Self { kind, detail: detail.into() }
    }
}

/// Performs one instrumented GET and reports the status code.
///
/// Implementations call the [`ProbeTrace`] hooks as resolution and connection
/// progress, and return once the status line has arrived.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, trace: Arc<ProbeTrace>) -> Result<u16, TransportFailure>;
}

/// reqwest-backed transport.
///
/// A client is built per probe so that the DNS resolver and connector layer
/// report into that probe's trace, and so that every probe measures a fresh
/// connection instead of a pooled one.
pub struct HttpTransport {
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn client(&self, trace: &Arc<ProbeTrace>) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(0)
            .dns_resolver(Arc::new(TracingResolver { trace: trace.clone() }))
            .connector_layer(ConnectTimingLayer { trace: trace.clone() })
            .build()
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, trace: Arc<ProbeTrace>) -> Result<u16, TransportFailure> {
        let client = self
            .client(&trace)
            .map_err(|e| TransportFailure::new(TransportErrorKind::Other, error_chain(&e)))?;

        let response = client.get(url).send().await.map_err(|e| classify(&e, &trace))?;

        Ok(response.status().as_u16())
    }
}

/// Resolver that marks DNS start and completion on the probe's trace
struct TracingResolver {
    trace: Arc<ProbeTrace>,
}

impl Resolve for TracingResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let trace = self.trace.clone();
        let host = name.as_str().to_string();

        Box::pin(async move {
            trace.dns_start();
            match tokio::net::lookup_host((host.as_str(), 0)).await {
                Ok(found) => {
                    trace.dns_done();
                    let addrs: Vec<SocketAddr> = found.collect();
                    Ok(Box::new(addrs.into_iter()) as Addrs)
                }
                Err(e) => {
                    trace.dns_failed();
                    Err(Box::new(e) as Box<dyn StdError + Send + Sync>)
                }
            }
        })
    }
}

/// Connector layer timing connection establishment (TCP plus TLS)
#[derive(Clone)]
struct ConnectTimingLayer {
    trace: Arc<ProbeTrace>,
}

impl<S> Layer<S> for ConnectTimingLayer {
    type Service = ConnectTiming<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ConnectTiming { inner, trace: self.trace.clone() }
    }
}

#[derive(Clone)]
struct ConnectTiming<S> {
    inner: S,
    trace: Arc<ProbeTrace>,
}

impl<S, R> Service<R> for ConnectTiming<S>
where
    R: Send + 'static,
    S: Service<R> + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<S::Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: R) -> Self::Future {
        self.trace.connect_start();
        let trace = self.trace.clone();
        let connecting = self.inner.call(request);

        Box::pin(async move {
            let connected = connecting.await;
            match &connected {
                Ok(_) => trace.connect_done(),
                Err(_) => trace.connect_failed(),
            }
            connected
        })
    }
}

/// Render an error with its sources, outermost first
fn error_chain(error: &dyn StdError) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

fn classify(error: &reqwest::Error, trace: &ProbeTrace) -> TransportFailure {
    let detail = error_chain(error);

    let kind = if trace.resolution_failed() {
        TransportErrorKind::Dns
    } else if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_connect() || trace.connection_failed() {
        if looks_like_tls(&detail) {
            TransportErrorKind::Tls
        } else {
            TransportErrorKind::Connect
        }
    } else if error.is_request() || error.is_body() || error.is_decode() || error.is_redirect() {
        TransportErrorKind::Protocol
    } else {
        TransportErrorKind::Other
    };

    TransportFailure { kind, detail }
}

fn looks_like_tls(detail: &str) -> bool {
    let lowered = detail.to_ascii_lowercase();
    ["certificate", "tls", "handshake", "ssl"].iter().any(|needle| lowered.contains(needle))
}
