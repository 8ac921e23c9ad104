use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::routing::get;
use axum::{Router, Server};
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use url::Url;

/// A request that reached the fake Pushgateway.
#[derive(Debug, Clone)]
pub(crate) struct RecordedPush {
    pub method: Method,
    pub path: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Clone)]
pub(crate) struct FakeGateway {
    pub url: Url,
    pushes: Arc<Mutex<Vec<RecordedPush>>>,
}

impl FakeGateway {
    pub fn pushes(&self) -> Vec<RecordedPush> {
        self.pushes.lock().unwrap().clone()
    }
}

#[derive(Clone)]
struct GatewayState {
    status: StatusCode,
    pushes: Arc<Mutex<Vec<RecordedPush>>>,
}

/// Start a Pushgateway stand-in that records every request and answers with
/// `status`.
pub(crate) async fn fake_gateway(status: StatusCode) -> FakeGateway {
    let pushes = Arc::new(Mutex::new(Vec::new()));
    let state = GatewayState {
        status,
        pushes: pushes.clone(),
    };

    let app = Router::new().fallback(record_push).with_state(state);
    let addr = serve(app).await;

    FakeGateway {
        url: Url::parse(&format!("http://{addr}")).unwrap(),
        pushes,
    }
}

async fn record_push(
    State(state): State<GatewayState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    state.pushes.lock().unwrap().push(RecordedPush {
        method,
        path: uri.path().to_owned(),
        content_type,
        body: body.to_vec(),
    });

    state.status
}

/// Start a metric source that serves `body` on `/metrics` and fails with a
/// 500 on `/broken`.
pub(crate) async fn fake_source(body: &'static str) -> SocketAddr {
    let app = Router::new()
        .route("/metrics", get(move || async move { body }))
        .route(
            "/broken",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );

    serve(app).await
}

/// An address on which nothing is listening.
pub(crate) fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

async fn serve(app: Router) -> SocketAddr {
    let server = Server::try_bind(&SocketAddr::from(([127, 0, 0, 1], 0)))
        .unwrap()
        .serve(app.into_make_service());
    let addr = server.local_addr();

    tokio::spawn(server);
    addr
}

/// Collects the formatted output of a scoped `tracing` subscriber.
#[derive(Clone, Default)]
pub(crate) struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// A plain text subscriber that writes every event into this capture.
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .finish()
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.buf.lock().unwrap())
            .lines()
            .map(str::to_owned)
            .collect()
    }

    /// Whether a single line contains every one of `needles`.
    pub fn contains(&self, needles: &[&str]) -> bool {
        self.lines()
            .iter()
            .any(|line| needles.iter().all(|needle| line.contains(needle)))
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
