use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::StreamExt;
use tokio::net::TcpListener;

/// A request as the mock upstream received it.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub method: String,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: String,
}

#[derive(Clone)]
enum MockBody {
    Stream(Vec<String>),
    Json(String),
}

/// Builder for a model server that answers every request with the same response.
pub struct MockUpstream {
    body: MockBody,
    chunk_delay: Duration,
    status: StatusCode,
}

impl MockUpstream {
    /// Answers with an event stream, sending each chunk as its own body frame.
    pub fn streaming<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            body: MockBody::Stream(chunks.into_iter().map(Into::into).collect()),
            chunk_delay: Duration::ZERO,
            status: StatusCode::OK,
        }
    }

    /// Answers with a single JSON document.
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            body: MockBody::Json(body.into()),
            chunk_delay: Duration::ZERO,
            status: StatusCode::OK,
        }
    }

    /// Waits this long before sending each chunk.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub async fn spawn(self) -> anyhow::Result<RunningUpstream> {
        let received = Arc::new(Mutex::new(Vec::new()));

        let state = Arc::new(MockState {
            body: self.body,
            chunk_delay: self.chunk_delay,
            status: self.status,
            received: received.clone(),
        });

        let app = Router::new().fallback(respond).with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server time to start
        tokio::time::sleep(Duration::from_millis(50)).await;

        Ok(RunningUpstream {
            address,
            received,
            _handle: handle,
        })
    }
}

/// A mock upstream serving in the background.
pub struct RunningUpstream {
    pub address: SocketAddr,
    received: Arc<Mutex<Vec<ReceivedRequest>>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl RunningUpstream {
    pub fn url(&self) -> String {
        format!("http://{}", self.address)
    }

    /// Every request received so far, oldest first.
    pub fn received(&self) -> Vec<ReceivedRequest> {
        self.received.lock().unwrap().clone()
    }
}

struct MockState {
    body: MockBody,
    chunk_delay: Duration,
    status: StatusCode,
    received: Arc<Mutex<Vec<ReceivedRequest>>>,
}

async fn respond(State(state): State<Arc<MockState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();

    state.received.lock().unwrap().push(ReceivedRequest {
        method: parts.method.to_string(),
        path_and_query: parts.uri.path_and_query().map(ToString::to_string).unwrap_or_default(),
        headers: parts.headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    match &state.body {
        MockBody::Json(json) => (state.status, [(header::CONTENT_TYPE, "application/json")], json.clone()).into_response(),
        MockBody::Stream(chunks) => {
            let delay = state.chunk_delay;

            let stream = futures::stream::iter(chunks.clone()).then(move |chunk| async move {
                tokio::time::sleep(delay).await;
                Ok::<_, Infallible>(Bytes::from(chunk))
            });

            (
                state.status,
                [(header::CONTENT_TYPE, "text/event-stream")],
                Body::from_stream(stream),
            )
                .into_response()
        }
    }
}
