//! Pass-through forwarding to the upstream model server.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    response::{IntoResponse, Response},
};
use http::{HeaderMap, StatusCode, Uri, header};
use url::Url;

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Debug, thiserror::Error)]
pub(crate) enum ForwardError {
    #[error("failed to read request body: {0}")]
    RequestBody(axum::Error),
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ForwardError::RequestBody(_) => (StatusCode::BAD_REQUEST, "Bad request"),
            ForwardError::Upstream(_) => (StatusCode::BAD_GATEWAY, "Bad gateway"),
        };

        (status, [(header::CONTENT_TYPE, "text/plain")], message).into_response()
    }
}

/// The upstream every request is forwarded to.
pub(crate) struct Upstream {
    client: reqwest::Client,
    base_url: Url,
}

impl Upstream {
    pub(crate) fn new(base_url: Url) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;

        Ok(Self { client, base_url })
    }

    /// Maps a request URI onto the upstream, appending its path to the base path.
    fn target(&self, uri: &Uri) -> Url {
        let mut url = self.base_url.clone();
        let path = format!("{}{}", self.base_url.path().trim_end_matches('/'), uri.path());

        url.set_path(&path);
        url.set_query(uri.query());

        url
    }

    async fn forward(&self, request: Request) -> Result<Response, ForwardError> {
        let (parts, body) = request.into_parts();
        let target = self.target(&parts.uri);

        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(ForwardError::RequestBody)?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        log::debug!("forwarding {} {} to {target}", parts.method, parts.uri);

        let upstream_response = self
            .client
            .request(parts.method, target)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = upstream_response.status();
        let mut headers = upstream_response.headers().clone();
        strip_hop_by_hop(&mut headers);

        let mut response = Response::new(Body::from_stream(upstream_response.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;

        Ok(response)
    }
}

pub(crate) async fn handler(State(upstream): State<Arc<Upstream>>, request: Request) -> Result<Response, ForwardError> {
    upstream.forward(request).await.inspect_err(|e| log::error!("{e}"))
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(base: &str) -> Upstream {
        Upstream::new(base.parse().unwrap()).unwrap()
    }

    #[test]
    fn target_keeps_path_and_query() {
        let upstream = upstream("http://127.0.0.1:9000");
        let uri: Uri = "/v1/chat/completions?stream=true".parse().unwrap();

        insta::assert_snapshot!(upstream.target(&uri), @"http://127.0.0.1:9000/v1/chat/completions?stream=true");
    }

    #[test]
    fn target_appends_to_base_path() {
        let upstream = upstream("http://models.internal/openai/");
        let uri: Uri = "/v1/embeddings".parse().unwrap();

        insta::assert_snapshot!(upstream.target(&uri), @"http://models.internal/openai/v1/embeddings");
    }

    #[test]
    fn hop_by_hop_headers_are_removed() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, "keep-alive".parse().unwrap());
        headers.insert("keep-alive", "timeout=5".parse().unwrap());
        headers.insert(header::TRANSFER_ENCODING, "chunked".parse().unwrap());
        headers.insert(header::CONTENT_TYPE, "text/event-stream".parse().unwrap());

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
    }

    #[test]
    fn unreadable_request_body_is_bad_request() {
        let response = ForwardError::RequestBody(axum::Error::new("boom")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
