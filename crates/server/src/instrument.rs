//! Token usage instrumentation middleware for HTTP requests.

mod body;

use std::{
    future::Future,
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{body::Body, extract::ConnectInfo};
use body::InstrumentedBody;
use http::{Request, Response, header::CONTENT_LENGTH};
use token_usage::TokenUsageFilter;
use tower::Layer;

#[derive(Clone)]
pub struct TokenUsageLayer(Arc<TokenUsageFilter>);

impl TokenUsageLayer {
    pub fn new(filter: TokenUsageFilter) -> Self {
        Self(Arc::new(filter))
    }
}

impl<Service> Layer<Service> for TokenUsageLayer
where
    Service: Send + Clone,
{
    type Service = TokenUsageService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        TokenUsageService {
            next,
            filter: self.0.clone(),
        }
    }
}

#[derive(Clone)]
pub struct TokenUsageService<Service> {
    next: Service,
    filter: Arc<TokenUsageFilter>,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for TokenUsageService<Service>
where
    Service: tower::Service<Request<ReqBody>, Response = Response<Body>> + Send + Clone + 'static,
    Service::Future: Send,
    ReqBody: Send + 'static,
{
    type Response = Response<Body>;
    type Error = Service::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let mut next = self.next.clone();
        let filter = self.filter.clone();

        Box::pin(async move {
            let target = req.uri().to_string();

            let remote_address = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(address)| address.to_string());

            let Some(context) = filter.on_request_headers(&target, req.headers_mut(), remote_address.as_deref()) else {
                return next.call(req).await;
            };

            let mut response = next.call(req).await?;

            // The instrumented body has a different length than what the upstream announced.
            response.headers_mut().remove(CONTENT_LENGTH);

            Ok(response.map(|body| Body::new(InstrumentedBody::new(body, filter, context))))
        })
    }
}
