//! Derives the rate limiting identity of every request.
//!
//! The identity is stored as a request extension for the handlers.

use std::{
    fmt::Display,
    future::Future,
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{body::Body, extract::ConnectInfo};
use config::ClientIdentityConfig;
use http::{Request, Response};
use rate_limit::ClientIdentity;
use tower::Layer;

#[derive(Clone)]
pub struct ClientIdentityLayer(Arc<ClientIdentityConfig>);

impl ClientIdentityLayer {
    pub fn new(config: ClientIdentityConfig) -> Self {
        Self(Arc::new(config))
    }
}

impl<Service> Layer<Service> for ClientIdentityLayer
where
    Service: Send + Clone,
{
    type Service = ClientIdentityService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        ClientIdentityService {
            next,
            config: self.0.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ClientIdentityService<Service> {
    next: Service,
    config: Arc<ClientIdentityConfig>,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for ClientIdentityService<Service>
where
    Service: tower::Service<Request<ReqBody>, Response = Response<Body>> + Send + Clone + 'static,
    Service::Future: Send,
    Service::Error: Display + 'static,
    ReqBody: http_body::Body + Send + 'static,
{
    type Response = Response<Body>;
    type Error = Service::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let mut next = self.next.clone();
        let identity = extract_identity(&req, &self.config);

        log::debug!("Request identified as '{identity}'");
        req.extensions_mut().insert(identity);

        Box::pin(async move { next.call(req).await })
    }
}

/// The first non-empty trusted header, then the peer address, then the shared
/// unknown identity.
fn extract_identity<B>(req: &Request<B>, config: &ClientIdentityConfig) -> ClientIdentity {
    for header in &config.trusted_headers {
        let value = req
            .headers()
            .get(header.as_str())
            .and_then(|value| value.to_str().ok())
            // Proxies append to X-Forwarded-For, the original client comes first.
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        if let Some(value) = value {
            return ClientIdentity::new(value);
        }
    }

    match req.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => ClientIdentity::new(addr.ip().to_string()),
        None => ClientIdentity::unknown(),
    }
}
