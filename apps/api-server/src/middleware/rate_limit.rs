//! Per-client rate limiting middleware.

use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use quill_core::ports::RateLimiter;
use quill_shared::ErrorResponse;

/// Rate limiting middleware factory.
///
/// Clients are keyed by the socket peer address. `X-Forwarded-For` and
/// `Forwarded` are only honoured when `trust_proxy` is set, since any client
/// can send them.
pub struct RateLimitMiddleware {
    limiter: Arc<dyn RateLimiter>,
    trust_proxy: bool,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Arc<dyn RateLimiter>, trust_proxy: bool) -> Self {
        Self {
            limiter,
            trust_proxy,
        }
    }
}

fn client_key(req: &ServiceRequest, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(addr) = req.connection_info().realip_remote_addr() {
            return addr.to_string();
        }
    }

    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            trust_proxy: self.trust_proxy,
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: Arc<dyn RateLimiter>,
    trust_proxy: bool,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let limiter = self.limiter.clone();

        let key = client_key(&req, self.trust_proxy);

        Box::pin(async move {
            match limiter.check(&key).await {
                Ok(result) if !result.allowed => {
                    tracing::warn!(client = %key, "Rate limit exceeded");

                    let retry_after = result.reset_after.as_secs().max(1);
                    let error = ErrorResponse::too_many_requests(format!(
                        "Rate limit exceeded. Try again in {} seconds.",
                        retry_after
                    ));
                    let response = HttpResponse::TooManyRequests()
                        .insert_header(("X-RateLimit-Remaining", "0"))
                        .insert_header(("Retry-After", retry_after.to_string()))
                        .json(error);

                    Ok(req.into_response(response).map_into_right_body())
                }
                Ok(_) => Ok(service.call(req).await?.map_into_left_body()),
                Err(e) => {
                    // Fail open
                    tracing::error!(error = %e, "Rate limiter error");
                    Ok(service.call(req).await?.map_into_left_body())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use actix_web::{App, HttpResponse, http::StatusCode, test, web};
    use quill_infra::{InMemoryRateLimiter, RateLimitConfig};

    use super::*;

    fn limiter(max_requests: u32) -> Arc<dyn RateLimiter> {
        Arc::new(InMemoryRateLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(60),
        }))
    }

    fn from_peer(peer: &str) -> test::TestRequest {
        let addr: SocketAddr = peer.parse().unwrap();
        test::TestRequest::get().uri("/").peer_addr(addr)
    }

    macro_rules! init_app {
        ($max:expr, $trust_proxy:expr) => {
            test::init_service(
                App::new()
                    .wrap(RateLimitMiddleware::new(limiter($max), $trust_proxy))
                    .route("/", web::get().to(|| async { HttpResponse::Ok().finish() })),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_rejects_after_burst() {
        let app = init_app!(2, false);

        for _ in 0..2 {
            let res = test::call_service(&app, from_peer("10.0.0.1:5000").to_request()).await;
            assert_eq!(res.status(), StatusCode::OK);
        }

        let res = test::call_service(&app, from_peer("10.0.0.1:5000").to_request()).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(res.headers().contains_key("retry-after"));
    }

    #[actix_web::test]
    async fn test_forwarded_headers_ignored_by_default() {
        let app = init_app!(1, false);

        let mut allowed = 0;
        for i in 0..20 {
            let req = from_peer("10.0.0.1:5000")
                .insert_header(("x-forwarded-for", format!("203.0.113.{i}")))
                .insert_header(("forwarded", format!("for=198.51.100.{i}")))
                .to_request();
            if test::call_service(&app, req).await.status() == StatusCode::OK {
                allowed += 1;
            }
        }

        assert_eq!(allowed, 1);
    }

    #[actix_web::test]
    async fn test_peers_are_limited_independently() {
        let app = init_app!(1, false);

        let res = test::call_service(&app, from_peer("10.0.0.1:5000").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
        // Same host on another port shares the budget
        let res = test::call_service(&app, from_peer("10.0.0.1:6000").to_request()).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

        let res = test::call_service(&app, from_peer("10.0.0.2:5000").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_forwarded_for_used_behind_trusted_proxy() {
        let app = init_app!(1, true);

        for client in ["203.0.113.1", "203.0.113.2"] {
            let req = from_peer("10.0.0.254:5000")
                .insert_header(("x-forwarded-for", client))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        }

        let req = from_peer("10.0.0.254:5000")
            .insert_header(("x-forwarded-for", "203.0.113.1"))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
