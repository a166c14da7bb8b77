use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use std::time::Instant;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};

/// Short label for a response status, used as the log message.
fn outcome(status: StatusCode) -> &'static str {
    if status.is_server_error() {
        "request failed"
    } else if status.is_client_error() {
        "request rejected"
    } else {
        "request completed"
    }
}

pub async fn log_request(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let req_id: String = request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    tracing::debug!(request_id = %req_id, method = %method, path = %path, "incoming request");

    let response = next.run(request).await;

    let status = response.status();
    let duration_ms = start.elapsed().as_millis() as u64;
    let message = outcome(status);

    if status.is_server_error() {
        tracing::error!(
            request_id = %req_id,
            method = %method,
            path = %path,
            status = %status,
            duration_ms,
            "{}",
            message
        );
    } else if status.is_client_error() {
        tracing::warn!(
            request_id = %req_id,
            method = %method,
            path = %path,
            status = %status,
            duration_ms,
            "{}",
            message
        );
    } else {
        tracing::info!(
            request_id = %req_id,
            method = %method,
            path = %path,
            status = %status,
            duration_ms,
            "{}",
            message
        );
    }

    response
}

pub fn request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request as HttpRequest, middleware, routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome(StatusCode::OK), "request completed");
        assert_eq!(outcome(StatusCode::NOT_FOUND), "request rejected");
        assert_eq!(outcome(StatusCode::BAD_GATEWAY), "request failed");
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(propagate_request_id_layer())
            .layer(middleware::from_fn(log_request))
            .layer(request_id_layer());

        let res = app
            .oneshot(HttpRequest::get("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_failed_and_rejected_requests_pass_through() {
        let app = Router::new()
            .route("/boom", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
            .layer(middleware::from_fn(log_request))
            .layer(request_id_layer());

        let res = app
            .clone()
            .oneshot(HttpRequest::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let res = app
            .oneshot(HttpRequest::get("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
