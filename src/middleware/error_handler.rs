use axum::{
    body::{Body, to_bytes},
    http::Request,
    middleware::Next,
    response::Response,
};

/// Largest error body copied into the log line.
const LOGGED_BODY_LIMIT: usize = 2048;

/// Logs ingress requests the relay failed to accept.
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let response = next.run(req).await;
    let status = response.status();

    if status.is_client_error() {
        tracing::warn!(%method, %path, status = status.as_u16(), "event rejected");
        return response;
    }
    if !status.is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, LOGGED_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(%method, %path, "failed to read error response body: {}", e);
            return Response::from_parts(parts, Body::empty());
        }
    };
    tracing::error!(
        %method,
        %path,
        status = status.as_u16(),
        body = %String::from_utf8_lossy(&bytes),
        "ingress request failed"
    );

    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}
