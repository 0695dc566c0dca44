use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};

pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let response = next.run(req).await;

    // 认证失败只记录路径，不读取响应体
    if response.status() == StatusCode::UNAUTHORIZED {
        debug!("Unauthorized request rejected - Path: {}", path);
        return response;
    }

    if response.status().is_server_error() {
        let (mut parts, body) = response.into_parts();
        let bytes = match to_bytes(body, 4096).await {
            Ok(b) => b,
            Err(e) => {
                error!("Failed to read error response body: {}", e);
                return Response::from_parts(parts, Body::empty());
            }
        };
        let body_str = String::from_utf8_lossy(&bytes);

        error!(
            "Server error occurred - Path: {}, Status: {}, Body: {}",
            path, parts.status, body_str
        );

        // 重置body以便重新构建响应
        parts.headers.remove(axum::http::header::CONTENT_LENGTH);
        Response::from_parts(parts, Body::from(bytes))
    } else {
        response
    }
}
