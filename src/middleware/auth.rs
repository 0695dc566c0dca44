use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{
    AppState,
    utils::{self, EmptyResponse, TokenKind, error_codes, error_to_api_response},
};

/// 认证中间件：校验访问令牌并把声明写入请求扩展
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(TypedHeader(bearer)) = bearer else {
        return unauthorized("缺少认证令牌");
    };

    // 受保护路由只接受访问令牌，刷新令牌在这里同样会被拒绝
    match utils::verify_token(bearer.token(), TokenKind::Access, &state.config) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!("Token verification failed: {}", e);
            unauthorized("认证令牌无效或已过期")
        }
    }
}

fn unauthorized(msg: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        error_to_api_response::<EmptyResponse>(error_codes::AUTH_FAILED, msg.to_string()),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Claims;

    #[test]
    fn test_unauthorized_response_status() {
        let response = unauthorized("缺少认证令牌");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_claims_stored_in_extensions() {
        let mut req = Request::new(axum::body::Body::empty());
        assert!(req.extensions().get::<Claims>().is_none());

        let claims = Claims {
            sub: "42".into(),
            username: "alice".into(),
            exp: 1234567890,
            kind: TokenKind::Access,
        };
        req.extensions_mut().insert(claims);

        let stored = req.extensions().get::<Claims>().unwrap();
        assert_eq!(stored.username, "alice");
    }
}
