use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    AppState,
    utils::{
        Claims, EmptyResponse, TokenKind, error_codes, error_to_api_response, generate_token,
        success_to_api_response, verify_token,
    },
};

use super::model::{
    ChangePasswordRequest, CreateUserRequest, LoginRequest, RefreshTokenRequest, TokenResponse,
    User,
};

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> impl IntoResponse {
    // 检查用户名格式
    if req.username.is_empty()
        || !req.username.chars().all(|c| c.is_alphanumeric() || c == '_')
    {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "用户名格式无效，只允许使用字母、数字和下划线".to_string(),
            ),
        );
    }

    if req.password.len() < 6 || req.password.len() > 24 {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "密码长度必须在6到24个字符之间".to_string(),
            ),
        );
    }

    // 用户名和邮箱都不允许重复
    match User::find_by_username(&state.pool, &req.username).await {
        Ok(Some(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                error_to_api_response(error_codes::USER_EXISTS, "用户名已被注册".to_string()),
            );
        }
        Ok(None) => {}
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "数据库错误".to_string()),
            );
        }
    }

    match User::find_by_email(&state.pool, &req.email).await {
        Ok(Some(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                error_to_api_response(error_codes::USER_EXISTS, "邮箱已被注册".to_string()),
            );
        }
        Ok(None) => {}
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "数据库错误".to_string()),
            );
        }
    }

    match User::create(&state.pool, req).await {
        Ok(user) => (StatusCode::CREATED, success_to_api_response(user)),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, "创建用户失败".to_string()),
        ),
    }
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let user = match User::find_by_username(&state.pool, &req.username).await {
        Ok(Some(user)) => user,
        // 用户不存在和密码错误返回同样的提示
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                error_to_api_response(error_codes::AUTH_FAILED, "用户名或密码错误".to_string()),
            );
        }
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "数据库错误".to_string()),
            );
        }
    };

    // 验证密码
    match user.verify_login(&req.password) {
        Ok(true) => (),
        Ok(false) => {
            return (
                StatusCode::UNAUTHORIZED,
                error_to_api_response(error_codes::AUTH_FAILED, "用户名或密码错误".to_string()),
            );
        }
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "密码校验失败".to_string()),
            );
        }
    }

    // 签发访问令牌和刷新令牌
    let user_id = user.id.to_string();
    let tokens = generate_token(&user_id, &user.username, TokenKind::Access, &state.config)
        .and_then(|(access, _)| {
            generate_token(&user_id, &user.username, TokenKind::Refresh, &state.config)
                .map(|(refresh, _)| (access, refresh))
        });

    match tokens {
        Ok((access_token, refresh_token)) => (
            StatusCode::OK,
            success_to_api_response(TokenResponse::bearer(access_token, refresh_token)),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, "生成令牌失败".to_string()),
        ),
    }
}

#[axum::debug_handler]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> impl IntoResponse {
    // 只接受刷新令牌，访问令牌在这里会因类型不符被拒绝
    let claims = match verify_token(&req.refresh_token, TokenKind::Refresh, &state.config) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!("Refresh token rejected: {}", e);
            return (
                StatusCode::UNAUTHORIZED,
                error_to_api_response(
                    error_codes::AUTH_FAILED,
                    "刷新令牌无效或已过期".to_string(),
                ),
            );
        }
    };

    // 每次刷新同时轮换刷新令牌
    let tokens = generate_token(&claims.sub, &claims.username, TokenKind::Access, &state.config)
        .and_then(|(access, _)| {
            generate_token(&claims.sub, &claims.username, TokenKind::Refresh, &state.config)
                .map(|(refresh, _)| (access, refresh))
        });

    match tokens {
        Ok((access_token, refresh_token)) => (
            StatusCode::OK,
            success_to_api_response(TokenResponse::bearer(access_token, refresh_token)),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, "生成令牌失败".to_string()),
        ),
    }
}

/// 返回当前令牌对应的用户信息，用户已被删除时按未授权处理
#[axum::debug_handler]
pub async fn me(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                error_to_api_response(error_codes::AUTH_FAILED, "认证令牌无效".to_string()),
            );
        }
    };

    match User::find_by_id(&state.pool, user_id).await {
        Ok(Some(user)) => (StatusCode::OK, success_to_api_response(user)),
        Ok(None) => (
            StatusCode::UNAUTHORIZED,
            error_to_api_response(error_codes::AUTH_FAILED, "用户不存在".to_string()),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, "数据库错误".to_string()),
        ),
    }
}

#[axum::debug_handler]
pub async fn change_password(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<ChangePasswordRequest>,
) -> impl IntoResponse {
    // 验证密码长度
    if req.new_password.len() < 6 || req.new_password.len() > 24 {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "密码长度必须在6到24个字符之间".to_string(),
            ),
        );
    }

    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                error_to_api_response(error_codes::AUTH_FAILED, "认证令牌无效".to_string()),
            );
        }
    };

    let user = match User::find_by_id(&state.pool, user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                error_to_api_response(error_codes::AUTH_FAILED, "用户不存在".to_string()),
            );
        }
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "数据库错误".to_string()),
            );
        }
    };

    // 修改前先校验当前密码
    match user.verify_login(&req.current_password) {
        Ok(true) => (),
        Ok(false) => {
            return (
                StatusCode::BAD_REQUEST,
                error_to_api_response(error_codes::AUTH_FAILED, "当前密码不正确".to_string()),
            );
        }
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "密码校验失败".to_string()),
            );
        }
    }

    match User::update_password(&state.pool, user_id, &req.new_password).await {
        Ok(_) => (StatusCode::OK, success_to_api_response(EmptyResponse {})),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, "修改密码失败".to_string()),
        ),
    }
}
