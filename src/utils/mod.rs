use axum::Json;
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

/// 令牌类型，写入JWT的type声明
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    #[serde(rename = "access")]
    Access,
    #[serde(rename = "refresh")]
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,      // 用户ID
    pub username: String, // 用户名
    pub exp: i64,         // 过期时间
    #[serde(rename = "type")]
    pub kind: TokenKind, // 令牌类型
}

pub fn generate_token(
    user_id: &str,
    username: &str,
    kind: TokenKind,
    config: &Config,
) -> Result<(String, i64), jsonwebtoken::errors::Error> {
    let ttl = match kind {
        TokenKind::Access => config.access_token_expiration(),
        TokenKind::Refresh => config.refresh_token_expiration(),
    };
    let expiration = Utc::now()
        .checked_add_signed(Duration::seconds(ttl.as_secs() as i64))
        .expect("valid timestamp")
        .timestamp();

    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        exp: expiration,
        kind,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    Ok((token, expiration))
}

pub fn verify_token(
    token: &str,
    expected_kind: TokenKind,
    config: &Config,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    // 类型不符的令牌一律视为无效，调用方统一按未授权处理
    if token_data.claims.kind != expected_kind {
        return Err(ErrorKind::InvalidToken.into());
    }

    Ok(token_data.claims)
}

/// 通用的API响应结构
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// 错误码，0表示成功，非0表示失败
    pub code: i32,
    /// 错误消息，成功时为"success"
    pub msg: String,
    /// 响应数据，错误时为None
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resp_data: Option<T>,
}

/// 空响应类型（用于无响应数据的API）
#[derive(Debug, Serialize, Deserialize)]
pub struct EmptyResponse {}

// 所有 handler 返回类型为 Json<ApiResponse<T>>
pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: error_codes::SUCCESS,
        msg: "success".into(),
        resp_data: Some(data),
    })
}

pub fn error_to_api_response<T>(code: i32, msg: String) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code,
        msg,
        resp_data: None,
    })
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const VALIDATION_ERROR: i32 = 1000;
    pub const USER_EXISTS: i32 = 1001;
    pub const AUTH_FAILED: i32 = 1002;
    pub const INTERNAL_ERROR: i32 = 5000;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            database_url: "postgres://localhost/okr_test".into(),
            jwt_secret: "test-secret-key-12345".into(),
            access_token_expiration_secs: 3600,
            refresh_token_expiration_secs: 7 * 86400,
            server_host: "127.0.0.1".into(),
            server_port: 8000,
            api_base_uri: "/api/v1".into(),
        }
    }

    #[test]
    fn test_generate_and_verify_access_token() {
        let config = test_config();

        let (token, expiration) =
            generate_token("42", "alice", TokenKind::Access, &config).unwrap();
        assert!(!token.is_empty());
        assert!(expiration > Utc::now().timestamp());

        let claims = verify_token(&token, TokenKind::Access, &config).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.exp, expiration);
    }

    #[test]
    fn test_token_kind_mismatch_rejected() {
        let config = test_config();

        let (access_token, _) =
            generate_token("42", "alice", TokenKind::Access, &config).unwrap();
        let (refresh_token, _) =
            generate_token("42", "alice", TokenKind::Refresh, &config).unwrap();

        assert!(verify_token(&access_token, TokenKind::Refresh, &config).is_err());
        assert!(verify_token(&refresh_token, TokenKind::Access, &config).is_err());

        // 各自按本来的类型校验仍然有效
        assert!(verify_token(&access_token, TokenKind::Access, &config).is_ok());
        assert!(verify_token(&refresh_token, TokenKind::Refresh, &config).is_ok());
    }

    #[test]
    fn test_expired_token_rejected() {
        let config = test_config();

        let claims = Claims {
            sub: "42".into(),
            username: "alice".into(),
            exp: Utc::now().timestamp() - 3600,
            kind: TokenKind::Access,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();

        assert!(verify_token(&token, TokenKind::Access, &config).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let config = test_config();
        let mut other = test_config();
        other.jwt_secret = "another-secret".into();

        let (token, _) = generate_token("42", "alice", TokenKind::Access, &config).unwrap();

        assert!(verify_token(&token, TokenKind::Access, &other).is_err());
        assert!(verify_token("invalid.token.here", TokenKind::Access, &config).is_err());
    }

    #[test]
    fn test_claims_serialize_type_field() {
        let claims = Claims {
            sub: "42".into(),
            username: "alice".into(),
            exp: 1234567890,
            kind: TokenKind::Refresh,
        };

        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["type"], "refresh");
        assert_eq!(json["sub"], "42");
        assert_eq!(json["username"], "alice");

        assert_eq!(TokenKind::Access.as_str(), "access");
        assert_eq!(TokenKind::Refresh.as_str(), "refresh");
    }

    #[test]
    fn test_password_hash_and_verify() {
        let hashed = hash_password("correct horse battery staple").unwrap();

        assert!(verify_password("correct horse battery staple", &hashed).unwrap());
        assert!(!verify_password("wrong password", &hashed).unwrap());
    }

    #[test]
    fn test_password_hash_is_salted() {
        let first = hash_password("hunter2").unwrap();
        let second = hash_password("hunter2").unwrap();

        // 相同明文两次哈希结果不同，但都能通过校验
        assert_ne!(first, second);
        assert!(verify_password("hunter2", &first).unwrap());
        assert!(verify_password("hunter2", &second).unwrap());
    }
}
