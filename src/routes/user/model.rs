use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::utils::{hash_password, verify_password};

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "bearer".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

impl User {
    pub async fn create(pool: &PgPool, req: CreateUserRequest) -> Result<Self, sqlx::Error> {
        let hashed_password = hash_password(&req.password)
            .map_err(|e| sqlx::Error::Protocol(format!("Failed to hash password: {}", e)))?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, hashed_password, created_at, updated_at)
            VALUES ($1, $2, $3, $4, now(), now())
            RETURNING id, username, email, hashed_password, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&req.username)
        .bind(&req.email)
        .bind(&hashed_password)
        .fetch_one(pool)
        .await?;

        tracing::info!("Created user: {}", user.username);
        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, hashed_password, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, hashed_password, created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, hashed_password, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub fn verify_login(&self, password: &str) -> Result<bool, bcrypt::BcryptError> {
        verify_password(password, &self.hashed_password)
    }

    pub async fn update_password(
        pool: &PgPool,
        id: Uuid,
        new_password: &str,
    ) -> Result<Self, sqlx::Error> {
        let hashed_password = hash_password(new_password)
            .map_err(|e| sqlx::Error::Protocol(format!("Failed to hash password: {}", e)))?;

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET hashed_password = $1, updated_at = now()
            WHERE id = $2
            RETURNING id, username, email, hashed_password, created_at, updated_at
            "#,
        )
        .bind(&hashed_password)
        .bind(id)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            hashed_password: "secret-hash".into(),
            created_at: None,
            updated_at: None,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("hashed_password").is_none());
        assert_eq!(json["username"], "alice");
        assert_eq!(json["email"], "alice@example.com");
    }

    #[test]
    fn test_token_response_is_bearer() {
        let resp = TokenResponse::bearer("a".into(), "r".into());
        assert_eq!(resp.token_type, "bearer");
        assert_eq!(resp.access_token, "a");
        assert_eq!(resp.refresh_token, "r");
    }
}
