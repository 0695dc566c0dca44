use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub access_token_expiration_secs: u64,
    pub refresh_token_expiration_secs: u64,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        // 访问令牌按分钟配置，刷新令牌按天配置
        let access_token_minutes = env::var("ACCESS_TOKEN_EXPIRE_MINUTES")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);
        let refresh_token_days = env::var("REFRESH_TOKEN_EXPIRE_DAYS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(7);
        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            access_token_expiration_secs: access_token_minutes * 60,
            refresh_token_expiration_secs: refresh_token_days * 86400,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            api_base_uri: env::var("API_BASE_URI").unwrap_or_else(|_| "/api/v1".into()),
        })
    }

    pub fn access_token_expiration(&self) -> Duration {
        Duration::from_secs(self.access_token_expiration_secs)
    }

    pub fn refresh_token_expiration(&self) -> Duration {
        Duration::from_secs(self.refresh_token_expiration_secs)
    }
}
