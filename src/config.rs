use std::env;

use uuid::Uuid;

use crate::middleware::auth::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Enforce,
    /// Local development only: requests without a token run as `dev_user`.
    Dev,
}

#[derive(Debug, Clone)]
pub struct DevUser {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Default)]
pub struct MailConfig {
    /// Transactional email HTTP endpoint. When unset, messages are only logged.
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub auth_mode: AuthMode,
    pub dev_user: Option<DevUser>,
    pub mail: MailConfig,
    pub store_name: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;

        let auth_mode = match env::var("AUTH_MODE").as_deref() {
            Ok("dev") => AuthMode::Dev,
            Ok("enforce") | Err(_) => AuthMode::Enforce,
            Ok(other) => anyhow::bail!("unknown AUTH_MODE {other:?}, expected enforce or dev"),
        };

        let dev_user = match env::var("DEV_USER_ID") {
            Ok(id) => Some(DevUser {
                user_id: Uuid::parse_str(&id)?,
                role: env::var("DEV_USER_ROLE")
                    .ok()
                    .and_then(|r| r.parse::<Role>().ok())
                    .unwrap_or(Role::Seller),
            }),
            Err(_) => None,
        };
        if auth_mode == AuthMode::Dev && dev_user.is_none() {
            anyhow::bail!("AUTH_MODE=dev requires DEV_USER_ID");
        }

        let mail = MailConfig {
            api_url: env::var("MAIL_API_URL").ok().filter(|s| !s.is_empty()),
            api_key: env::var("MAIL_API_KEY").ok(),
            from: env::var("MAIL_FROM").unwrap_or_else(|_| "orders@localhost".to_string()),
        };
        let store_name = env::var("STORE_NAME").unwrap_or_else(|_| "Jewelry Store".to_string());

        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            auth_mode,
            dev_user,
            mail,
            store_name,
        })
    }
}
