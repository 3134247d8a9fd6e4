use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// HTTP endpoint of the transactional mail provider. When unset the
    /// mailer degrades to a logging noop (local development).
    pub endpoint: Option<String>,
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub otp_ttl_minutes: i64,
    /// Folder where item images land, referenced by filename.
    pub images_dir: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "threadswap".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "threadswap-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(30),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 30),
        };
        let mail = MailConfig {
            endpoint: std::env::var("MAIL_ENDPOINT").ok(),
            api_key: std::env::var("MAIL_API_KEY").unwrap_or_default(),
            from: std::env::var("MAIL_FROM").unwrap_or_else(|_| "no-reply@threadswap.app".into()),
        };
        let otp_ttl_minutes = std::env::var("OTP_TTL_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(10);
        let images_dir =
            std::env::var("IMAGES_DIR").unwrap_or_else(|_| "uploads/cloth-images".into());
        Ok(Self {
            database_url,
            jwt,
            mail,
            otp_ttl_minutes,
            images_dir,
        })
    }
}
