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
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Base URL of the frontend; verification/reset links and the OAuth
    /// post-login redirect point here.
    pub frontend_url: String,
    /// `Secure` flag on auth cookies. Only turn off for plain-http local dev.
    pub cookie_secure: bool,
    pub jwt: JwtConfig,
    pub smtp: Option<SmtpConfig>,
    pub google: Option<GoogleConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".into());
        let cookie_secure = std::env::var("COOKIE_SECURE")
            .map(|v| v != "false")
            .unwrap_or(true);
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "inkpost".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "inkpost-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(15),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 7),
        };
        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                port: std::env::var("SMTP_PORT")
                    .ok()
                    .and_then(|v| v.parse::<u16>().ok())
                    .unwrap_or(465),
                username: std::env::var("SMTP_USERNAME")?,
                password: std::env::var("SMTP_PASSWORD")?,
                from: std::env::var("SMTP_FROM")?,
            }),
            Err(_) => None,
        };
        let google = match std::env::var("GOOGLE_CLIENT_ID") {
            Ok(client_id) => Some(GoogleConfig {
                client_id,
                client_secret: std::env::var("GOOGLE_CLIENT_SECRET")?,
                redirect_uri: std::env::var("GOOGLE_REDIRECT_URI")?,
            }),
            Err(_) => None,
        };
        Ok(Self {
            database_url,
            frontend_url,
            cookie_secure,
            jwt,
            smtp,
            google,
        })
    }
}
