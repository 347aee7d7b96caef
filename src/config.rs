use serde::Deserialize;

/// Secret and lifetime of one class of token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access: TokenConfig,
    pub refresh: TokenConfig,
    pub issuer: String,
    pub audience: String,
}

/// S3-compatible bucket that holds avatars and cover images.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub media: MediaConfig,
}

fn minutes_from_env(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;

        let jwt = JwtConfig {
            access: TokenConfig {
                secret: std::env::var("ACCESS_TOKEN_SECRET")?,
                ttl_minutes: minutes_from_env("ACCESS_TOKEN_TTL_MINUTES", 60 * 24),
            },
            refresh: TokenConfig {
                secret: std::env::var("REFRESH_TOKEN_SECRET")?,
                ttl_minutes: minutes_from_env("REFRESH_TOKEN_TTL_MINUTES", 60 * 24 * 10),
            },
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "account-service".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "account-service-users".into()),
        };
        jwt.ensure_independent_secrets()?;

        let endpoint = std::env::var("MEDIA_ENDPOINT")?;
        let bucket = std::env::var("MEDIA_BUCKET")?;
        let public_url = std::env::var("MEDIA_PUBLIC_URL")
            .unwrap_or_else(|_| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));
        let media = MediaConfig {
            access_key: std::env::var("MEDIA_ACCESS_KEY")?,
            secret_key: std::env::var("MEDIA_SECRET_KEY")?,
            region: std::env::var("MEDIA_REGION").unwrap_or_else(|_| "us-east-1".into()),
            public_url: public_url.trim_end_matches('/').to_string(),
            endpoint,
            bucket,
        };

        Ok(Self {
            database_url,
            jwt,
            media,
        })
    }
}

impl JwtConfig {
    /// Access and refresh tokens must not be interchangeable.
    pub fn ensure_independent_secrets(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.access.secret.is_empty() && !self.refresh.secret.is_empty(),
            "token secrets must not be empty"
        );
        anyhow::ensure!(
            self.access.secret != self.refresh.secret,
            "ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ"
        );
        Ok(())
    }
}
