use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env_mode: String,
    pub allowed_origins: Vec<String>,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
    /// MongoDB connection URL.
    pub mongodb_url: String,
    pub mongodb_db: String,
    /// Base URL of the hosted frontend, used to build payment redirect URLs.
    pub frontend_url: String,
    /// Display name used as the payee name in UPI deep links.
    pub upi_payee_name: String,
    pub identity: IdentityConfig,
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
    /// User ids allowed to act on verification records.
    pub moderator_ids: Vec<String>,
}

/// External identity provider (REST) credentials.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub base_url: String,
    pub api_key: String,
}

/// Payment gateway credentials. The key secret doubles as the shared HMAC
/// secret for callback signature verification.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Public base URL under which uploaded objects are reachable.
    pub public_base_url: String,
}

fn required(name: &str) -> anyhow::Result<String> {
    env::var(name).map_err(|_| anyhow::anyhow!("{} must be set", name))
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let env_mode = env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string());

        // JWT_SECRET is read directly by the auth module, but fail fast here
        // so a misconfigured deployment dies at startup, not on first login.
        required("JWT_SECRET")?;

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .map(|v| parse_list(&v))
            .unwrap_or_default();
        if allowed_origins.is_empty() && env_mode == "production" {
            anyhow::bail!("ALLOWED_ORIGINS must be set in production");
        }

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            allowed_origins,
            rate_limit_per_second: env::var("RATE_LIMIT_PER_SECOND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1200),
            rate_limit_burst: env::var("RATE_LIMIT_BURST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2400),
            mongodb_url: required("MONGODB_URL")?,
            mongodb_db: env::var("MONGODB_DB").unwrap_or_else(|_| "lifther".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            upi_payee_name: env::var("UPI_PAYEE_NAME")
                .unwrap_or_else(|_| "Maa Ka Gullak".to_string()),
            identity: IdentityConfig {
                base_url: required("IDENTITY_PROVIDER_URL")?,
                api_key: required("IDENTITY_PROVIDER_KEY")?,
            },
            gateway: GatewayConfig {
                key_id: required("RAZORPAY_KEY_ID")?,
                key_secret: required("RAZORPAY_KEY_SECRET")?,
                base_url: env::var("RAZORPAY_API_URL")
                    .unwrap_or_else(|_| "https://api.razorpay.com/v1".to_string()),
            },
            storage: StorageConfig {
                endpoint: required("OBJECT_STORAGE_ENDPOINT")?,
                bucket: required("OBJECT_STORAGE_BUCKET")?,
                region: env::var("OBJECT_STORAGE_REGION")
                    .unwrap_or_else(|_| "ap-south-1".to_string()),
                access_key: required("OBJECT_STORAGE_ACCESS_KEY")?,
                secret_key: required("OBJECT_STORAGE_SECRET_KEY")?,
                public_base_url: required("OBJECT_STORAGE_PUBLIC_URL")?,
            },
            moderator_ids: env::var("MODERATOR_IDS")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            env_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::parse_list;

    #[test]
    fn list_parsing_trims_and_drops_empties() {
        assert_eq!(
            parse_list(" a, b ,,c"),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(parse_list("").is_empty());
    }
}
