use std::{env, time::Duration};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub pricing: PricingPolicy,
    pub catalog_cache_ttl: Duration,
}

/// Checkout pricing constants. Amounts are minor units (cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    /// Tax rate in basis points, `1000` is 10%.
    pub tax_rate_bps: i64,
    /// Flat shipping fee applied to any non-empty order.
    pub shipping_flat_fee: i64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate_bps: 1000,
            shipping_flat_fee: 500,
        }
    }
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

        let defaults = PricingPolicy::default();
        let pricing = PricingPolicy {
            tax_rate_bps: parse_env("TAX_RATE_BPS").unwrap_or(defaults.tax_rate_bps),
            shipping_flat_fee: parse_env("SHIPPING_FLAT_FEE").unwrap_or(defaults.shipping_flat_fee),
        };
        if pricing.tax_rate_bps < 0 || pricing.shipping_flat_fee < 0 {
            anyhow::bail!("TAX_RATE_BPS and SHIPPING_FLAT_FEE must not be negative");
        }

        let catalog_cache_ttl =
            Duration::from_secs(parse_env("CATALOG_CACHE_TTL_SECS").unwrap_or(300));

        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            pricing,
            catalog_cache_ttl,
        })
    }

    /// Configuration for tests and tooling that never reads the environment.
    pub fn for_database(database_url: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            jwt_secret: jwt_secret.into(),
            pricing: PricingPolicy::default(),
            catalog_cache_ttl: Duration::from_secs(300),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
