//! Process configuration from environment variables.

use std::net::SocketAddr;

use anyhow::Context;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// Postgres connection string. Unset means the in-memory catalog.
    pub database_url: Option<String>,
    /// Load the demo permissions, roles, menus and users at startup.
    pub seed_demo_data: bool,
}

impl ApiConfig {
    /// Config for tests and local runs: in-memory catalog, no seed.
    pub fn local(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: jwt_secret.into(),
            database_url: None,
            seed_demo_data: false,
        }
    }

    pub fn with_demo_data(mut self) -> Self {
        self.seed_demo_data = true;
        self
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be a socket address like 0.0.0.0:8080")?;

        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

        let seed_demo_data = match lookup("SEED_DEMO_DATA") {
            None => false,
            Some(v) => parse_flag(&v)
                .with_context(|| format!("SEED_DEMO_DATA must be a boolean (got '{v}')"))?,
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            database_url,
            seed_demo_data,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
