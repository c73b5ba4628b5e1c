//! Infrastructure wiring: which catalog backs the API.

use std::sync::Arc;

use anyhow::Context;

use mfgplan_infra::{Catalog, InMemoryCatalog, seed_demo};

use crate::config::ApiConfig;

pub struct AppServices {
    pub catalog: Arc<dyn Catalog>,
}

impl AppServices {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }
}

pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let catalog = open_catalog(config).await?;

    if config.seed_demo_data {
        seed_demo(catalog.as_ref())
            .await
            .context("failed to seed demo data")?;
    }

    Ok(AppServices::new(catalog))
}

#[cfg(feature = "postgres")]
async fn open_catalog(config: &ApiConfig) -> anyhow::Result<Arc<dyn Catalog>> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::info!("DATABASE_URL not set; using in-memory catalog");
        return Ok(Arc::new(InMemoryCatalog::new()));
    };

    let catalog = mfgplan_infra::PgCatalog::connect(url)
        .await
        .context("failed to connect to postgres")?;
    catalog.migrate().await.context("failed to apply schema")?;
    tracing::info!("using postgres catalog");
    Ok(Arc::new(catalog))
}

#[cfg(not(feature = "postgres"))]
async fn open_catalog(config: &ApiConfig) -> anyhow::Result<Arc<dyn Catalog>> {
    if config.database_url.is_some() {
        tracing::warn!("DATABASE_URL is set but postgres support is not compiled in; using in-memory catalog");
    }
    Ok(Arc::new(InMemoryCatalog::new()))
}
