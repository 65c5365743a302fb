//! One-shot site configuration cache

use portal_core::SiteConfig;
use portal_http::client::{ClientError, PortalClient};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{error, info};

/// The portal cannot render without its site configuration
#[derive(Debug, Error)]
pub enum ConfigInitError {
    #[error("Failed to initialize application: {0}")]
    Fetch(#[from] ClientError),
}

/// Site configuration fetched at most once per runtime.
///
/// Concurrent `initialize` calls share one fetch. A failed fetch leaves the
/// cache empty so a later explicit call can try again.
#[derive(Debug)]
pub struct ConfigCache {
    client: PortalClient,
    cell: RwLock<Arc<OnceCell<Arc<SiteConfig>>>>,
}

impl ConfigCache {
    pub fn new(client: PortalClient) -> Self {
        Self {
            client,
            cell: RwLock::new(Arc::new(OnceCell::new())),
        }
    }

    pub async fn initialize(&self, locale: &str) -> Result<Arc<SiteConfig>, ConfigInitError> {
        let cell = self.current();
        let config = cell
            .get_or_try_init(|| async {
                match self.client.get_site_config(locale).await {
                    Ok(config) => {
                        info!(
                            locale,
                            site_name = config.site_name(),
                            maintenance = config.is_maintenance_mode(),
                            pages = config.pages().len(),
                            "Site configuration loaded"
                        );
                        Ok(Arc::new(config))
                    }
                    Err(err) => {
                        error!(locale, status = err.status(), "Site configuration fetch failed");
                        Err(ConfigInitError::Fetch(err))
                    }
                }
            })
            .await?;
        Ok(Arc::clone(config))
    }

    pub fn get(&self) -> Option<Arc<SiteConfig>> {
        self.current().get().cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.current().initialized()
    }

    /// Forget the cached value, e.g. after a locale switch
    pub fn reset(&self) {
        *self.cell.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(OnceCell::new());
    }

    fn current(&self) -> Arc<OnceCell<Arc<SiteConfig>>> {
        Arc::clone(&self.cell.read().unwrap_or_else(PoisonError::into_inner))
    }
}
