//! Site configuration client methods

use crate::client::{ClientError, PortalClient};
use portal_core::SiteConfig;
use reqwest::Method;

impl PortalClient {
    /// Fetch the site configuration for a locale
    pub async fn get_site_config(&self, locale: &str) -> Result<SiteConfig, ClientError> {
        let request = self.request(Method::GET, &format!("config/{locale}"));
        self.execute(request).await
    }
}
