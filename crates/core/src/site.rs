//! Site configuration served by `config/{locale}`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaPage {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MainMeta {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub trademark: String,
    #[serde(default)]
    pub maintenance: bool,
    #[serde(default)]
    pub main: MainMeta,
    #[serde(default)]
    pub pages: HashMap<String, MetaPage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaTag {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub property: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub header: i64,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialConfig {
    pub facebook: Option<String>,
    pub twitter: Option<String>,
    pub instagram: Option<String>,
    pub youtube: Option<String>,
    pub tiktok: Option<String>,
    #[serde(default)]
    pub whatsapp: Vec<String>,
    #[serde(default)]
    pub telegram: Vec<String>,
    #[serde(default)]
    pub line: Vec<String>,
    #[serde(default)]
    pub google_tag_manager: Vec<String>,
    #[serde(default)]
    pub facebook_pixel: Vec<String>,
    pub google_analytics: Option<String>,
    pub livechat_type: Option<String>,
    pub promo_line_en: Option<String>,
    pub promo_line_id: Option<String>,
    pub welcome_message_en: Option<String>,
    pub welcome_message_id: Option<String>,
    /// Keys the portal does not interpret
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Links rendered in the footer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SocialLinks {
    pub facebook: Option<String>,
    pub twitter: Option<String>,
    pub instagram: Option<String>,
    pub youtube: Option<String>,
    pub tiktok: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: Option<i64>,
    pub name: String,
    pub payment_code: String,
    pub category: Option<String>,
    pub images: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationCta {
    pub label: String,
    pub link: String,
    #[serde(default)]
    pub is_external: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub content: String,
    pub cta: Option<NotificationCta>,
    pub banner: Option<String>,
}

/// Site-wide configuration for one locale.
///
/// Immutable once fetched; the accessors below are the only read path the
/// rest of the portal uses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub menu: Vec<Value>,
    #[serde(default)]
    pub poker: i64,
    #[serde(default)]
    pub meta: MetaConfig,
    #[serde(default)]
    pub tags: Vec<MetaTag>,
    #[serde(default)]
    pub pages: Vec<PageContent>,
    #[serde(default)]
    pub social: SocialConfig,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default, rename = "activeBanks")]
    pub active_banks: HashMap<String, Vec<PaymentMethod>>,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub notifications: HashMap<String, Notification>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl SiteConfig {
    pub fn site_name(&self) -> &str {
        &self.meta.name
    }

    pub fn trademark(&self) -> &str {
        &self.meta.trademark
    }

    pub fn license(&self) -> Option<&str> {
        self.meta.license.as_deref()
    }

    pub fn is_maintenance_mode(&self) -> bool {
        self.meta.maintenance
    }

    pub fn pages_meta(&self) -> &HashMap<String, MetaPage> {
        &self.meta.pages
    }

    /// SEO metadata for a named page
    pub fn page_meta(&self, page: &str) -> Option<&MetaPage> {
        self.meta.pages.get(page)
    }

    pub fn meta_tags(&self) -> &[MetaTag] {
        &self.tags
    }

    pub fn pages(&self) -> &[PageContent] {
        &self.pages
    }

    pub fn page_by_url(&self, url: &str) -> Option<&PageContent> {
        self.pages.iter().find(|page| page.url == url)
    }

    pub fn pages_by_section<'a>(&'a self, section: &'a str) -> impl Iterator<Item = &'a PageContent> {
        self.pages
            .iter()
            .filter(move |page| page.section.as_deref() == Some(section))
    }

    pub fn menu(&self) -> &[Value] {
        &self.menu
    }

    pub const fn poker(&self) -> i64 {
        self.poker
    }

    pub fn social_links(&self) -> SocialLinks {
        SocialLinks {
            facebook: self.social.facebook.clone(),
            twitter: self.social.twitter.clone(),
            instagram: self.social.instagram.clone(),
            youtube: self.social.youtube.clone(),
            tiktok: self.social.tiktok.clone(),
        }
    }

    pub fn whatsapp(&self) -> &[String] {
        &self.social.whatsapp
    }

    pub fn telegram(&self) -> &[String] {
        &self.social.telegram
    }

    pub fn line(&self) -> &[String] {
        &self.social.line
    }

    pub fn google_tag_manager(&self) -> &[String] {
        &self.social.google_tag_manager
    }

    pub fn facebook_pixel(&self) -> &[String] {
        &self.social.facebook_pixel
    }

    pub fn google_analytics(&self) -> Option<&str> {
        self.social.google_analytics.as_deref()
    }

    pub fn livechat_type(&self) -> Option<&str> {
        self.social.livechat_type.as_deref()
    }

    /// Promo line for a locale (`en` or `id`)
    pub fn promo_line(&self, locale: &str) -> Option<&str> {
        match locale {
            "id" => self.social.promo_line_id.as_deref(),
            _ => self.social.promo_line_en.as_deref(),
        }
    }

    /// Welcome message for a locale (`en` or `id`)
    pub fn welcome_message(&self, locale: &str) -> Option<&str> {
        match locale {
            "id" => self.social.welcome_message_id.as_deref(),
            _ => self.social.welcome_message_en.as_deref(),
        }
    }

    pub fn payment_methods(&self) -> &[String] {
        &self.methods
    }

    pub fn payment_methods_by_category(&self, category: &str) -> &[PaymentMethod] {
        self.active_banks.get(category).map_or(&[], Vec::as_slice)
    }

    pub fn payment_type(&self) -> Option<&str> {
        self.payment_type.as_deref()
    }

    pub fn notification_before_login(&self) -> Option<&Notification> {
        self.notifications.get("notification_before_login")
    }
}
