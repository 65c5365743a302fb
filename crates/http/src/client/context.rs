//! Ambient request context and the middleware that stamps it onto every call

use super::{ClientError, Middleware, Next};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Request, Response};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

// Header names are matched case-insensitively on the wire
pub const HEADER_APP: &str = "idnc-app";
pub const HEADER_LANGUAGE: &str = "idnc-language";
pub const HEADER_IS_MOBILE: &str = "idnc-ismobile";
pub const HEADER_DOMAIN_ID: &str = "idnc-domain-id";

/// Viewports narrower than this are classified as mobile
pub const DEFAULT_MOBILE_BREAKPOINT: u32 = 1024;

/// Process-wide inputs the per-call header set is derived from.
///
/// The locale and viewport width change while the app runs; the domain id is
/// fixed at construction.
#[derive(Debug)]
pub struct ClientContext {
    locale: ArcSwap<String>,
    /// 0 while no viewport is known (server rendering)
    viewport_width: AtomicU32,
    domain_id: String,
    mobile_breakpoint: u32,
}

impl ClientContext {
    pub fn new(domain_id: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            locale: ArcSwap::from_pointee(locale.into()),
            viewport_width: AtomicU32::new(0),
            domain_id: domain_id.into(),
            mobile_breakpoint: DEFAULT_MOBILE_BREAKPOINT,
        }
    }

    #[must_use]
    pub fn with_mobile_breakpoint(mut self, breakpoint: u32) -> Self {
        self.mobile_breakpoint = breakpoint;
        self
    }

    pub fn locale(&self) -> Arc<String> {
        self.locale.load_full()
    }

    pub fn set_locale(&self, locale: impl Into<String>) {
        self.locale.store(Arc::new(locale.into()));
    }

    pub fn set_viewport_width(&self, width: u32) {
        self.viewport_width.store(width, Ordering::Relaxed);
    }

    pub fn domain_id(&self) -> &str {
        &self.domain_id
    }

    /// Snapshot the context for a single outbound call
    pub fn request_context(&self) -> RequestContext {
        let width = self.viewport_width.load(Ordering::Relaxed);
        RequestContext {
            locale: String::clone(&self.locale.load()),
            is_mobile: width > 0 && width < self.mobile_breakpoint,
            domain_id: self.domain_id.clone(),
            authorization: None,
        }
    }
}

impl Default for ClientContext {
    fn default() -> Self {
        Self::new("1", "en")
    }
}

/// Header bag built fresh for each call and dropped after the response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub locale: String,
    pub is_mobile: bool,
    pub domain_id: String,
    pub authorization: Option<String>,
}

impl RequestContext {
    /// Merge into `headers`. A caller-supplied `Authorization` always wins.
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<(), ClientError> {
        headers.insert(HEADER_APP, HeaderValue::from_static("0"));
        headers.insert(HEADER_LANGUAGE, header_value(&self.locale)?);
        headers.insert(
            HEADER_IS_MOBILE,
            HeaderValue::from_static(if self.is_mobile { "1" } else { "0" }),
        );
        headers.insert(HEADER_DOMAIN_ID, header_value(&self.domain_id)?);

        if let Some(authorization) = &self.authorization {
            if !headers.contains_key(AUTHORIZATION) {
                let mut value = header_value(authorization)?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
        }

        Ok(())
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ClientError> {
    HeaderValue::from_str(value)
        .map_err(|e| ClientError::Configuration(format!("invalid header value: {e}")))
}

/// Middleware that stamps the identifying headers onto every request
#[derive(Debug, Clone)]
pub struct ContextHeaders {
    context: Arc<ClientContext>,
}

impl ContextHeaders {
    pub fn new(context: Arc<ClientContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Middleware for ContextHeaders {
    async fn handle(&self, mut request: Request, next: Next<'_>) -> Result<Response, ClientError> {
        self.context
            .request_context()
            .apply(request.headers_mut())?;
        next.run(request).await
    }
}
