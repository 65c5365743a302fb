//! Portal core types and utilities

pub mod clock;
pub mod redact;
pub mod site;
pub mod types;

#[cfg(feature = "tracing")]
pub mod tracing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use site::SiteConfig;
pub use types::{AuthOutcome, FieldErrors, LoginPayload, RegistrationPayload, TokenGrant, UserRecord};
