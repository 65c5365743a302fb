//! Authentication module

pub mod context;
pub mod guard;

// Re-export commonly used items
pub use context::{Session, SessionPhase, SessionSnapshot, SessionSynchronizer};
pub use guard::{GuardDecision, RouteGuard};
