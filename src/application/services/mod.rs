//! Application services - Business logic orchestration

pub mod access;
pub mod broadcast;
pub mod moderation;
pub mod presence;
pub mod registry;

pub use access::AccessControl;
pub use broadcast::{BroadcastEngine, BroadcastReport};
pub use moderation::ModerationGate;
pub use presence::PresenceTracker;
pub use registry::ChatRegistry;
