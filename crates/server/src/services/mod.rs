//! Business logic services.

pub mod chat;
pub mod rate_limit;
pub mod tools;

pub use chat::{ChatError, ChatOutcome, ChatService, ChatTurn};
pub use rate_limit::{RateLimitDecision, RateLimitService};
pub use tools::{ToolOutcome, ToolRouter, available_tools};
