//! Protocol conversion traits and types.
//!
//! Provider-specific wire types convert to and from the internal
//! `agent_core` types.
//!
//! ```text
//! Provider Types (Gemini)
//!     ↕
//! Internal Types (agent_core::Message, ToolSchema)
//! ```

mod errors;
pub mod gemini;

pub use errors::{ProtocolError, ProtocolResult};

/// Trait for converting provider-specific types to internal types.
pub trait FromProvider<T>: Sized {
    fn from_provider(value: T) -> ProtocolResult<Self>;
}

/// Trait for converting internal types to provider-specific types.
pub trait ToProvider<T>: Sized {
    fn to_provider(&self) -> ProtocolResult<T>;
}
