pub mod sse;

pub use sse::{resolve_endpoint, SseTransport};
