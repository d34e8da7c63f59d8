pub mod types;

pub use types::{ChatRequest, Message, Role};
