pub mod config;
pub mod controller;
pub mod error;
pub mod handlers;
pub mod lease;
pub mod logging;
pub mod response;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use controller::{RequestLifecycleController, RequestOutcome};
pub use error::RequestError;
pub use lease::ConnectionLease;
pub use response::ResponseTranslator;
pub use server::{app_config, run_server};
pub use state::AppState;
