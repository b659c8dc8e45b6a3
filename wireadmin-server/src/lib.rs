pub mod admin;
pub mod config;
pub mod logging;

pub use admin::{ListenerId, WireAdmin, WireAdminEvent, WireAdminListener};
pub use config::{ConfigError, WireAdminConfig};
pub use logging::{init_logging, init_test_logging};
