//! Port traits the domain depends on; adapters implement them.

pub mod config_port;
pub mod fundamental_port;
pub mod price_port;
pub mod report_port;
