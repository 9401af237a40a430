pub mod protocol;
pub mod server;
pub mod sandbox;
pub mod config;

pub use protocol::*;
pub use config::Config;
