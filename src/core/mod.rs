mod config;
pub mod db;
pub use config::{AppConfig, DEFAULT_SYSTEM_MESSAGE};
