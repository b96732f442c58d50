//! Layered configuration: config files, then `APP__*` environment variables

mod app_config;

pub use app_config::{AppConfig, EndpointConfig, HttpConfig, LogFormat, LoggingConfig};
