//! Multiplexing HTTP/HTTPS Gateway Library

pub mod api;
pub mod config;
pub mod http;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod routing;
pub mod static_files;

pub use api::{HandlerRegistry, ResourceHandler};
pub use config::GatewayConfig;
pub use http::HttpServer;
