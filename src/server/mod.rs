pub mod config;
pub mod error;
mod forum_routes;
mod http_layers;
pub mod metrics;
pub mod server;
pub mod session;
pub mod state;
mod user_routes;

pub use config::ServerConfig;
pub use error::ApiError;
pub use http_layers::*;
pub use server::{make_app, run_server};
