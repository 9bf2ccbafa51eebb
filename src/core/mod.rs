pub mod budget;
pub mod config;
pub mod message;
pub mod models;

pub use config::AppConfig;
