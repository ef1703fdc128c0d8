pub mod app;
pub mod authz;
pub mod config;
pub mod db;
pub mod errors;
pub mod lifecycle;
pub mod models;
pub mod services;

// Re-export commonly used items for tests
pub use app::AppState;
pub use config::AppConfig;
