pub mod api;
pub mod commands;
pub mod config;
pub mod database;
pub mod document;
pub mod embedding;
pub mod error;
pub mod providers;
pub mod qa;

// Re-export commonly used items
pub use config::Settings;
pub use error::QaError;
pub use qa::QaEngine;
