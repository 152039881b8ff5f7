// Core modules
pub mod caches;
pub mod config;
pub mod controller;
pub mod error;
pub mod execution;
pub mod filters;
pub mod layout;
pub mod listeners;
pub mod models;
pub mod persistence;
pub mod pubkey;
pub mod rpc;
pub mod swap;

// Re-export commonly used types
pub use controller::{Bot, BotDeps, BotSettings};
pub use error::BotError;
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, BotError>;
