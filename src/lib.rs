// Core layer - shared types and configuration
pub mod core;

// Features layer - reminder engine and ads
pub mod features;

// Infrastructure
pub mod database;

// Application layer
pub mod commands;

// Discord transport
pub mod discord;

pub use core::Config;
pub use database::Database;
