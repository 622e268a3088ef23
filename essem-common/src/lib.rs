//! # Essem Common Library
//!
//! Shared code for the essem workers including:
//! - Essence event types (EssenceEvent enum)
//! - Outbound request payload types
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
