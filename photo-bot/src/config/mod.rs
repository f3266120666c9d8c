//! Configuration module.
//!
//! This module provides the startup configuration loaded from environment
//! variables and the secret-bearing value types it carries.

pub mod env;
pub mod secret;

pub use env::{AppConfig, SelectorStrategy};
pub use secret::{AuthorizedRecipient, Secret, mask};
