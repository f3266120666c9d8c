//! photo-bot library crate.
//!
//! Catalogs the photos under a directory tree, answers chat commands with a
//! random one and delivers a random photo on a schedule to a single
//! authorized chat.

pub mod bot;
pub mod config;
pub mod delivery;
pub mod error;
pub mod index;
pub mod logging;
pub mod random;
pub mod scheduler;
pub mod selector;
pub mod services;
pub mod transport;

pub use error::{Error, Result};
