//! Core domain + routing logic for the message relay bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the social
//! posting API live behind ports (traits) implemented in adapter crates.

pub mod commands;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod router;
pub mod security;

pub use errors::{Error, Result};
