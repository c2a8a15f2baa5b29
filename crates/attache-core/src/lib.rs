//! Core domain + application logic for attachment resolution.
//!
//! This crate is intentionally platform-agnostic. Telegram / WhatsApp media APIs,
//! durable object storage and persistence live behind ports (traits) implemented
//! in adapter crates.

pub mod attachment;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod ports;
pub mod security;
pub mod sniff;
pub mod store;

pub use errors::{Error, Result};
