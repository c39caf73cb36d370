//! Decoder and gateway plumbing for Xiaomi LYWSD03MMC thermometers running
//! the ATC1441 or PVVX custom firmware.
//!
//! The decoder ([`decode`], [`decode_hex`]) is pure and never panics: feed it
//! any advertisement and it returns a [`DecodedReading`] or `None`. The rest
//! of the crate is the BLE-to-MQTT gateway built around it.

pub mod cache;
pub mod config;
pub mod decoder;
pub mod dialect;
pub mod error;
pub mod hexutil;
pub mod locator;
pub mod mqtt;
pub mod reading;
pub mod record;
pub mod scanner;

pub use decoder::{AtcVoltage, DecodeOptions, decode, decode_hex, decode_with, try_decode};
pub use error::DecodeError;
pub use reading::{DecodedReading, Dialect, Scaled};
