//! Session Module
//!
//! Maps opaque bearer tokens to the identity captured at login.
//!
//! Tokens carry 128 bits from the OS random source, hex-encoded. Sessions live
//! only in memory and do not survive a restart; there is no expiry at this layer.

pub mod service;
pub mod types;
