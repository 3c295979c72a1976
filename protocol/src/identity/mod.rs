//! # Identity Module
//!
//! Ledger addresses. An address is 20 bytes, written as `0x` followed by
//! 40 hex characters, and derived from a public key by keeping its last
//! 20 bytes.

pub mod address;

pub use address::{Address, AddressError};
