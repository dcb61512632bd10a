//! cartsync core - shared cart types.
//!
//! This crate provides the types used across all cartsync components:
//! - `client` - Cart store, remote sync and backend adapters
//! - `cli` - Command-line stand-in for the storefront UI
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! storage access, no HTTP clients. This keeps it lightweight and allows it
//! to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs and prices
//! - [`cart`] - Line items, cart state transitions and the totals calculator

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::*;
pub use types::*;
