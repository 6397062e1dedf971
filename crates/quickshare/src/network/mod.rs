//! Local network helpers.
//!
//! This module decides which address of the host is advertised to peers
//! and builds the URL they should open.

pub mod address;

pub use address::{display_url, resolve_local_address, select_address, AddressError};
