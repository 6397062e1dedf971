//! File placement for uploads.
//!
//! Uploaded files always land directly inside the configured root
//! directory. Client-supplied names are reduced to their final path
//! component so a name can never address a location outside the root.

pub mod naming;

pub use naming::{sanitize_filename, FilenameError};
