//! Console presentation: the startup banner and its QR code.

pub mod banner;
pub mod qr;

pub use banner::{print_banner, print_banner_styled};
pub use qr::QrStyle;
