//! Startup banner.

use std::io::{self, Write};

use super::qr::{self, QrStyle};

/// Title line printed first.
pub const TITLE: &str = "QUICK SHARE - Instant File Sharing";

/// Print the startup banner with a QR code of `url` to `w`.
///
/// `path` is omitted from the output when empty.
pub fn print_banner<W: Write>(w: &mut W, url: &str, mode: &str, path: &str) -> io::Result<()> {
    print_banner_styled(w, url, mode, path, QrStyle::Normal)
}

/// Like [`print_banner`], with an explicit QR style.
pub fn print_banner_styled<W: Write>(
    w: &mut W,
    url: &str,
    mode: &str,
    path: &str,
    style: QrStyle,
) -> io::Result<()> {
    writeln!(w, "{TITLE}")?;
    writeln!(w, "Mode:     {mode}")?;
    if !path.is_empty() {
        writeln!(w, "File/Dir: {path}")?;
    }
    writeln!(w, "URL:      {url}")?;

    // A URL too long for any QR version still leaves a usable banner.
    match qr::render(url, style) {
        Ok(code) => {
            writeln!(w, "Scan the QR code below with your mobile:")?;
            writeln!(w)?;
            w.write_all(code.as_bytes())?;
        }
        Err(e) => tracing::warn!("Failed to render QR code: {}", e),
    }

    writeln!(w)?;
    writeln!(w, "Press Ctrl+C to stop the server.")?;
    w.flush()
}
