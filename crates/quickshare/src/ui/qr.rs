//! Terminal QR codes for the share URL.
//!
//! Modules are packed two rows per text line with Unicode half blocks so
//! the code stays roughly square in a terminal.

use qrcode::{Color, QrCode};

/// Width of the blank border around the code, in modules.
const QUIET_ZONE: usize = 2;

/// How dark modules are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QrStyle {
    /// Dark modules as filled blocks; suits light terminal backgrounds.
    #[default]
    Normal,
    /// Dark modules as blank cells on a filled border; suits dark
    /// terminal backgrounds.
    Inverted,
}

/// Render `data` as a terminal QR code in the given style.
pub fn render(data: &str, style: QrStyle) -> anyhow::Result<String> {
    let code = QrCode::new(data.as_bytes())?;
    let width = code.width();
    let modules = code.to_colors();

    let full_width = width + 2 * QUIET_ZONE;
    let height = modules.len() / width;

    // Quiet zone cells count as light; the padded grid is indexed directly.
    let is_dark = |row: usize, col: usize| -> bool {
        if row < QUIET_ZONE || col < QUIET_ZONE {
            return false;
        }
        let (r, c) = (row - QUIET_ZONE, col - QUIET_ZONE);
        r < height && c < width && modules[r * width + c] == Color::Dark
    };

    let total_rows = height + 2 * QUIET_ZONE;
    let mut output = String::with_capacity((full_width + 1) * total_rows.div_ceil(2) * 3);

    for row in (0..total_rows).step_by(2) {
        for col in 0..full_width {
            let mut top = is_dark(row, col);
            let mut bottom = is_dark(row + 1, col);
            if style == QrStyle::Inverted {
                top = !top;
                bottom = !bottom;
            }
            output.push(match (top, bottom) {
                (true, true) => '\u{2588}',
                (true, false) => '\u{2580}',
                (false, true) => '\u{2584}',
                (false, false) => ' ',
            });
        }
        output.push('\n');
    }

    Ok(output)
}
