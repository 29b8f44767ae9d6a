//! Terminal rendering of pairing codes as QR patterns.
//!
//! Two QR rows per terminal row using Unicode half-blocks, which keeps modules roughly square
//! since terminal cells are about twice as tall as they are wide.

use qrcode::{Color, EcLevel, QrCode};

const QUIET_ZONE: usize = 2;

/// Render `data` as terminal lines. Falls back to printing the raw code when it cannot be
/// encoded (too long for any QR version).
pub fn render_lines(data: &str) -> Vec<String> {
    let code = match QrCode::with_error_correction_level(data, EcLevel::M)
        .or_else(|_| QrCode::with_error_correction_level(data, EcLevel::L))
    {
        Ok(code) => code,
        Err(e) => {
            log::warn!("pairing code cannot be encoded as QR ({} chars): {}", data.len(), e);
            return vec![format!("enter this pairing code manually: {}", data)];
        }
    };

    let colors = code.to_colors();
    let size = code.width();
    let total = size + QUIET_ZONE * 2;
    let dark = |x: usize, y: usize| -> bool {
        if x < QUIET_ZONE || y < QUIET_ZONE {
            return false;
        }
        let (qx, qy) = (x - QUIET_ZONE, y - QUIET_ZONE);
        if qx >= size || qy >= size {
            return false;
        }
        colors[qy * size + qx] == Color::Dark
    };

    let mut lines = Vec::with_capacity(total.div_ceil(2));
    for row_pair in 0..total.div_ceil(2) {
        let upper_y = row_pair * 2;
        let lower_y = upper_y + 1;
        let line: String = (0..total)
            .map(|x| {
                let upper = dark(x, upper_y);
                let lower = lower_y < total && dark(x, lower_y);
                match (upper, lower) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                }
            })
            .collect();
        lines.push(line);
    }
    lines
}
