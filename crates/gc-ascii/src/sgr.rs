//! Sérialisation SGR pré-calculée (wire-level, bit-stable).
//!
//! Le producteur écrit la séquence une fois ; le presenter n'a plus qu'à
//! copier les bytes sur stdout. Format : home `ESC[H`, foreground par
//! cellule selon le mode, background half-block mémoïsé par ligne,
//! terminateur de ligne `ESC[0m\r\n`. La mémoïsation couleur est
//! strictement intra-ligne.

use std::io::Write;

use gc_core::color::{unpack_rgb, xterm_index_from_rgb};
use gc_core::config::RenderMode;
use gc_core::frame::AsciiFrame;

const HOME: &[u8] = b"\x1b[H";
const RESET: &[u8] = b"\x1b[0m\r\n";

/// Construit le flux SGR complet d'une frame.
#[must_use]
pub fn bake(frame: &AsciiFrame, mode: RenderMode) -> Vec<u8> {
    let cols = usize::from(frame.cols);
    let rows = usize::from(frame.rows);
    let mut buf = Vec::with_capacity(cols * rows * 8 + HOME.len());
    buf.extend_from_slice(HOME);

    let mut utf8 = [0u8; 4];
    for y in 0..rows {
        // Trackers remis à zéro à chaque ligne.
        let mut last_fg: Option<u32> = None;
        let mut last_bg: Option<u32> = None;

        for x in 0..cols {
            let cell = &frame.cells[y * cols + x];

            match mode {
                RenderMode::TrueColor => {
                    // Mémoïsé : seule la première cellule et les changements
                    // de couleur émettent un escape.
                    if last_fg != Some(cell.fg) {
                        let (r, g, b) = unpack_rgb(cell.fg);
                        let _ = write!(buf, "\x1b[38;2;{r};{g};{b}m");
                        last_fg = Some(cell.fg);
                    }
                }
                RenderMode::Ansi256 => {
                    let (r, g, b) = unpack_rgb(cell.fg);
                    let idx = xterm_index_from_rgb(r, g, b);
                    let _ = write!(buf, "\x1b[38;5;{idx}m");
                }
                RenderMode::Gray => {
                    let gray = (cell.fg >> 16) & 0xFF;
                    let _ = write!(buf, "\x1b[38;2;{gray};{gray};{gray}m");
                }
            }

            if frame.half_block && last_bg != Some(cell.bg) {
                let (r, g, b) = unpack_rgb(cell.bg);
                let _ = write!(buf, "\x1b[48;2;{r};{g};{b}m");
                last_bg = Some(cell.bg);
            }

            buf.extend_from_slice(cell.ch.encode_utf8(&mut utf8).as_bytes());
        }
        buf.extend_from_slice(RESET);
    }

    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use gc_core::frame::AsciiCell;

    fn frame_of(cols: u16, rows: u16, cells: Vec<AsciiCell>) -> AsciiFrame {
        let mut frame = AsciiFrame::new(cols, rows, 0.0);
        frame.cells = cells;
        frame
    }

    fn cell(ch: char, fg: u32) -> AsciiCell {
        AsciiCell { ch, fg, bg: 0 }
    }

    #[test]
    fn stream_framing() {
        let frame = frame_of(2, 2, vec![cell('a', 0); 4]);
        let bytes = bake(&frame, RenderMode::TrueColor);
        assert!(bytes.starts_with(b"\x1b[H"));
        assert!(bytes.ends_with(b"\x1b[0m\r\n"));
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.matches("\x1b[0m\r\n").count(), 2, "un reset par ligne");
    }

    #[test]
    fn truecolor_memoizes_within_row() {
        let frame = frame_of(3, 1, vec![cell('x', 0x00AA_BB_CC); 3]);
        let text = String::from_utf8(bake(&frame, RenderMode::TrueColor)).unwrap();
        assert_eq!(
            text.matches("\x1b[38;2;").count(),
            1,
            "couleur identique → un seul escape par ligne"
        );
    }

    #[test]
    fn truecolor_memoization_resets_per_row() {
        let frame = frame_of(1, 3, vec![cell('x', 0x0011_2233); 3]);
        let text = String::from_utf8(bake(&frame, RenderMode::TrueColor)).unwrap();
        assert_eq!(text.matches("\x1b[38;2;17;34;51m").count(), 3);
    }

    #[test]
    fn ansi256_emits_every_cell() {
        // 0xD70000 = palette entry 160.
        let frame = frame_of(3, 1, vec![cell('#', 0x00D7_0000); 3]);
        let text = String::from_utf8(bake(&frame, RenderMode::Ansi256)).unwrap();
        assert_eq!(text.matches("\x1b[38;5;160m").count(), 3);
    }

    #[test]
    fn gray_emits_triplet_from_high_byte() {
        let frame = frame_of(1, 1, vec![cell('=', 0x0080_8080)]);
        let text = String::from_utf8(bake(&frame, RenderMode::Gray)).unwrap();
        assert!(text.contains("\x1b[38;2;128;128;128m"));
    }

    #[test]
    fn half_block_background_memoized() {
        let mut frame = frame_of(
            2,
            1,
            vec![
                AsciiCell { ch: '▄', fg: 0x00FF_FFFF, bg: 0x0010_2030 },
                AsciiCell { ch: '▄', fg: 0x00FF_FFFF, bg: 0x0010_2030 },
            ],
        );
        frame.half_block = true;
        let text = String::from_utf8(bake(&frame, RenderMode::TrueColor)).unwrap();
        assert_eq!(text.matches("\x1b[48;2;16;32;48m").count(), 1);
        assert!(text.contains('▄'));
    }
}
