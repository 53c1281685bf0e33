use gc_core::color::unpack_rgb;
use gc_core::frame::AsciiFrame;

use crate::font;

/// Convertit une `AsciiFrame` en pixels RGB24 haute résolution.
///
/// Chaque cellule est rendue via l'atlas bitmap 8×16 (`font`), étiré en
/// nearest-neighbor vers `cell_w × cell_h` ; les pixels du glyphe prennent
/// `fg`, le reste `bg`.
pub struct Rasterizer {
    cell_w: u32,
    cell_h: u32,
}

impl Rasterizer {
    /// Crée un rasterizer pour la taille de cellule demandée (bornée à
    /// 4×8 minimum pour garder les glyphes lisibles).
    #[must_use]
    pub fn new(cell_w: u32, cell_h: u32) -> Self {
        Self {
            cell_w: cell_w.max(4),
            cell_h: cell_h.max(8),
        }
    }

    /// Taille effective d'une cellule, en pixels.
    #[must_use]
    pub fn cell_size(&self) -> (u32, u32) {
        (self.cell_w, self.cell_h)
    }

    /// Dimensions de l'image produite pour une grille donnée.
    #[must_use]
    pub fn target_dimensions(&self, cols: u16, rows: u16) -> (u32, u32) {
        (
            u32::from(cols) * self.cell_w,
            u32::from(rows) * self.cell_h,
        )
    }

    /// Rend la grille dans `rgb` (RGB24, row-major), redimensionné au
    /// besoin. Le buffer est réutilisable d'une frame à l'autre.
    pub fn render_into(&self, frame: &AsciiFrame, rgb: &mut Vec<u8>) {
        let (width, height) = self.target_dimensions(frame.cols, frame.rows);
        let stride = width as usize * 3;
        rgb.resize(stride * height as usize, 0);

        for cy in 0..usize::from(frame.rows) {
            for cx in 0..usize::from(frame.cols) {
                let cell = &frame.cells[cy * usize::from(frame.cols) + cx];
                let rows = font::glyph_rows(cell.ch);
                let (fr, fg, fb) = unpack_rgb(cell.fg);
                let (br, bg, bb) = unpack_rgb(cell.bg);

                let base_x = cx * self.cell_w as usize;
                let base_y = cy * self.cell_h as usize;

                for yy in 0..self.cell_h as usize {
                    // Nearest-neighbor sur les deux axes.
                    let src_y = yy * font::GLYPH_HEIGHT as usize / self.cell_h as usize;
                    let bits = rows[src_y];
                    let dst_row = (base_y + yy) * stride;
                    for xx in 0..self.cell_w as usize {
                        let src_x = xx * font::GLYPH_WIDTH as usize / self.cell_w as usize;
                        let on = bits & (0x80 >> src_x) != 0;
                        let idx = dst_row + (base_x + xx) * 3;
                        if on {
                            rgb[idx] = fr;
                            rgb[idx + 1] = fg;
                            rgb[idx + 2] = fb;
                        } else {
                            rgb[idx] = br;
                            rgb[idx + 1] = bg;
                            rgb[idx + 2] = bb;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gc_core::frame::{AsciiCell, AsciiFrame};

    fn frame_with(ch: char, fg: u32, bg: u32) -> AsciiFrame {
        let mut frame = AsciiFrame::new(1, 1, 0.0);
        frame.cells[0] = AsciiCell { ch, fg, bg };
        frame
    }

    #[test]
    fn dimensions_scale_with_grid() {
        let rast = Rasterizer::new(8, 16);
        assert_eq!(rast.target_dimensions(120, 60), (960, 960));
        // Les tailles trop petites sont bornées.
        let tiny = Rasterizer::new(1, 1);
        assert_eq!(tiny.cell_size(), (4, 8));
    }

    #[test]
    fn space_cell_fills_background() {
        let rast = Rasterizer::new(8, 16);
        let mut rgb = Vec::new();
        rast.render_into(&frame_with(' ', 0x00FF_FFFF, 0x0020_4060), &mut rgb);
        assert_eq!(rgb.len(), 8 * 16 * 3);
        for pixel in rgb.chunks_exact(3) {
            assert_eq!(pixel, [0x20, 0x40, 0x60]);
        }
    }

    #[test]
    fn half_block_splits_cell_vertically() {
        let rast = Rasterizer::new(8, 16);
        let mut rgb = Vec::new();
        rast.render_into(&frame_with('▄', 0x00FF_0000, 0x0000_00FF), &mut rgb);
        let stride = 8 * 3;
        // Ligne 0 : background (bleu). Ligne 15 : foreground (rouge).
        assert_eq!(&rgb[0..3], &[0x00, 0x00, 0xFF]);
        assert_eq!(&rgb[15 * stride..15 * stride + 3], &[0xFF, 0x00, 0x00]);
    }

    #[test]
    fn nearest_neighbor_scaling_doubles() {
        let rast = Rasterizer::new(16, 32);
        let mut rgb = Vec::new();
        rast.render_into(&frame_with('▄', 0x00FF_FFFF, 0x0000_0000), &mut rgb);
        let stride = 16 * 3;
        // La moitié basse commence à la ligne 16 (2× la ligne source 8).
        assert_eq!(&rgb[15 * stride..15 * stride + 3], &[0, 0, 0]);
        assert_eq!(&rgb[16 * stride..16 * stride + 3], &[255, 255, 255]);
    }

    #[test]
    fn glyph_pixels_use_foreground() {
        let rast = Rasterizer::new(8, 16);
        let mut rgb = Vec::new();
        rast.render_into(&frame_with('#', 0x00AA_0000, 0x0000_0000), &mut rgb);
        let lit = rgb
            .chunks_exact(3)
            .filter(|pixel| pixel[0] == 0xAA)
            .count();
        assert!(lit > 0, "le glyphe doit allumer des pixels fg");
        assert!(lit < 8 * 16, "le glyphe ne doit pas couvrir toute la cellule");
    }
}
