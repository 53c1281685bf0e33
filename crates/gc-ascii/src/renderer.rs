use std::sync::Arc;

use arc_swap::ArcSwap;
use gc_core::color::{
    apply_contrast, apply_gamma, luminance, pack_rgb, xterm_index_from_rgb, xterm_palette,
};
use gc_core::config::{CONTRAST_MAX, CONTRAST_MIN, DitherMode, GAMMA_MAX, GAMMA_MIN, RenderMode, RendererConfig};
use gc_core::frame::{AsciiCell, AsciiFrame, VideoFrame};
use rayon::prelude::*;

use crate::dither;
use crate::sgr;

/// Rampe de glyphes fixe, du plus dense au plus clair.
pub const RAMP: [char; 10] = ['@', '%', '#', '*', '+', '=', '-', ':', '.', ' '];

/// Convertit des `VideoFrame` RGB24 en `AsciiFrame`.
///
/// La config vit dans un `ArcSwap` : `render` charge un snapshot à l'entrée
/// et l'utilise pour toute la frame ; les mutateurs publient une nouvelle
/// valeur. Un changement de config prend donc effet à la frontière entre
/// deux frames, jamais au milieu d'une.
///
/// # Example
/// ```
/// use gc_ascii::AsciiRenderer;
/// use gc_core::config::RendererConfig;
/// use gc_core::frame::VideoFrame;
///
/// let renderer = AsciiRenderer::new(RendererConfig::default());
/// let ascii = renderer.render(&VideoFrame::new(16, 16, 0.25));
/// assert_eq!(ascii.cells.len(), 120 * 60);
/// assert!((ascii.pts - 0.25).abs() < 1e-9);
/// ```
pub struct AsciiRenderer {
    config: ArcSwap<RendererConfig>,
}

impl AsciiRenderer {
    /// Crée un renderer avec la config initiale (clampée).
    #[must_use]
    pub fn new(config: RendererConfig) -> Self {
        Self {
            config: ArcSwap::from_pointee(config.clamped()),
        }
    }

    /// Remplace la config entière (clampée).
    pub fn configure(&self, config: RendererConfig) {
        self.config.store(Arc::new(config.clamped()));
    }

    /// Snapshot de la config courante.
    #[must_use]
    pub fn current_config(&self) -> RendererConfig {
        **self.config.load()
    }

    /// Gray → ANSI-256 → TrueColor → Gray.
    pub fn cycle_mode(&self) {
        self.config.rcu(|config| {
            let mut next = **config;
            next.mode = match next.mode {
                RenderMode::Gray => RenderMode::Ansi256,
                RenderMode::Ansi256 => RenderMode::TrueColor,
                RenderMode::TrueColor => RenderMode::Gray,
            };
            next
        });
    }

    /// Off → Bayer2 → Bayer4 → Off.
    pub fn cycle_dither(&self) {
        self.config.rcu(|config| {
            let mut next = **config;
            next.dither = match next.dither {
                DitherMode::Off => DitherMode::Bayer2,
                DitherMode::Bayer2 => DitherMode::Bayer4,
                DitherMode::Bayer4 => DitherMode::Off,
            };
            next
        });
    }

    /// Fixe le mode directement (touches 1/2/3).
    pub fn set_mode(&self, mode: RenderMode) {
        self.config.rcu(|config| {
            let mut next = **config;
            next.mode = mode;
            next
        });
    }

    /// Ajuste gamma de `delta`, clampé sur [0.5, 4.0].
    pub fn adjust_gamma(&self, delta: f32) {
        self.config.rcu(|config| {
            let mut next = **config;
            next.gamma = (next.gamma + delta).clamp(GAMMA_MIN, GAMMA_MAX);
            next
        });
    }

    /// Ajuste le contraste de `delta`, clampé sur [0.2, 3.0].
    pub fn adjust_contrast(&self, delta: f32) {
        self.config.rcu(|config| {
            let mut next = **config;
            next.contrast = (next.contrast + delta).clamp(CONTRAST_MIN, CONTRAST_MAX);
            next
        });
    }

    /// Rend une frame vidéo en frame ASCII.
    ///
    /// Les lignes de la grille sont échantillonnées en parallèle (chaque
    /// ligne écrit une tranche disjointe) ; le résultat est déterministe.
    #[must_use]
    pub fn render(&self, frame: &VideoFrame) -> AsciiFrame {
        let config = **self.config.load();

        let mut ascii = AsciiFrame::new(config.grid_cols, config.grid_rows, frame.pts);
        ascii.half_block = config.half_block;

        let cols = usize::from(config.grid_cols);
        let vertical_cells = u32::from(config.grid_rows) * if config.half_block { 2 } else { 1 };
        let cell_w = (frame.width / u32::from(config.grid_cols)).max(1);
        let cell_h = (frame.height / vertical_cells).max(1);

        ascii
            .cells
            .par_chunks_mut(cols)
            .enumerate()
            .for_each(|(y, row)| {
                let y = y as u32;
                for (x, cell) in row.iter_mut().enumerate() {
                    let x = x as u32;
                    let start_y = if config.half_block { y * 2 * cell_h } else { y * cell_h };
                    let top = sample_cell(frame, &config, x * cell_w, start_y, cell_w, cell_h, y, x);
                    *cell = if config.half_block {
                        let bottom = sample_cell(
                            frame,
                            &config,
                            x * cell_w,
                            start_y + cell_h,
                            cell_w,
                            cell_h,
                            y + 1,
                            x,
                        );
                        AsciiCell {
                            ch: '▄',
                            fg: bottom.fg,
                            bg: top.fg,
                        }
                    } else {
                        top
                    };
                }
            });

        ascii.ansi = sgr::bake(&ascii, config.mode);
        ascii
    }
}

/// Échantillonne un rectangle de la frame et en dérive une cellule.
///
/// `row`/`col` sont les coordonnées de la cellule dans la grille de sortie
/// (le bas d'une cellule half-block utilise `row + 1` pour son seuil).
fn sample_cell(
    frame: &VideoFrame,
    config: &RendererConfig,
    start_x: u32,
    start_y: u32,
    cell_w: u32,
    cell_h: u32,
    row: u32,
    col: u32,
) -> AsciiCell {
    let mut sum_luma = 0.0f32;
    let mut sum_r = 0u32;
    let mut sum_g = 0u32;
    let mut sum_b = 0u32;
    let mut count = 0u32;

    for dy in 0..cell_h {
        for dx in 0..cell_w {
            let (r, g, b) = frame.pixel_clamped(start_x + dx, start_y + dy);
            sum_luma += luminance(r, g, b);
            sum_r += u32::from(r);
            sum_g += u32::from(g);
            sum_b += u32::from(b);
            count += 1;
        }
    }

    let count = count.max(1);
    let avg_luma = sum_luma / count as f32;
    let norm = apply_contrast(apply_gamma(avg_luma, config.gamma), config.contrast);

    let max_idx = (RAMP.len() - 1) as f32;
    let ramp_idx = ((norm * max_idx).round() as usize).min(RAMP.len() - 1);

    let avg_r = (sum_r / count) as u8;
    let avg_g = (sum_g / count) as u8;
    let avg_b = (sum_b / count) as u8;

    let mut cell = AsciiCell {
        ch: RAMP[ramp_idx],
        fg: 0,
        bg: 0,
    };

    match config.mode {
        RenderMode::Gray => {
            let gray = avg_luma as u8;
            cell.fg = pack_rgb(gray, gray, gray);
        }
        RenderMode::Ansi256 => {
            let idx = xterm_index_from_rgb(avg_r, avg_g, avg_b);
            let (pr, pg, pb) = xterm_palette()[usize::from(idx)];
            cell.fg = pack_rgb(pr, pg, pb);
            // Dither-driven highlight: le seuil pousse les cellules claires
            // au-dessus de 1.0 et force le glyphe dense.
            let t = dither::threshold(config.dither, row, col);
            if norm + t > 1.0 {
                cell.ch = '#';
            }
        }
        RenderMode::TrueColor => {
            cell.fg = pack_rgb(avg_r, avg_g, avg_b);
        }
    }

    cell
}

#[cfg(test)]
mod tests {
    use super::*;
    use gc_core::color::unpack_rgb;

    fn solid_frame(width: u32, height: u32, rgb: (u8, u8, u8)) -> VideoFrame {
        let mut frame = VideoFrame::new(width, height, 0.0);
        for pixel in frame.data.chunks_exact_mut(3) {
            pixel[0] = rgb.0;
            pixel[1] = rgb.1;
            pixel[2] = rgb.2;
        }
        frame
    }

    fn neutral_config() -> RendererConfig {
        RendererConfig {
            mode: RenderMode::Gray,
            dither: DitherMode::Off,
            half_block: false,
            grid_cols: 1,
            grid_rows: 1,
            gamma: 1.0,
            contrast: 1.0,
        }
    }

    #[test]
    fn gray_ramp_midpoint_maps_to_equals() {
        let renderer = AsciiRenderer::new(neutral_config());
        let ascii = renderer.render(&solid_frame(1, 1, (128, 128, 128)));
        assert_eq!(ascii.cells[0].ch, '=', "round(0.502 · 9) = 5 → '='");
        assert_eq!(ascii.cells[0].fg, 0x0080_8080);
    }

    #[test]
    fn all_black_maps_to_densest_glyph() {
        let renderer = AsciiRenderer::new(RendererConfig {
            grid_cols: 4,
            grid_rows: 4,
            ..neutral_config()
        });
        let ascii = renderer.render(&solid_frame(16, 16, (0, 0, 0)));
        for cell in &ascii.cells {
            assert_eq!(cell.ch, '@');
            assert_eq!(cell.fg, 0x0000_0000);
        }
    }

    #[test]
    fn all_white_maps_to_lightest_glyph() {
        let renderer = AsciiRenderer::new(RendererConfig {
            grid_cols: 4,
            grid_rows: 4,
            ..neutral_config()
        });
        let ascii = renderer.render(&solid_frame(16, 16, (255, 255, 255)));
        for cell in &ascii.cells {
            assert_eq!(cell.ch, ' ');
            assert_eq!(cell.fg, 0x00FF_FFFF);
        }
    }

    #[test]
    fn half_block_splits_top_and_bottom() {
        // Top half black, bottom half white.
        let mut frame = VideoFrame::new(2, 4, 0.0);
        for y in 2..4u32 {
            for x in 0..2u32 {
                let idx = ((y * 2 + x) * 3) as usize;
                frame.data[idx] = 255;
                frame.data[idx + 1] = 255;
                frame.data[idx + 2] = 255;
            }
        }
        let renderer = AsciiRenderer::new(RendererConfig {
            half_block: true,
            ..neutral_config()
        });
        let ascii = renderer.render(&frame);
        assert!(ascii.half_block);
        assert_eq!(ascii.cells[0].ch, '▄');
        assert_eq!(ascii.cells[0].fg, 0x00FF_FFFF, "bottom sample → fg");
        assert_eq!(ascii.cells[0].bg, 0x0000_0000, "top sample → bg");
    }

    #[test]
    fn ansi256_quantizes_to_palette_entry() {
        let renderer = AsciiRenderer::new(RendererConfig {
            mode: RenderMode::Ansi256,
            ..neutral_config()
        });
        let ascii = renderer.render(&solid_frame(1, 1, (215, 0, 0)));
        let (r, g, b) = unpack_rgb(ascii.cells[0].fg);
        assert_eq!((r, g, b), (215, 0, 0), "entrée 160 de la palette");
        let ansi = String::from_utf8(ascii.ansi.clone()).expect("flux UTF-8");
        assert!(ansi.contains("38;5;160"), "escape 256 couleurs attendu: {ansi}");
    }

    #[test]
    fn bayer4_threshold_rewrites_bright_cells() {
        let renderer = AsciiRenderer::new(RendererConfig {
            mode: RenderMode::Ansi256,
            dither: DitherMode::Bayer4,
            grid_cols: 4,
            grid_rows: 1,
            ..neutral_config()
        });
        let ascii = renderer.render(&solid_frame(1, 1, (220, 220, 220)));
        // norm ≈ 0.863 ; col 0 : t = 0 → pas de réécriture ;
        // col 3 : t = 10/16 → norm + t > 1 → '#'.
        assert_ne!(ascii.cells[0].ch, '#');
        assert_eq!(ascii.cells[3].ch, '#');
    }

    #[test]
    fn render_is_deterministic() {
        let mut frame = VideoFrame::new(32, 32, 1.0);
        for (i, byte) in frame.data.iter_mut().enumerate() {
            *byte = (i * 31 % 256) as u8;
        }
        let renderer = AsciiRenderer::new(RendererConfig {
            mode: RenderMode::TrueColor,
            grid_cols: 8,
            grid_rows: 8,
            ..RendererConfig::default()
        });
        let first = renderer.render(&frame);
        let second = renderer.render(&frame);
        assert_eq!(first.cells, second.cells);
        assert_eq!(first.ansi, second.ansi);
    }

    #[test]
    fn pts_and_cell_count_propagate() {
        let mut frame = solid_frame(20, 10, (50, 60, 70));
        frame.pts = 3.25;
        let renderer = AsciiRenderer::new(RendererConfig {
            grid_cols: 7,
            grid_rows: 5,
            ..neutral_config()
        });
        let ascii = renderer.render(&frame);
        assert!((ascii.pts - 3.25).abs() < 1e-9);
        assert_eq!(ascii.cells.len(), 7 * 5);
    }

    #[test]
    fn mode_and_dither_cycles_wrap() {
        let renderer = AsciiRenderer::new(neutral_config());
        renderer.cycle_mode();
        assert_eq!(renderer.current_config().mode, RenderMode::Ansi256);
        renderer.cycle_mode();
        assert_eq!(renderer.current_config().mode, RenderMode::TrueColor);
        renderer.cycle_mode();
        assert_eq!(renderer.current_config().mode, RenderMode::Gray);

        renderer.cycle_dither();
        assert_eq!(renderer.current_config().dither, DitherMode::Bayer2);
        renderer.cycle_dither();
        assert_eq!(renderer.current_config().dither, DitherMode::Bayer4);
        renderer.cycle_dither();
        assert_eq!(renderer.current_config().dither, DitherMode::Off);
    }

    #[test]
    fn adjustments_clamp_to_legal_ranges() {
        let renderer = AsciiRenderer::new(neutral_config());
        renderer.adjust_gamma(-10.0);
        assert!((renderer.current_config().gamma - GAMMA_MIN).abs() < f32::EPSILON);
        renderer.adjust_gamma(100.0);
        assert!((renderer.current_config().gamma - GAMMA_MAX).abs() < f32::EPSILON);
        renderer.adjust_contrast(-10.0);
        assert!((renderer.current_config().contrast - CONTRAST_MIN).abs() < f32::EPSILON);
        renderer.adjust_contrast(100.0);
        assert!((renderer.current_config().contrast - CONTRAST_MAX).abs() < f32::EPSILON);
    }
}
