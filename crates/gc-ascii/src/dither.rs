//! Algorithmique de Tramage Ordonné (Ordered Dithering).
//! Matrices de Bayer tuilées sur les coordonnées de la grille de sortie.

use gc_core::config::DitherMode;

/// Matrice de Bayer 2x2. Normalisée sur 4 niveaux (0-3).
pub const BAYER_2X2: [[u8; 2]; 2] = [[0, 2], [3, 1]];

/// Matrice de Bayer 4x4. Normalisée sur 16 niveaux (0-15).
pub const BAYER_4X4: [[u8; 4]; 4] = [[0, 8, 2, 10], [12, 4, 14, 6], [3, 11, 1, 9], [15, 7, 13, 5]];

/// Seuil de tramage [0.0, 1.0) pour la cellule (row, col) de la grille.
///
/// Le seuil s'ajoute à la luminance normalisée : `norm + t > 1` déclenche la
/// réécriture du glyphe en mode ANSI-256.
///
/// # Example
/// ```
/// use gc_ascii::dither::threshold;
/// use gc_core::config::DitherMode;
/// assert_eq!(threshold(DitherMode::Off, 7, 3), 0.0);
/// assert!((threshold(DitherMode::Bayer4, 0, 3) - 10.0 / 16.0).abs() < 1e-6);
/// ```
#[inline(always)]
#[must_use]
pub fn threshold(mode: DitherMode, row: u32, col: u32) -> f32 {
    match mode {
        DitherMode::Off => 0.0,
        DitherMode::Bayer2 => {
            f32::from(BAYER_2X2[(row % 2) as usize][(col % 2) as usize]) / 4.0
        }
        DitherMode::Bayer4 => {
            f32::from(BAYER_4X4[(row % 4) as usize][(col % 4) as usize]) / 16.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_is_always_zero() {
        for row in 0..8 {
            for col in 0..8 {
                assert_eq!(threshold(DitherMode::Off, row, col), 0.0);
            }
        }
    }

    #[test]
    fn bayer_tiles_over_grid() {
        // (row, col) et (row + s, col + s) tombent sur la même case.
        assert_eq!(
            threshold(DitherMode::Bayer2, 1, 0),
            threshold(DitherMode::Bayer2, 3, 2)
        );
        assert_eq!(
            threshold(DitherMode::Bayer4, 2, 1),
            threshold(DitherMode::Bayer4, 6, 5)
        );
    }

    #[test]
    fn bayer_values_normalized() {
        let mut seen = [false; 16];
        for row in 0..4 {
            for col in 0..4 {
                let t = threshold(DitherMode::Bayer4, row, col);
                assert!((0.0..1.0).contains(&t));
                seen[(t * 16.0).round() as usize] = true;
            }
        }
        assert!(seen.iter().all(|&s| s), "les 16 niveaux doivent apparaître");
    }
}
